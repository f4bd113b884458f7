pub mod dispatch;
pub mod http;
pub mod server;
pub mod types;

mod routes_misc;
mod routes_nodes;
mod routes_placement;
mod routes_scene;

use bevy::prelude::*;
use serde_json::{json, Value};

use crate::components::{EditedScene, EditorConfig, PropertyBag, RunState, SceneNode, Selection};
use crate::placement;
use crate::project;
use crate::raycast;
use crate::scene;
use crate::scripting;
use crate::templates::{self, TemplateRegistry};
use crate::terrain::Terrain;

use server::{CommandServer, Outcome};
use types::*;

/// Fixed localhost port for the editor-state bridge.
pub const BRIDGE_PORT: u16 = 6550;

#[derive(Resource)]
pub struct BridgeServer(pub CommandServer);

/// Embeds the command server in the editor's frame loop. All polling,
/// dispatch and scene mutation happen on the main thread, one tick per
/// frame — the scene graph is never touched concurrently.
pub struct BridgePlugin;

impl Plugin for BridgePlugin {
    fn build(&self, app: &mut App) {
        match CommandServer::bind(BRIDGE_PORT) {
            Ok(command_server) => {
                println!("[Strata bridge] Listening on http://127.0.0.1:{BRIDGE_PORT}");
                app.insert_resource(BridgeServer(command_server));
                app.add_systems(Update, tick_bridge);
            }
            Err(e) => {
                eprintln!("[Strata bridge] Failed to bind port {BRIDGE_PORT}: {e}");
            }
        }
    }
}

fn tick_bridge(world: &mut World) {
    world.resource_scope(|world, mut bridge: Mut<BridgeServer>| {
        bridge
            .0
            .poll(|request| Outcome::Reply(dispatch::dispatch(world, request)));
    });
}
