mod bridge;
mod components;
mod placement;
#[cfg(debug_assertions)]
mod probe;
mod project;
mod raycast;
mod scene;
mod scripting;
mod templates;
mod terrain;

use bevy::prelude::*;
use components::*;

#[derive(serde::Deserialize, Default)]
struct StartupConfig {
    window_title: Option<String>,
    window_width: Option<f32>,
    window_height: Option<f32>,
    background_color: Option<[f32; 3]>,
    project_dir: Option<String>,
}

fn load_startup_config() -> StartupConfig {
    let path = std::env::var("STRATA_EDITOR_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "editor.json".to_string());
    match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<StartupConfig>(&contents) {
            Ok(cfg) => {
                println!("[Strata] Loaded editor config from {}", path);
                cfg
            }
            Err(e) => {
                eprintln!("[Strata] Failed to parse {}: {}", path, e);
                StartupConfig::default()
            }
        },
        Err(_) => StartupConfig::default(),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let headless = args.iter().any(|a| a == "--headless");
    let startup_config = load_startup_config();
    let mut app = App::new();

    app.insert_resource(HeadlessMode(headless));

    if headless {
        // Headless mode: no window, no rendering — just the scene graph,
        // the bridge, and a ~60 Hz tick.
        app.add_plugins(MinimalPlugins.set(bevy::app::ScheduleRunnerPlugin::run_loop(
            std::time::Duration::from_secs_f64(1.0 / 60.0),
        )));
        println!("[Strata] Starting in HEADLESS mode");
    } else {
        let window_title = startup_config
            .window_title
            .unwrap_or_else(|| "Strata".to_string());
        let window_width = startup_config.window_width.unwrap_or(1280.0);
        let window_height = startup_config.window_height.unwrap_or(720.0);

        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: window_title,
                resolution: (window_width, window_height).into(),
                present_mode: bevy::window::PresentMode::AutoVsync,
                ..default()
            }),
            ..default()
        }));
        let bg = startup_config.background_color.unwrap_or([0.16, 0.17, 0.2]);
        app.insert_resource(ClearColor(Color::srgb(bg[0], bg[1], bg[2])));
        println!("[Strata] Starting in WINDOWED mode");
    }

    let project_dir = std::env::var("STRATA_PROJECT_DIR")
        .ok()
        .filter(|s| !s.is_empty())
        .or(startup_config.project_dir)
        .unwrap_or_else(|| "project".to_string());
    if project_dir != "project" {
        println!("[Strata] Using project dir: {}", project_dir);
    }

    app.insert_resource(EditorConfig {
        project_dir: project_dir.into(),
    })
    .insert_resource(Selection::default())
    .insert_resource(RunState::default())
    .insert_resource(templates::TemplateRegistry::default())
    .insert_resource(terrain::Terrain::rolling(129, 129, 2.0))
    .add_systems(Startup, setup_scene)
    .add_plugins(project::ProjectPlugin)
    .add_plugins(bridge::BridgePlugin);

    #[cfg(debug_assertions)]
    app.add_plugins(probe::ProbePlugin);

    app.run();
}

/// Seed the edited scene: a stable root plus a couple of starter nodes so
/// clients see structure on first connect. The camera and light are host
/// furniture, not scene nodes — the bridge cannot address them.
fn setup_scene(world: &mut World) {
    let headless = world.resource::<HeadlessMode>().0;
    let root = world
        .spawn((
            SceneNode::new("Root", "Node"),
            PropertyBag::default(),
            Transform::IDENTITY,
            Visibility::default(),
            DocumentOwned,
        ))
        .id();
    world.insert_resource(EditedScene {
        entity: root,
        path: None,
    });
    scene::spawn_node(
        world,
        root,
        SceneNode::new("Terrain", "Spatial"),
        Transform::IDENTITY,
    );
    scene::spawn_node(
        world,
        root,
        SceneNode::new("Environment", "Node"),
        Transform::IDENTITY,
    );
    scene::propagate_ownership(world, root);

    if !headless {
        world.spawn((
            Camera3d::default(),
            Transform::from_xyz(28.0, 22.0, 28.0).looking_at(Vec3::ZERO, Vec3::Y),
        ));
        world.spawn((
            DirectionalLight {
                illuminance: 9_000.0,
                shadows_enabled: true,
                ..default()
            },
            Transform::from_xyz(12.0, 30.0, 8.0).looking_at(Vec3::ZERO, Vec3::Y),
        ));
    }
}
