use super::*;

pub type Handler = fn(&mut World, &Body) -> Result<Value, String>;

/// Static exact-match routing table. Paths arrive with the leading slash
/// already stripped; there are no wildcards and no path parameters — every
/// argument travels in the body.
pub const ROUTES: &[(&str, Handler)] = &[
    ("ping", routes_scene::ping),
    ("scene/tree", routes_scene::scene_tree),
    ("scene/tree/flat", routes_scene::scene_tree_flat),
    ("scene/open", routes_scene::scene_open),
    ("scene/save", routes_scene::scene_save),
    ("scene/instantiate", routes_scene::scene_instantiate),
    ("scene/instantiate_many", routes_scene::scene_instantiate_many),
    ("editor/selected", routes_scene::editor_selected),
    ("editor/select", routes_scene::editor_select),
    ("editor/select/by_type", routes_scene::editor_select_by_type),
    ("editor/select/by_group", routes_scene::editor_select_by_group),
    ("node/create", routes_nodes::node_create),
    ("node/create_many", routes_nodes::node_create_many),
    ("node/delete", routes_nodes::node_delete),
    ("node/duplicate", routes_nodes::node_duplicate),
    ("node/properties", routes_nodes::node_properties),
    ("node/set_property", routes_nodes::node_set_property),
    ("node/set_properties", routes_nodes::node_set_properties),
    ("node/add_to_group", routes_nodes::node_add_to_group),
    ("node/remove_from_group", routes_nodes::node_remove_from_group),
    ("terrain/height", routes_placement::terrain_height),
    ("terrain/heights", routes_placement::terrain_heights),
    ("terrain/normal", routes_placement::terrain_normal),
    ("terrain/raycast", routes_placement::terrain_raycast),
    ("placement/scatter", routes_placement::placement_scatter),
    ("placement/along_path", routes_placement::placement_along_path),
    ("placement/grid", routes_placement::placement_grid),
    ("batch/set_property", routes_nodes::batch_set_property),
    ("batch/add_to_group", routes_nodes::batch_add_to_group),
    ("batch/delete_by_type", routes_nodes::batch_delete_by_type),
    ("batch/delete_by_group", routes_nodes::batch_delete_by_group),
    ("batch/replace_mesh", routes_nodes::batch_replace_mesh),
    ("search/nodes", routes_misc::search_nodes),
    ("search/by_type", routes_misc::search_by_type),
    ("search/by_group", routes_misc::search_by_group),
    ("search/by_name", routes_misc::search_by_name),
    ("project/scenes", routes_misc::project_scenes),
    ("project/scripts", routes_misc::project_scripts),
    ("debug/run_scene", routes_misc::debug_run_scene),
    ("debug/stop", routes_misc::debug_stop),
    ("execute", routes_misc::execute),
    ("execute/on_selected", routes_misc::execute_on_selected),
];

/// Route a parsed request. Handler failures come back as `{error}` payloads;
/// an unmatched path answers with the full catalog so clients can discover
/// the surface instead of guessing.
pub fn dispatch(world: &mut World, request: &http::Request) -> Value {
    let path = request.path.as_str();
    for (route, handler) in ROUTES {
        if *route == path {
            return match handler(world, &request.body) {
                Ok(value) => value,
                Err(message) => json!({ "error": message }),
            };
        }
    }
    json!({
        "error": format!("Unknown endpoint: {path}"),
        "endpoints": catalog(),
    })
}

pub fn catalog() -> Vec<&'static str> {
    ROUTES.iter().map(|(path, _)| *path).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{DocumentOwned, PropertyBag};
    use crate::templates::TemplateRegistry;

    fn test_world() -> World {
        let mut world = World::new();
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
        world.insert_resource(Selection::default());
        world.insert_resource(RunState::default());
        world.insert_resource(EditorConfig::default());
        world.insert_resource(TemplateRegistry::default());
        world.insert_resource(Terrain::flat(33, 33, 2.0, 1.0));
        world.insert_resource(project::ProjectIndex::default());
        world
    }

    fn request(path: &str, body: Value) -> http::Request {
        http::Request {
            method: "POST".into(),
            path: path.into(),
            body: match body {
                Value::Object(map) => map,
                _ => Body::new(),
            },
        }
    }

    #[test]
    fn routes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for (path, _) in ROUTES {
            assert!(seen.insert(*path), "duplicate route: {path}");
        }
    }

    #[test]
    fn unknown_endpoint_answers_with_catalog() {
        let mut world = test_world();
        let result = dispatch(&mut world, &request("nonexistent/path", json!({})));
        assert!(result["error"]
            .as_str()
            .unwrap()
            .contains("nonexistent/path"));
        let endpoints = result["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), ROUTES.len());
        for required in [
            "ping",
            "scene/tree",
            "placement/scatter",
            "placement/along_path",
            "placement/grid",
            "terrain/height",
            "terrain/raycast",
            "execute",
        ] {
            assert!(
                endpoints.iter().any(|e| e == required),
                "catalog missing {required}"
            );
        }
    }

    #[test]
    fn validation_errors_are_payloads_not_panics() {
        let mut world = test_world();
        let result = dispatch(&mut world, &request("node/delete", json!({})));
        assert!(result["error"].as_str().unwrap().contains("node_path"));

        let result = dispatch(
            &mut world,
            &request("node/delete", json!({ "node_path": "Missing/Node" })),
        );
        assert!(result["error"].as_str().unwrap().contains("Missing/Node"));
    }

    #[test]
    fn create_then_inspect_then_delete_round_trip() {
        let mut world = test_world();
        let created = dispatch(
            &mut world,
            &request(
                "node/create",
                json!({
                    "node_type": "Spatial",
                    "node_name": "Outpost",
                    "position": [2.0, 0.0, -3.0],
                }),
            ),
        );
        assert_eq!(created["node_path"], "Outpost");

        let props = dispatch(
            &mut world,
            &request("node/properties", json!({ "node_path": "Outpost" })),
        );
        assert_eq!(props["properties"]["position"], json!([2.0, 0.0, -3.0]));
        assert_eq!(props["properties"]["type"], "Spatial");

        let deleted = dispatch(
            &mut world,
            &request("node/delete", json!({ "node_path": "Outpost" })),
        );
        assert_eq!(deleted["deleted"], "Outpost");
        assert!(scene::resolve_path(&world, "Outpost").is_none());
    }

    #[test]
    fn set_property_routes_rich_types_to_the_bag() {
        let mut world = test_world();
        dispatch(
            &mut world,
            &request(
                "node/create",
                json!({ "node_type": "MeshNode", "node_name": "Rock" }),
            ),
        );
        let result = dispatch(
            &mut world,
            &request(
                "node/set_property",
                json!({
                    "node_path": "Rock",
                    "property": "tint",
                    "value": [0.5, 0.4, 0.3, 1.0],
                }),
            ),
        );
        assert!(result.get("error").is_none());

        let entity = scene::resolve_path(&world, "Rock").unwrap();
        let bag = world.get::<PropertyBag>(entity).unwrap();
        assert_eq!(
            bag.0.get("tint"),
            Some(&TypedValue::Color([0.5, 0.4, 0.3, 1.0]))
        );
    }

    #[test]
    fn set_properties_validates_before_any_mutation() {
        let mut world = test_world();
        dispatch(
            &mut world,
            &request(
                "node/create",
                json!({ "node_type": "Spatial", "node_name": "Camp" }),
            ),
        );
        let result = dispatch(
            &mut world,
            &request(
                "node/set_properties",
                json!({
                    "node_path": "Camp",
                    "properties": {
                        "position": [9.0, 9.0, 9.0],
                        "visible": "not-a-bool",
                    },
                }),
            ),
        );
        assert!(result["error"].as_str().unwrap().contains("visible"));

        // the valid key must not have been applied
        let entity = scene::resolve_path(&world, "Camp").unwrap();
        assert_eq!(
            world.get::<Transform>(entity).unwrap().translation,
            Vec3::ZERO
        );
    }

    #[test]
    fn batch_handlers_skip_failures_and_report_successes() {
        let mut world = test_world();
        for name in ["A", "B"] {
            dispatch(
                &mut world,
                &request(
                    "node/create",
                    json!({ "node_type": "Marker", "node_name": name }),
                ),
            );
        }
        let result = dispatch(
            &mut world,
            &request(
                "batch/add_to_group",
                json!({
                    "node_paths": ["A", "B", "DoesNotExist"],
                    "group": "waypoints",
                }),
            ),
        );
        assert_eq!(result["updated"], 2);
        assert!(result.get("error").is_none());

        let found = dispatch(
            &mut world,
            &request("search/by_group", json!({ "group": "waypoints" })),
        );
        assert_eq!(found["count"], 2);
    }

    #[test]
    fn scatter_endpoint_places_instances_under_root() {
        let mut world = test_world();
        let result = dispatch(
            &mut world,
            &request(
                "placement/scatter",
                json!({
                    "template": "rock",
                    "count": 5,
                    "center": [0.0, 0.0, 0.0],
                    "radius": 10.0,
                    "seed": 3,
                }),
            ),
        );
        assert_eq!(result["count"], 5);
        assert!(result["attempts"].as_u64().unwrap() <= 50);

        let flat = dispatch(&mut world, &request("scene/tree/flat", json!({})));
        // root + 5 rocks
        assert_eq!(flat["count"], 6);
    }

    #[test]
    fn terrain_miss_is_a_result_not_an_error() {
        let mut world = test_world();
        let result = dispatch(
            &mut world,
            &request("terrain/height", json!({ "x": 9000.0, "z": 0.0 })),
        );
        assert_eq!(result["hit"], false);
        assert_eq!(result["height"], 0.0);
        assert!(result.get("error").is_none());

        let result = dispatch(
            &mut world,
            &request("terrain/height", json!({ "x": 0.0, "z": 0.0 })),
        );
        assert_eq!(result["hit"], true);
        assert_eq!(result["height"], 1.0);
    }

    #[test]
    fn selection_endpoints_round_trip() {
        let mut world = test_world();
        for name in ["Watchtower", "Well"] {
            dispatch(
                &mut world,
                &request(
                    "node/create",
                    json!({ "node_type": "MeshNode", "node_name": name }),
                ),
            );
        }
        let select = dispatch(
            &mut world,
            &request("editor/select/by_type", json!({ "type": "MeshNode" })),
        );
        assert_eq!(select["count"], 2);

        dispatch(
            &mut world,
            &request("node/delete", json!({ "node_path": "Well" })),
        );
        let selected = dispatch(&mut world, &request("editor/selected", json!({})));
        assert_eq!(selected["count"], 1, "stale selection entries are dropped");
        assert_eq!(selected["selected"][0], "Watchtower");
    }

    #[test]
    fn execute_is_sandboxed_and_read_only() {
        let mut world = test_world();
        let result = dispatch(
            &mut world,
            &request("execute", json!({ "code": "1 + 2 * 3" })),
        );
        assert_eq!(result["result"], 7);

        let result = dispatch(
            &mut world,
            &request("execute", json!({ "code": "scene.node_count" })),
        );
        assert_eq!(result["result"], 1);
    }
}
