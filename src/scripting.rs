use rhai::{Dynamic, Engine, Scope};

pub const DEFAULT_MAX_OPERATIONS: u64 = 500_000;
pub const DEFAULT_MAX_CALL_LEVELS: usize = 64;

/// The bridge's `execute` endpoints are an explicit capability boundary:
/// scripts get a fresh engine with hard operation and call-depth limits and
/// a read-only snapshot scope. There is no handle back into the scene
/// graph, so evaluation cannot mutate editor state.
fn make_engine() -> Engine {
    let mut engine = Engine::new();
    let max_ops = std::env::var("STRATA_SCRIPT_MAX_OPERATIONS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_MAX_OPERATIONS)
        .max(10_000);
    let max_call_levels = std::env::var("STRATA_SCRIPT_MAX_CALL_LEVELS")
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_CALL_LEVELS)
        .max(8);
    engine.set_max_operations(max_ops);
    engine.set_max_call_levels(max_call_levels);
    engine
}

/// Facts about the scene exposed to `execute`.
pub struct SceneScope {
    pub scene_name: String,
    pub node_count: i64,
    pub selected: Vec<String>,
}

impl SceneScope {
    pub fn to_vars(&self) -> Vec<(&'static str, Dynamic)> {
        let mut scene = rhai::Map::new();
        scene.insert("name".into(), self.scene_name.clone().into());
        scene.insert("node_count".into(), Dynamic::from_int(self.node_count));
        let selected: rhai::Array = self
            .selected
            .iter()
            .map(|p| Dynamic::from(p.clone()))
            .collect();
        scene.insert("selected".into(), selected.into());
        vec![("scene", scene.into())]
    }
}

/// Facts about one node exposed to `execute/on_selected`.
pub fn node_vars(
    name: &str,
    path: &str,
    type_name: &str,
    position: [f32; 3],
) -> Vec<(&'static str, Dynamic)> {
    let mut node = rhai::Map::new();
    node.insert("name".into(), name.to_string().into());
    node.insert("path".into(), path.to_string().into());
    node.insert("type".into(), type_name.to_string().into());
    let position: rhai::Array = position
        .iter()
        .map(|c| Dynamic::from_float(*c as f64))
        .collect();
    node.insert("position".into(), position.into());
    vec![("node", node.into())]
}

pub fn evaluate(
    code: &str,
    vars: &[(&'static str, Dynamic)],
) -> Result<serde_json::Value, String> {
    let engine = make_engine();
    let mut scope = Scope::new();
    for (name, value) in vars {
        scope.push_dynamic(*name, value.clone());
    }
    let result = engine
        .eval_with_scope::<Dynamic>(&mut scope, code)
        .map_err(|e| e.to_string())?;
    Ok(dynamic_to_json(&result))
}

/// Manual conversion keeps the sandbox surface explicit: values that are
/// not plain data come back as their display text.
fn dynamic_to_json(value: &Dynamic) -> serde_json::Value {
    if value.is_unit() {
        return serde_json::Value::Null;
    }
    if let Some(b) = value.clone().try_cast::<bool>() {
        return serde_json::json!(b);
    }
    if let Some(i) = value.clone().try_cast::<i64>() {
        return serde_json::json!(i);
    }
    if let Some(f) = value.clone().try_cast::<f64>() {
        return serde_json::json!(f);
    }
    if let Some(s) = value.clone().try_cast::<String>() {
        return serde_json::json!(s);
    }
    if let Some(array) = value.clone().try_cast::<rhai::Array>() {
        return serde_json::Value::Array(array.iter().map(dynamic_to_json).collect());
    }
    if let Some(map) = value.clone().try_cast::<rhai::Map>() {
        let mut out = serde_json::Map::new();
        for (key, item) in &map {
            out.insert(key.to_string(), dynamic_to_json(item));
        }
        return serde_json::Value::Object(out);
    }
    serde_json::Value::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_expressions() {
        assert_eq!(evaluate("1 + 2 * 3", &[]).unwrap(), serde_json::json!(7));
        assert_eq!(
            evaluate("\"a\" + \"b\"", &[]).unwrap(),
            serde_json::json!("ab")
        );
    }

    #[test]
    fn scope_variables_are_visible() {
        let scope = SceneScope {
            scene_name: "Valley".into(),
            node_count: 12,
            selected: vec!["Rock".into(), "Tree".into()],
        };
        let vars = scope.to_vars();
        assert_eq!(
            evaluate("scene.name", &vars).unwrap(),
            serde_json::json!("Valley")
        );
        assert_eq!(
            evaluate("scene.node_count * 2", &vars).unwrap(),
            serde_json::json!(24)
        );
        assert_eq!(
            evaluate("scene.selected.len()", &vars).unwrap(),
            serde_json::json!(2)
        );
    }

    #[test]
    fn runaway_scripts_hit_the_operation_limit() {
        let err = evaluate("let x = 0; loop { x += 1; }", &[]).unwrap_err();
        assert!(
            err.to_lowercase().contains("operation"),
            "expected operation-limit error, got: {err}"
        );
    }

    #[test]
    fn maps_and_arrays_convert_to_json() {
        let result = evaluate("#{ a: 1, b: [true, 2.5] }", &[]).unwrap();
        assert_eq!(result, serde_json::json!({ "a": 1, "b": [true, 2.5] }));
    }
}
