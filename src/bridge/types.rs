use serde_json::Value;

/// Parsed request body: a string-keyed map with dynamically typed values.
pub type Body = serde_json::Map<String, Value>;

/// The closed set of rich value types the bridge recognizes when moving
/// properties across the wire. Anything unrecognized passes through opaque
/// rather than failing.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Color([f32; 4]),
    Transform {
        position: [f32; 3],
        rotation: [f32; 3],
        scale: [f32; 3],
    },
    Resource(String),
    NodePath(String),
    Opaque(Value),
}

impl TypedValue {
    /// Decode a wire value. Numeric arrays become vectors/colors by length
    /// (the protocol's original convention); tagged objects select the
    /// reference types; everything else is kept opaque.
    pub fn from_json(value: &Value) -> TypedValue {
        match value {
            Value::Bool(b) => TypedValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    TypedValue::Int(i)
                } else {
                    TypedValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => TypedValue::Str(s.clone()),
            Value::Array(items) => match numeric_array(items) {
                Some(nums) if nums.len() == 2 => TypedValue::Vec2([nums[0], nums[1]]),
                Some(nums) if nums.len() == 3 => TypedValue::Vec3([nums[0], nums[1], nums[2]]),
                Some(nums) if nums.len() == 4 => {
                    TypedValue::Color([nums[0], nums[1], nums[2], nums[3]])
                }
                _ => TypedValue::Opaque(value.clone()),
            },
            Value::Object(map) => {
                if let Some(Value::String(path)) = map.get("node_path") {
                    return TypedValue::NodePath(path.clone());
                }
                if let Some(Value::String(resource)) = map.get("resource") {
                    return TypedValue::Resource(resource.clone());
                }
                if map.contains_key("position") || map.contains_key("rotation") {
                    let position = triple(map.get("position")).unwrap_or([0.0; 3]);
                    let rotation = triple(map.get("rotation")).unwrap_or([0.0; 3]);
                    let scale = triple(map.get("scale")).unwrap_or([1.0, 1.0, 1.0]);
                    return TypedValue::Transform {
                        position,
                        rotation,
                        scale,
                    };
                }
                TypedValue::Opaque(value.clone())
            }
            Value::Null => TypedValue::Opaque(Value::Null),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::Bool(b) => Value::Bool(*b),
            TypedValue::Int(i) => serde_json::json!(i),
            TypedValue::Float(f) => serde_json::json!(f),
            TypedValue::Str(s) => Value::String(s.clone()),
            TypedValue::Vec2(v) => serde_json::json!(v),
            TypedValue::Vec3(v) => serde_json::json!(v),
            TypedValue::Color(c) => serde_json::json!(c),
            TypedValue::Transform {
                position,
                rotation,
                scale,
            } => serde_json::json!({
                "position": position,
                "rotation": rotation,
                "scale": scale,
            }),
            TypedValue::Resource(r) => serde_json::json!({ "resource": r }),
            TypedValue::NodePath(p) => serde_json::json!({ "node_path": p }),
            TypedValue::Opaque(v) => v.clone(),
        }
    }
}

fn numeric_array(items: &[Value]) -> Option<Vec<f32>> {
    items
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

fn triple(value: Option<&Value>) -> Option<[f32; 3]> {
    let nums = numeric_array(value?.as_array()?)?;
    if nums.len() == 3 {
        Some([nums[0], nums[1], nums[2]])
    } else {
        None
    }
}

// ── Body field extraction ────────────────────────────────────────────────

pub fn req_str<'a>(body: &'a Body, key: &str) -> Result<&'a str, String> {
    body.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Missing required field: {key}"))
}

pub fn opt_str<'a>(body: &'a Body, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

pub fn req_f32(body: &Body, key: &str) -> Result<f32, String> {
    body.get(key)
        .and_then(Value::as_f64)
        .map(|f| f as f32)
        .ok_or_else(|| format!("Missing required field: {key}"))
}

pub fn opt_vec3(body: &Body, key: &str) -> Result<Option<[f32; 3]>, String> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_array()
            .and_then(|items| numeric_array(items))
            .filter(|nums| nums.len() == 3)
            .map(|nums| Some([nums[0], nums[1], nums[2]]))
            .ok_or_else(|| format!("Field {key} must be a [x, y, z] array")),
    }
}

pub fn str_list(body: &Body, key: &str) -> Result<Vec<String>, String> {
    let items = body
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| format!("Missing required field: {key}"))?;
    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

/// Deserialize a whole body into a typed request struct.
pub fn from_body<T: serde::de::DeserializeOwned>(body: &Body) -> Result<T, String> {
    serde_json::from_value(Value::Object(body.clone())).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rich_types_round_trip() {
        let values = [
            TypedValue::Bool(true),
            TypedValue::Int(-3),
            TypedValue::Float(2.5),
            TypedValue::Str("hello".into()),
            TypedValue::Vec2([1.0, 2.0]),
            TypedValue::Vec3([1.0, 2.0, 3.0]),
            TypedValue::Color([0.1, 0.2, 0.3, 1.0]),
            TypedValue::Transform {
                position: [1.0, 2.0, 3.0],
                rotation: [0.0, 90.0, 0.0],
                scale: [1.0, 1.0, 1.0],
            },
            TypedValue::Resource("meshes/rock.mesh".into()),
            TypedValue::NodePath("Terrain/Rocks".into()),
        ];
        for value in values {
            assert_eq!(TypedValue::from_json(&value.to_json()), value);
        }
    }

    #[test]
    fn unknown_shapes_pass_through_opaque() {
        let odd = serde_json::json!({ "custom": { "nested": [1, 2, 3, 4, 5] } });
        let decoded = TypedValue::from_json(&odd);
        assert_eq!(decoded, TypedValue::Opaque(odd.clone()));
        assert_eq!(decoded.to_json(), odd);

        let five = serde_json::json!([1, 2, 3, 4, 5]);
        assert_eq!(TypedValue::from_json(&five), TypedValue::Opaque(five));
    }

    #[test]
    fn arrays_decode_by_length() {
        assert_eq!(
            TypedValue::from_json(&serde_json::json!([1, 2])),
            TypedValue::Vec2([1.0, 2.0])
        );
        assert_eq!(
            TypedValue::from_json(&serde_json::json!([1, 2, 3])),
            TypedValue::Vec3([1.0, 2.0, 3.0])
        );
        assert_eq!(
            TypedValue::from_json(&serde_json::json!([1, 2, 3, 4])),
            TypedValue::Color([1.0, 2.0, 3.0, 4.0])
        );
    }

    #[test]
    fn field_helpers_report_missing_keys() {
        let body: Body = serde_json::from_str(r#"{ "x": 1.5 }"#).unwrap();
        assert_eq!(req_f32(&body, "x"), Ok(1.5));
        assert!(req_f32(&body, "z").unwrap_err().contains("z"));
        assert!(req_str(&body, "node_path").is_err());
        assert_eq!(opt_vec3(&body, "missing"), Ok(None));

        let body: Body = serde_json::from_str(r#"{ "position": [1, 2] }"#).unwrap();
        assert!(opt_vec3(&body, "position").is_err());
    }
}
