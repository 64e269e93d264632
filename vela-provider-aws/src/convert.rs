//! Value conversion between vela attribute values and provider JSON

use vela_core::resource::Value;

/// Convert a vela Value to a JSON value
///
/// Returns None for unresolved references: those must never reach the
/// provider and are caught by the caller.
pub fn value_to_json(value: &Value) -> Option<serde_json::Value> {
    match value {
        Value::String(s) => Some(serde_json::Value::String(s.clone())),
        Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
        Value::Int(i) => Some(serde_json::json!(i)),
        Value::List(items) => {
            let arr: Vec<serde_json::Value> =
                items.iter().filter_map(value_to_json).collect();
            Some(serde_json::Value::Array(arr))
        }
        Value::Map(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                if let Some(j) = value_to_json(v) {
                    obj.insert(k.clone(), j);
                }
            }
            Some(serde_json::Value::Object(obj))
        }
        Value::Ref(_, _) => None,
    }
}

/// Convert a JSON value to a vela Value
pub fn json_to_value(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::String(s) => Some(Value::String(s.clone())),
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Int(i))
            } else {
                n.as_f64().map(|f| Value::Int(f as i64))
            }
        }
        serde_json::Value::Array(arr) => {
            let items: Vec<Value> = arr.iter().filter_map(json_to_value).collect();
            Some(Value::List(items))
        }
        serde_json::Value::Object(obj) => {
            let mut map = std::collections::HashMap::new();
            for (k, v) in obj {
                if let Some(value) = json_to_value(v) {
                    map.insert(k.clone(), value);
                }
            }
            Some(Value::Map(map))
        }
        serde_json::Value::Null => None,
    }
}

/// True if the value still contains an unresolved reference anywhere
pub fn contains_ref(value: &Value) -> bool {
    match value {
        Value::Ref(_, _) => true,
        Value::List(items) => items.iter().any(contains_ref),
        Value::Map(map) => map.values().any(contains_ref),
        _ => false,
    }
}
