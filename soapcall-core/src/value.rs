//! Typed-value wrappers and the response post-processor that strips them.
//!
//! The codec keeps the `xsi:type` of a decoded element by wrapping the value as
//! `{"enc_type": "xsd:int", "enc_value": 5}`. Callers normally want the bare
//! value, so every successful decode is passed through [`unwrap_typed`].

use serde_json::{Map, Value};

pub const ENC_TYPE: &str = "enc_type";
pub const ENC_VALUE: &str = "enc_value";

/// Wrap `value` with its encoding type.
pub fn typed(enc_type: impl Into<String>, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(ENC_TYPE.to_string(), Value::String(enc_type.into()));
    map.insert(ENC_VALUE.to_string(), value);
    Value::Object(map)
}

/// True when `value` is a wrapper node: an object whose keys are all `enc_*`
/// and that carries an `enc_value`.
pub fn is_typed_wrapper(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.contains_key(ENC_VALUE) && map.keys().all(|key| key.starts_with("enc_"))
        }
        _ => false,
    }
}

/// Replace every wrapper node, at any depth, with its inner value.
pub fn unwrap_typed(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            if map.contains_key(ENC_VALUE) && map.keys().all(|key| key.starts_with("enc_")) {
                let inner = map.remove(ENC_VALUE).unwrap_or(Value::Null);
                return unwrap_typed(inner);
            }
            Value::Object(
                map.into_iter()
                    .map(|(key, item)| (key, unwrap_typed(item)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(unwrap_typed).collect()),
        other => other,
    }
}
