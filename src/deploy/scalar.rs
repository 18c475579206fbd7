// ABOUTME: Deserializes YAML scalars of any kind into strings.
// ABOUTME: Versions are often bare YAML numbers like `1.0` or `2`.

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

pub(crate) fn to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(to_string(Value::deserialize(d)?))
}
