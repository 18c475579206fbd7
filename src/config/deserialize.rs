// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles the non-empty cluster list and scalar-valued settings maps.

use std::collections::BTreeMap;

use nonempty::NonEmpty;
use serde::Deserialize;
use serde_yaml::Value;

use super::ClusterConfig;

pub fn deserialize_clusters<'de, D>(deserializer: D) -> Result<NonEmpty<ClusterConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let clusters: Vec<ClusterConfig> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(clusters)
        .ok_or_else(|| serde::de::Error::custom("at least one cluster is required"))
}

/// Accepts numbers and booleans as values, so `port: 6060` works like `port: "6060"`.
pub fn deserialize_settings<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: BTreeMap<String, Value> = BTreeMap::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            Value::Number(n) => Ok((key, n.to_string())),
            Value::Bool(b) => Ok((key, b.to_string())),
            _ => Err(serde::de::Error::custom(format!(
                "setting {key} must be a scalar"
            ))),
        })
        .collect()
}
