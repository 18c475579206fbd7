// ABOUTME: Writes per-node load balancer marks back into the cluster config file.
// ABOUTME: Marks live in the stage's `status` mapping as `<index>:<app>: unbalanced`.

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use super::{ConfigError, Result};
use crate::model::ClusterNode;

pub(super) const UNBALANCED: &str = "unbalanced";

/// The cluster config file as a store of node marks.
///
/// Updates edit the YAML document in place, so unrelated settings and key order
/// survive; comments do not.
#[derive(Debug, Clone)]
pub struct ClusterStore {
    path: PathBuf,
}

impl ClusterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Marks `app` on `node` to stay out of its load balancer.
    pub fn unbalance(&self, node: &ClusterNode, app: &str) -> Result<()> {
        self.update_stage(node, |stage| {
            let status = stage
                .entry(Value::from("status"))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if !status.is_mapping() {
                *status = Value::Mapping(Mapping::new());
            }
            if let Value::Mapping(status) = status {
                let key = Value::from(key(node, app));
                if !status.contains_key(&key) {
                    status.insert(key, Value::from(UNBALANCED));
                }
            }
        })
    }

    /// Clears the mark set by [`ClusterStore::unbalance`].
    pub fn balance(&self, node: &ClusterNode, app: &str) -> Result<()> {
        self.update_stage(node, |stage| {
            let Some(Value::Mapping(status)) = stage.get_mut("status") else {
                return;
            };
            status.remove(key(node, app).as_str());
            if status.is_empty() {
                stage.remove("status");
            }
        })
    }

    fn update_stage(&self, node: &ClusterNode, update: impl FnOnce(&mut Mapping)) -> Result<()> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut document: Value = serde_yaml::from_str(&text)?;
        update(self.stage_mapping(&mut document, node)?);

        tracing::debug!("write cluster config {}", self.path.display());
        let text = serde_yaml::to_string(&document)?;
        std::fs::write(&self.path, text).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// The mapping of the node's stage, created when the cluster declares no
    /// stages or not this one.
    fn stage_mapping<'d>(
        &self,
        document: &'d mut Value,
        node: &ClusterNode,
    ) -> Result<&'d mut Mapping> {
        let host = node.cluster().host.as_str();
        let cluster = document
            .get_mut("clusters")
            .and_then(Value::as_sequence_mut)
            .and_then(|clusters| {
                clusters
                    .iter_mut()
                    .find(|cluster| cluster.get("host").and_then(Value::as_str) == Some(host))
            })
            .and_then(Value::as_mapping_mut)
            .ok_or_else(|| self.missing(format!("cluster {host}")))?;

        let stages = cluster
            .entry(Value::from("stages"))
            .or_insert_with(|| Value::Sequence(Vec::new()));
        if stages.is_null() {
            *stages = Value::Sequence(Vec::new());
        }
        let stages = stages
            .as_sequence_mut()
            .ok_or_else(|| self.missing(format!("stage list in cluster {host}")))?;

        let name = node.stage().name.as_str();
        let position = match stages
            .iter()
            .position(|stage| stage.get("name").and_then(Value::as_str) == Some(name))
        {
            Some(position) => position,
            None => {
                let mut stage = Mapping::new();
                stage.insert(Value::from("name"), Value::from(name));
                stages.push(Value::Mapping(stage));
                stages.len() - 1
            }
        };
        stages[position]
            .as_mapping_mut()
            .ok_or_else(|| self.missing(format!("stage {name} in cluster {host}")))
    }

    fn missing(&self, what: String) -> ConfigError {
        ConfigError::Missing {
            path: self.path.clone(),
            what,
        }
    }
}

fn key(node: &ClusterNode, app: &str) -> String {
    format!("{}:{}", node.index(), app)
}
