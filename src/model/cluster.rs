// ABOUTME: A host and slot identity hosting one or more stages.
// ABOUTME: Builds the nodes of its stages on demand.

use super::{ClusterNode, Slot, Stage};

/// Where node health is checked, relative to the application root.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct HealthConfig {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub host: String,
    pub slot: Slot,
    pub stages: Vec<Stage>,
    pub health: Option<HealthConfig>,
}

impl Cluster {
    pub fn new(host: impl Into<String>, slot: Slot) -> Self {
        Self {
            host: host.into(),
            slot,
            stages: Vec::new(),
            health: None,
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.health = Some(health);
        self
    }

    /// Host name up to the first dot.
    pub fn simple_name(&self) -> &str {
        self.host.split_once('.').map_or(&self.host, |(name, _)| name)
    }

    /// Everything after the first dot, or empty.
    pub fn domain_name(&self) -> &str {
        self.host.split_once('.').map_or("", |(_, domain)| domain)
    }

    pub fn id(&self) -> String {
        format!("{}:{}", self.simple_name(), self.slot.name_or_empty())
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.name == name)
    }

    /// Declared nodes of all stages, stage by stage in ascending index order.
    pub fn nodes(&self) -> impl Iterator<Item = ClusterNode> + '_ {
        self.stages.iter().flat_map(move |stage| {
            stage
                .indices()
                .map(move |index| ClusterNode::new(self.clone(), stage.clone(), index))
        })
    }

    pub fn node(&self, stage: &Stage, index: u32) -> ClusterNode {
        ClusterNode::new(self.clone(), stage.clone(), index)
    }
}
