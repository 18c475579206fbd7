// ABOUTME: One addressable (cluster, stage, index) process.
// ABOUTME: Derives host name, port, endpoint and id deterministically.

use std::fmt;

use super::{Cluster, Endpoint, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    cluster: Cluster,
    stage: Stage,
    index: u32,
}

impl ClusterNode {
    pub fn new(cluster: Cluster, stage: Stage, index: u32) -> Self {
        Self {
            cluster,
            stage,
            index,
        }
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn host(&self) -> String {
        format!(
            "{}{}{}{}",
            self.stage.prefix,
            self.cluster.simple_name(),
            self.stage.suffix,
            self.stage.formatted_index(self.index)
        )
    }

    /// The slot's http port, where the node's deployer and applications listen.
    pub fn port(&self) -> u16 {
        self.cluster.slot.http
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host(), self.port())
    }

    pub fn id(&self) -> String {
        format!("{}:{}:{}", self.cluster.id(), self.stage.name, self.index)
    }

    /// Whether this node was taken out of `application`'s load balancer on purpose.
    pub fn is_unbalanced(&self, application: &str) -> bool {
        self.stage.is_unbalanced(self.index, application)
    }

    /// The node at the following index of the same stage, declared or not.
    pub fn next(&self) -> ClusterNode {
        Self::new(self.cluster.clone(), self.stage.clone(), self.index + 1)
    }

    /// Same stage name and index, whatever the cluster.
    pub fn is_same_position(&self, other: &ClusterNode) -> bool {
        self.stage.name == other.stage.name && self.index == other.index
    }
}

impl fmt::Display for ClusterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
