// ABOUTME: Container status seam used by the reconciler.
// ABOUTME: Reports actual ports by host and starts or stops node containers.

use async_trait::async_trait;

use crate::model::{Cluster, ClusterNode, Endpoint};

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container {0} publishes no http port")]
    NoPort(String),

    #[error("failed to connect to container runtime: {0}")]
    Connection(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Actual state of the containers backing one cluster.
#[async_trait]
pub trait ContainerStatus: Send + Sync {
    /// Published http port of the running container for `host`.
    async fn port(&self, host: &str) -> Result<Option<u16>, ContainerError>;

    /// Starts the node's container and returns its published http port.
    async fn start(&self, node: &ClusterNode) -> Result<u16, ContainerError>;

    async fn stop(&self, endpoint: &Endpoint) -> Result<(), ContainerError>;

    /// Every running container with its published http port.
    async fn endpoints(&self) -> Result<Vec<Endpoint>, ContainerError>;
}

/// Hands out the container status of each cluster.
pub trait ContainerRuntime: Send + Sync {
    fn status(&self, cluster: &Cluster) -> Box<dyn ContainerStatus>;
}
