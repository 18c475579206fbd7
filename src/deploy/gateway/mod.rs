// ABOUTME: Collaborator seams of the deploy orchestrator and their HTTP implementations.
// ABOUTME: The ingress engine is seen here only as add/remove of a node to a load balancer.

mod deployer;
mod health;
mod http;

pub use deployer::HttpDeployerGateway;
pub use health::HttpHealthGateway;

use async_trait::async_trait;
use serde::Serialize;

use super::audit::Audits;
use crate::config::{ClusterStore, ConfigError};
use crate::ingress::{IngressError, IngressFactory, LoadBalancer};
use crate::model::{ClusterNode, Stage};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to connect to {uri}: {source}")]
    Connect {
        uri: String,
        source: std::io::Error,
    },

    #[error("request to {uri} failed: {message}")]
    Http { uri: String, message: String },

    #[error("request to {uri} timed out")]
    Timeout { uri: String },

    #[error("{uri} returns 404 Not Found")]
    NotFound { uri: String },

    #[error("got {status} from {uri}: {body}")]
    Status {
        uri: String,
        status: u16,
        body: String,
    },

    #[error("invalid response from {uri}: {message}")]
    InvalidResponse { uri: String, message: String },
}

/// One deployable as listed by a node's deployer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deployment {
    pub name: String,
    pub group_id: String,
    pub artifact_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Deployment {
    /// Stands in for the deployments of a node whose deployer could not be asked.
    pub fn unreachable(error: impl ToString) -> Self {
        Self {
            name: "-".to_string(),
            group_id: "-".to_string(),
            artifact_id: "-".to_string(),
            kind: "-".to_string(),
            version: "-".to_string(),
            error: Some(error.to_string()),
        }
    }
}

/// The remote deployer running on each node.
#[async_trait]
pub trait DeployerGateway: Send + Sync {
    async fn fetch_deployables(&self, node: &ClusterNode)
    -> Result<Vec<Deployment>, GatewayError>;

    /// Deployed version of `app`, if it is deployed at all.
    async fn fetch_version(&self, node: &ClusterNode, app: &str)
    -> Result<Option<String>, GatewayError>;

    async fn fetch_versions(
        &self,
        node: &ClusterNode,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<String>, GatewayError>;

    async fn deploy(
        &self,
        node: &ClusterNode,
        app: &str,
        version: &str,
    ) -> Result<Audits, GatewayError>;

    async fn undeploy(&self, node: &ClusterNode, app: &str) -> Result<Audits, GatewayError>;
}

#[async_trait]
pub trait HealthGateway: Send + Sync {
    async fn fetch(&self, node: &ClusterNode, app: &str) -> bool;
}

/// Load balancer membership of nodes, as the orchestrator needs it.
#[async_trait]
pub trait LoadBalancing: Send + Sync {
    async fn add_to_load_balancer(&self, app: &str, node: &ClusterNode)
    -> Result<(), IngressError>;

    async fn remove_from_load_balancer(
        &self,
        app: &str,
        node: &ClusterNode,
    ) -> Result<(), IngressError>;

    async fn load_balancers(&self, stage: &Stage) -> Result<Vec<LoadBalancer>, IngressError>;
}

/// Persisted marks of nodes kept out of an application's load balancer.
pub trait BalanceStatus: Send + Sync {
    fn mark_balanced(&self, node: &ClusterNode, app: &str) -> Result<(), ConfigError>;

    fn mark_unbalanced(&self, node: &ClusterNode, app: &str) -> Result<(), ConfigError>;
}

impl BalanceStatus for ClusterStore {
    fn mark_balanced(&self, node: &ClusterNode, app: &str) -> Result<(), ConfigError> {
        self.balance(node, app)
    }

    fn mark_unbalanced(&self, node: &ClusterNode, app: &str) -> Result<(), ConfigError> {
        self.unbalance(node, app)
    }
}

#[async_trait]
impl LoadBalancing for IngressFactory {
    async fn add_to_load_balancer(
        &self,
        app: &str,
        node: &ClusterNode,
    ) -> Result<(), IngressError> {
        let mut ingress = self.open(node.stage()).await?;
        ingress.add_to_load_balancer(app, node).await
    }

    async fn remove_from_load_balancer(
        &self,
        app: &str,
        node: &ClusterNode,
    ) -> Result<(), IngressError> {
        let mut ingress = self.open(node.stage()).await?;
        ingress.remove_from_load_balancer(app, node).await
    }

    async fn load_balancers(&self, stage: &Stage) -> Result<Vec<LoadBalancer>, IngressError> {
        Ok(self.open(stage).await?.load_balancers())
    }
}
