// ABOUTME: Error types for deploy orchestration.
// ABOUTME: Covers audit mismatches, health flips, and collaborator failures.

use super::gateway::GatewayError;
use crate::config::ConfigError;
use crate::ingress::IngressError;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The deployer's audit trail does not show the requested change.
    #[error("{0}")]
    UnexpectedAudit(String),

    #[error("{app}@{version} on {node} flipped from healthy to unhealthy")]
    HealthFlip {
        app: String,
        version: String,
        node: String,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Ingress(#[from] IngressError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
