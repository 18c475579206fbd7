// ABOUTME: Deploy orchestration: version changes on single nodes with audit checks and rollback.
// ABOUTME: Exports the orchestrator, its collaborator seams and the HTTP gateways.

pub mod audit;
mod error;
pub mod gateway;
mod orchestrator;
mod rebalance;
mod scalar;

pub use audit::{Audit, Audits, Change, Warning};
pub use error::DeployError;
pub use gateway::{
    BalanceStatus, DeployerGateway, Deployment, GatewayError, HealthGateway,
    HttpDeployerGateway, HttpHealthGateway, LoadBalancing,
};
pub use orchestrator::Orchestrator;
