// ABOUTME: Application-wide error type for stagehand.
// ABOUTME: Wraps the subsystem errors so the binary can report any of them.

use thiserror::Error;

use crate::config::ConfigError;
use crate::deploy::DeployError;
use crate::ingress::IngressError;
use crate::reconcile::{ContainerError, ReconcileError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingress(#[from] IngressError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
