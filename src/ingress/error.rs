// ABOUTME: Error types for ingress configuration operations.
// ABOUTME: Covers config file I/O, parsing, invalid document state, and reload failures.

use std::path::PathBuf;

use crate::nginx::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum IngressError {
    /// Stage load-balancer configuration is unusable.
    #[error("{0}")]
    Config(String),

    /// Config file could not be read or written.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config file is not valid nginx syntax.
    #[error("failed to parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: ParseError },

    /// The document does not allow the requested operation.
    #[error("{0}")]
    InvalidState(String),

    /// Reload was rejected; the previous file content has been restored.
    #[error("failed to reload load balancer: {0}")]
    ReloadFailed(String),
}

pub type Result<T> = std::result::Result<T, IngressError>;
