// ABOUTME: Reconciliation error types with SNAFU pattern.
// ABOUTME: Wraps ingress and container failures with the node or file they concern.

use std::path::PathBuf;

use snafu::Snafu;

use super::container::ContainerError;
use crate::ingress::IngressError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReconcileError {
    #[snafu(display("failed to open ingress for stage {stage}: {source}"))]
    OpenIngress { stage: String, source: IngressError },

    #[snafu(display("failed to update ingress for {node}: {source}"))]
    UpdateIngress { node: String, source: IngressError },

    #[snafu(display("failed to apply {}: {source}", path.display()))]
    Apply { path: PathBuf, source: IngressError },

    #[snafu(display("failed to read container status of {host}: {source}"))]
    Status { host: String, source: ContainerError },

    #[snafu(display("failed to start {node}: {source}"))]
    Start { node: String, source: ContainerError },

    #[snafu(display("failed to stop {endpoint}: {source}"))]
    Stop {
        endpoint: String,
        source: ContainerError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileErrorKind {
    /// Stage load-balancer configuration is unusable.
    Config,
    /// Ingress document could not be read, parsed or written.
    Ingress,
    /// nginx rejected the new configuration.
    Reload,
    /// Container runtime failed.
    Container,
}

impl ReconcileError {
    pub fn kind(&self) -> ReconcileErrorKind {
        match self {
            ReconcileError::OpenIngress {
                source: IngressError::Config(_),
                ..
            } => ReconcileErrorKind::Config,
            ReconcileError::Apply {
                source: IngressError::ReloadFailed(_),
                ..
            } => ReconcileErrorKind::Reload,
            ReconcileError::OpenIngress { .. }
            | ReconcileError::UpdateIngress { .. }
            | ReconcileError::Apply { .. } => ReconcileErrorKind::Ingress,
            ReconcileError::Status { .. }
            | ReconcileError::Start { .. }
            | ReconcileError::Stop { .. } => ReconcileErrorKind::Container,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        let config = ReconcileError::OpenIngress {
            stage: "PROD".to_string(),
            source: IngressError::Config("unknown reload mode: x".to_string()),
        };
        assert_eq!(config.kind(), ReconcileErrorKind::Config);

        let reload = ReconcileError::Apply {
            path: PathBuf::from("nginx.conf"),
            source: IngressError::ReloadFailed("boom".to_string()),
        };
        assert_eq!(reload.kind(), ReconcileErrorKind::Reload);
        assert_eq!(
            reload.to_string(),
            "failed to apply nginx.conf: failed to reload load balancer: boom"
        );

        let stop = ReconcileError::Stop {
            endpoint: "worker03:10003".to_string(),
            source: ContainerError::Runtime("gone".to_string()),
        };
        assert_eq!(stop.kind(), ReconcileErrorKind::Container);
    }
}
