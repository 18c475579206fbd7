// ABOUTME: Guard that puts a node back into its application's load balancer.
// ABOUTME: restore() must be awaited on every exit path; Drop only reports a missed restore.

use super::error::DeployError;
use super::gateway::LoadBalancing;
use crate::model::ClusterNode;

pub(crate) struct Rebalance<'a> {
    balancing: &'a dyn LoadBalancing,
    app: &'a str,
    node: &'a ClusterNode,
    restored: bool,
}

impl<'a> Rebalance<'a> {
    pub(crate) fn new(balancing: &'a dyn LoadBalancing, app: &'a str, node: &'a ClusterNode) -> Self {
        Self {
            balancing,
            app,
            node,
            restored: false,
        }
    }

    /// Leaves the node out, for nodes marked unbalanced.
    pub(crate) fn keep_out(mut self) {
        self.restored = true;
        tracing::info!(
            "{} stays out of load balancer for {}: marked unbalanced",
            self.node,
            self.app
        );
    }

    /// Re-adds the node. After a failed deploy a re-add failure is only logged, so
    /// the deploy error is the one reported.
    pub(crate) async fn restore(mut self, deploy_failed: bool) -> Result<(), DeployError> {
        self.restored = true;
        match self
            .balancing
            .add_to_load_balancer(self.app, self.node)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if deploy_failed => {
                tracing::warn!(
                    "could not re-add {} to load balancer for {}: {}",
                    self.node,
                    self.app,
                    e
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for Rebalance<'_> {
    fn drop(&mut self) {
        if !self.restored {
            tracing::error!(
                "{} was not re-added to load balancer for {}",
                self.node,
                self.app
            );
        }
    }
}
