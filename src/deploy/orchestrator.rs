// ABOUTME: Deploys application versions to single nodes, guarded by load balancer removal.
// ABOUTME: Verifies audits and health, rolls back to the previous version on failure.

use super::audit::Audits;
use super::error::DeployError;
use super::gateway::{
    BalanceStatus, DeployerGateway, Deployment, GatewayError, HealthGateway, LoadBalancing,
};
use super::rebalance::Rebalance;
use crate::ingress::LoadBalancer;
use crate::model::{ClusterNode, Stage};

pub type Result<T> = std::result::Result<T, DeployError>;

pub struct Orchestrator<'a> {
    deployer: &'a dyn DeployerGateway,
    health: &'a dyn HealthGateway,
    balancing: &'a dyn LoadBalancing,
    status: Option<&'a dyn BalanceStatus>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        deployer: &'a dyn DeployerGateway,
        health: &'a dyn HealthGateway,
        balancing: &'a dyn LoadBalancing,
    ) -> Self {
        Self {
            deployer,
            health,
            balancing,
            status: None,
        }
    }

    /// Persists balance and unbalance marks so reconciliation honours them.
    pub fn with_status(mut self, status: &'a dyn BalanceStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Deployments on `node`. A deployer that cannot be asked yields one
    /// placeholder entry carrying the error.
    pub async fn fetch_deployments(&self, node: &ClusterNode) -> Vec<Deployment> {
        tracing::debug!("fetch deployments from {}", node);
        match self.deployer.fetch_deployables(node).await {
            Ok(deployments) => deployments,
            Err(e) => {
                tracing::debug!("GET from deployer on {} failed: {}", node, e);
                vec![Deployment::unreachable(e)]
            }
        }
    }

    /// Deploys `version` of `app` on `node`.
    ///
    /// The node leaves the app's load balancer while its version changes and is
    /// put back on every exit path once that removal could have happened, unless
    /// it is marked unbalanced. A failed audit check or a health flip undeploys and
    /// redeploys the previous version once, then returns the original error.
    pub async fn deploy(&self, node: &ClusterNode, app: &str, version: &str) -> Result<()> {
        let current = self.deployer.fetch_version(node, app).await?;

        let healthy_before = self.health.fetch(node, app).await;
        if !healthy_before {
            tracing::info!(
                "{}@{} on {} is not healthy before deploy",
                app,
                current.as_deref().unwrap_or("-"),
                node
            );
        }

        let rebalance = Rebalance::new(self.balancing, app, node);
        let result = self
            .change_version(node, app, version, current.as_deref(), healthy_before)
            .await;
        if node.is_unbalanced(app) {
            rebalance.keep_out();
        } else {
            rebalance.restore(result.is_err()).await?;
        }
        result
    }

    async fn change_version(
        &self,
        node: &ClusterNode,
        app: &str,
        version: &str,
        current: Option<&str>,
        healthy_before: bool,
    ) -> Result<()> {
        match current {
            Some(current) if current == version => {
                tracing::info!("redeploy {}@{} on {}", app, current, node);
                self.remove(node, app).await?;
            }
            Some(current) => {
                tracing::info!("update {} on {} from {} to {}", app, node, current, version);
                self.balancing.remove_from_load_balancer(app, node).await?;
            }
            None => tracing::info!("install {}@{} on {}", app, version, node),
        }

        let result = self.install(node, app, version, healthy_before).await;
        if let Err(e) = &result {
            self.roll_back(node, app, current, e).await;
        }
        result
    }

    async fn install(
        &self,
        node: &ClusterNode,
        app: &str,
        version: &str,
        healthy_before: bool,
    ) -> Result<()> {
        let audits = self.deployer.deploy(node, app, version).await?;
        log_warnings(&audits);
        audits.expect_deploy(app, version)?;

        if !self.health.fetch(node, app).await {
            tracing::error!("{}@{} on {} is not healthy after deploy", app, version, node);
            if healthy_before {
                return Err(DeployError::HealthFlip {
                    app: app.to_string(),
                    version: version.to_string(),
                    node: node.to_string(),
                });
            }
        }
        Ok(())
    }

    /// One best-effort attempt to get back to `previous`; failures are logged.
    async fn roll_back(
        &self,
        node: &ClusterNode,
        app: &str,
        previous: Option<&str>,
        cause: &DeployError,
    ) {
        tracing::warn!(
            "deploy of {} on {} failed: {}. rolling back to {}",
            app,
            node,
            cause,
            previous.unwrap_or("nothing")
        );
        if let Err(e) = self.deployer.undeploy(node, app).await {
            tracing::warn!("rollback undeploy of {} on {} failed: {}", app, node, e);
        }
        let Some(previous) = previous else {
            return;
        };
        if let Err(e) = self.deployer.deploy(node, app, previous).await {
            tracing::warn!(
                "rollback deploy of {}@{} on {} failed: {}",
                app,
                previous,
                node,
                e
            );
        }
    }

    /// Takes the node out of the load balancer and undeploys `app`. The node is
    /// not re-added; an unbalanced mark is cleared.
    pub async fn undeploy(&self, node: &ClusterNode, app: &str) -> Result<()> {
        self.remove(node, app).await?;
        if let Some(status) = self.status {
            status.mark_balanced(node, app)?;
        }
        Ok(())
    }

    async fn remove(&self, node: &ClusterNode, app: &str) -> Result<()> {
        self.balancing.remove_from_load_balancer(app, node).await?;
        let audits = self.deployer.undeploy(node, app).await?;
        log_warnings(&audits);
        audits.expect_undeploy(app)?;
        Ok(())
    }

    pub async fn balance(&self, node: &ClusterNode, app: &str) -> Result<()> {
        tracing::info!("balance {} on {}", app, node);
        if let Some(status) = self.status {
            status.mark_balanced(node, app)?;
        }
        Ok(self.balancing.add_to_load_balancer(app, node).await?)
    }

    /// Takes the node out of the load balancer and keeps it out of later
    /// reconciliations until it is balanced again.
    pub async fn unbalance(&self, node: &ClusterNode, app: &str) -> Result<()> {
        tracing::info!("unbalance {} on {}", app, node);
        if let Some(status) = self.status {
            status.mark_unbalanced(node, app)?;
        }
        Ok(self.balancing.remove_from_load_balancer(app, node).await?)
    }

    /// Versions the deployer knows for an artifact; none when it knows nothing.
    pub async fn fetch_versions(
        &self,
        node: &ClusterNode,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<String>> {
        match self
            .deployer
            .fetch_versions(node, group_id, artifact_id)
            .await
        {
            Ok(versions) => Ok(versions),
            Err(GatewayError::NotFound { .. }) => {
                tracing::info!(
                    "no versions found for {}:{} on {}",
                    group_id,
                    artifact_id,
                    node
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn load_balancers(&self, stages: &[Stage]) -> Result<Vec<LoadBalancer>> {
        let mut all = Vec::new();
        for stage in stages {
            all.extend(self.balancing.load_balancers(stage).await?);
        }
        Ok(all)
    }
}

fn log_warnings(audits: &Audits) {
    for warning in &audits.warnings {
        tracing::warn!("deployer warning: {}", warning.text);
    }
}
