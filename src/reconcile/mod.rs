// ABOUTME: One-shot reconciliation of declared topology against containers and ingress config.
// ABOUTME: Starts missing nodes, cleans up surplus ones, and corrects load balancer members.

pub mod container;
pub mod docker;
pub mod error;

pub use container::{ContainerError, ContainerRuntime, ContainerStatus};
pub use docker::{DockerContainerStatus, DockerRuntime};
pub use error::{ReconcileError, ReconcileErrorKind};

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::PathBuf;

use serde::Serialize;
use snafu::ResultExt;

use crate::deploy::DeployerGateway;
use crate::ingress::{Ingress, IngressFactory};
use crate::model::{Cluster, ClusterNode, Endpoint, Stage};
use error::{
    ApplySnafu, OpenIngressSnafu, StartSnafu, StatusSnafu, StopSnafu, UpdateIngressSnafu,
};

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Hosts whose containers were started.
    pub started: Vec<String>,
    /// Containers stopped because their index is beyond the stage count.
    pub stopped: Vec<Endpoint>,
    /// Ingress config files that were written and reloaded.
    pub applied: Vec<PathBuf>,
}

pub struct ClusterReconciler<'a> {
    clusters: &'a [Cluster],
    ingress: &'a IngressFactory,
    runtime: &'a dyn ContainerRuntime,
    deployer: Option<&'a dyn DeployerGateway>,
}

impl<'a> ClusterReconciler<'a> {
    pub fn new(
        clusters: &'a [Cluster],
        ingress: &'a IngressFactory,
        runtime: &'a dyn ContainerRuntime,
    ) -> Self {
        Self {
            clusters,
            ingress,
            runtime,
            deployer: None,
        }
    }

    /// Only nodes where the deployer reports an application join its load
    /// balancer. Without a deployer every running node joins.
    pub fn with_deployer(mut self, deployer: &'a dyn DeployerGateway) -> Self {
        self.deployer = Some(deployer);
        self
    }

    /// Runs one pass. Every distinct ingress file is loaded once, shared by all
    /// stages that use it, and applied at the end only if it changed.
    pub async fn run(&self) -> Result<Reconciliation, ReconcileError> {
        let mut summary = Reconciliation::default();
        let mut documents: BTreeMap<PathBuf, Ingress> = BTreeMap::new();

        for cluster in self.clusters {
            tracing::debug!("reconcile cluster {}", cluster.id());
            let status = self.runtime.status(cluster);
            for stage in &cluster.stages {
                let ingress = match documents.entry(self.ingress.config_path(stage)) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let ingress = self
                            .ingress
                            .open(stage)
                            .await
                            .context(OpenIngressSnafu {
                                stage: stage.name.clone(),
                            })?;
                        entry.insert(ingress)
                    }
                };
                let mut pass = StagePass {
                    cluster,
                    stage,
                    ingress,
                    status: &*status,
                    deployer: self.deployer,
                    summary: &mut summary,
                };
                pass.run().await?;
            }
        }

        for (path, mut ingress) in documents {
            if ingress.has_changed() {
                ingress.apply().await.context(ApplySnafu { path: path.clone() })?;
                summary.applied.push(path);
            } else {
                tracing::debug!("{} unchanged", path.display());
            }
        }
        Ok(summary)
    }
}

struct StagePass<'p> {
    cluster: &'p Cluster,
    stage: &'p Stage,
    ingress: &'p mut Ingress,
    status: &'p dyn ContainerStatus,
    deployer: Option<&'p dyn DeployerGateway>,
    summary: &'p mut Reconciliation,
}

impl StagePass<'_> {
    async fn run(&mut self) -> Result<(), ReconcileError> {
        for index in self.stage.indices() {
            let node = self.cluster.node(self.stage, index);
            self.reconcile_reverse_proxy(&node).await?;
        }

        // Walk past the last declared index until an index needs no cleanup.
        let mut node = self.cluster.node(self.stage, self.stage.count + 1);
        while self.clean_up(&node).await? {
            node = node.next();
        }

        self.reconcile_load_balancers().await
    }

    async fn port(&self, host: &str) -> Result<Option<u16>, ReconcileError> {
        self.status
            .port(host)
            .await
            .context(StatusSnafu { host })
    }

    async fn reconcile_reverse_proxy(&mut self, node: &ClusterNode) -> Result<(), ReconcileError> {
        let host = node.host();
        let actual = match self.port(&host).await? {
            Some(port) => port,
            None => {
                tracing::info!("start missing node {}", node);
                let port = self
                    .status
                    .start(node)
                    .await
                    .context(StartSnafu { node: node.id() })?;
                self.summary.started.push(host);
                port
            }
        };

        let mut proxy = self.ingress.get_or_create_reverse_proxy_for(node);
        let recorded = proxy
            .port()
            .context(UpdateIngressSnafu { node: node.id() })?;
        if recorded != Some(actual) {
            proxy
                .set_port(actual)
                .context(UpdateIngressSnafu { node: node.id() })?;
        }
        Ok(())
    }

    /// Removes every trace of a node beyond the stage count. Returns whether
    /// anything was found.
    async fn clean_up(&mut self, node: &ClusterNode) -> Result<bool, ReconcileError> {
        let host = node.host();
        let mut found = false;

        if let Some(port) = self.port(&host).await? {
            let endpoint = node.endpoint().with_port(port);
            tracing::info!("stop surplus node {} at {}", node, endpoint);
            self.status
                .stop(&endpoint)
                .await
                .context(StopSnafu {
                    endpoint: endpoint.to_string(),
                })?;
            self.summary.stopped.push(endpoint);
            found = true;
        }

        if self.ingress.has_reverse_proxy_for(node) {
            tracing::info!("remove reverse proxy of surplus node {}", node);
            self.ingress.remove_reverse_proxy_for(node);
            found = true;
        }

        for load_balancer in self.ingress.load_balancers() {
            if !load_balancer.has_host(&host) {
                continue;
            }
            if let Some(mut handle) = self.ingress.load_balancer(&load_balancer.application) {
                tracing::info!(
                    "remove surplus node {} from load balancer {}",
                    host,
                    load_balancer.application
                );
                handle.remove_host(&host);
            }
            found = true;
        }

        Ok(found)
    }

    fn declared_node(&self, host: &str) -> Option<ClusterNode> {
        self.stage
            .indices()
            .map(|index| self.cluster.node(self.stage, index))
            .find(|node| node.host() == host)
    }

    async fn is_deployed(&self, node: &ClusterNode, app: &str) -> bool {
        let Some(deployer) = self.deployer else {
            return true;
        };
        match deployer.fetch_version(node, app).await {
            Ok(version) => version.is_some(),
            Err(e) => {
                tracing::warn!("cannot tell whether {} is deployed on {}: {}", app, node, e);
                false
            }
        }
    }

    async fn reconcile_load_balancers(&mut self) -> Result<(), ReconcileError> {
        let declared: Vec<String> = self
            .stage
            .indices()
            .map(|index| self.cluster.node(self.stage, index).host())
            .collect();
        let actual: Vec<Endpoint> = self
            .status
            .endpoints()
            .await
            .context(StatusSnafu {
                host: self.cluster.host.clone(),
            })?
            .into_iter()
            .filter(|endpoint| declared.contains(&endpoint.host))
            .collect();

        for load_balancer in self.ingress.load_balancers() {
            let app = load_balancer.application.as_str();
            let mut unbalanced = Vec::new();
            let mut corrections = Vec::new();
            for member in &load_balancer.endpoints {
                if self
                    .declared_node(&member.host)
                    .is_some_and(|node| node.is_unbalanced(app))
                {
                    unbalanced.push(member.host.as_str());
                    continue;
                }
                // Members without a known container keep their port.
                match self.port(&member.host).await? {
                    Some(port) if port != member.port => corrections.push((member, port)),
                    _ => {}
                }
            }

            if let Some(mut handle) = self.ingress.load_balancer(app) {
                for host in unbalanced {
                    tracing::info!("remove unbalanced node {} from load balancer {}", host, app);
                    handle.remove_host(host);
                }
                for (member, port) in corrections {
                    handle.update_port(member, port);
                }
            }

            let mut missing = Vec::new();
            for endpoint in &actual {
                let member = self
                    .ingress
                    .load_balancer(app)
                    .is_some_and(|handle| handle.has_endpoint(endpoint));
                if member {
                    continue;
                }
                let Some(node) = self.declared_node(&endpoint.host) else {
                    continue;
                };
                if node.is_unbalanced(app) || !self.is_deployed(&node, app).await {
                    continue;
                }
                missing.push(endpoint.clone());
            }

            if !missing.is_empty() {
                let mut handle = self.ingress.get_or_create_load_balancer_for(app);
                for endpoint in missing {
                    handle.add_or_update_endpoint(endpoint);
                }
            }
        }
        Ok(())
    }
}
