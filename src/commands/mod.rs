// ABOUTME: Command module aggregator for the stagehand CLI.
// ABOUTME: Loads the cluster config shared by all commands that need one.

mod deploy;
mod reconcile;
mod reload_service;
mod status;

pub use deploy::{balance, deploy, deployments, unbalance, undeploy, versions};
pub use reconcile::reconcile;
pub use reload_service::reload_service;
pub use status::status;

use std::env;
use std::path::PathBuf;

use stagehand::config::{self, ClusterStore, Config};
use stagehand::error::Result;
use stagehand::ingress::{DEFAULT_ROOT, IngressFactory};
use stagehand::model::{Cluster, ClusterNode};

use crate::cli::NodeArgs;

/// Everything a command needs from the cluster config file.
pub struct Context {
    pub config: Config,
    /// Where `config` was read from; balance marks are written back there.
    pub store: ClusterStore,
    pub clusters: Vec<Cluster>,
    pub ingress: IngressFactory,
}

impl Context {
    pub fn load(path: Option<PathBuf>, nginx_root: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Config::locate(&env::current_dir()?)?,
        };
        tracing::debug!("load cluster config {}", path.display());
        let config = Config::load(&path)?;
        let clusters = config.clusters()?;
        let root = nginx_root
            .or_else(|| config.nginx_root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
        tracing::debug!("nginx config root {}", root.display());
        Ok(Self {
            ingress: IngressFactory::new(root),
            store: ClusterStore::new(path),
            config,
            clusters,
        })
    }

    pub fn node(&self, args: &NodeArgs) -> Result<ClusterNode> {
        Ok(config::find_node(
            &self.clusters,
            &args.cluster,
            &args.stage,
            args.index,
        )?)
    }
}
