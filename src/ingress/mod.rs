// ABOUTME: Ingress configuration engine: a per-stage view over the nginx config file.
// ABOUTME: Classifies upstreams, creates missing entities, and applies with reload and rollback.

pub mod error;
mod load_balancer;
pub mod reload;
mod reverse_proxy;

pub use error::{IngressError, Result};
pub use load_balancer::{LoadBalancer, LoadBalancerMut};
pub use reload::{Reload, ReloadRegistry, ReloadStrategy};
pub use reverse_proxy::{ReverseProxy, ReverseProxyMut};

use std::path::{Path, PathBuf};

use crate::model::{ClusterNode, Endpoint, Stage};
use crate::nginx::{NginxConfig, NginxLocation, NginxServer, NginxUpstream};

pub const DEFAULT_ROOT: &str = "/usr/local/etc/nginx";

const LB_SUFFIX: &str = "-lb";
const LOAD_BALANCER_LISTEN: u16 = 80;

/// Opens ingress documents below a config root.
#[derive(Debug, Clone)]
pub struct IngressFactory {
    root: PathBuf,
    registry: ReloadRegistry,
}

impl Default for IngressFactory {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl IngressFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            registry: ReloadRegistry::default(),
        }
    }

    pub fn with_registry(mut self, registry: ReloadRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `config-path` from the stage, else `<prefix>nginx<suffix>.conf`, below the root.
    pub fn config_path(&self, stage: &Stage) -> PathBuf {
        match stage.load_balancer_config("config-path") {
            Some(path) => self.root.join(path),
            None => self
                .root
                .join(format!("{}nginx{}.conf", stage.prefix, stage.suffix)),
        }
    }

    pub async fn open(&self, stage: &Stage) -> Result<Ingress> {
        let reload = ReloadStrategy::for_stage(stage, &self.registry)?;
        Ingress::load(self.config_path(stage), reload).await
    }
}

/// A loaded ingress document. Mutations stay in memory until [`Ingress::apply`].
#[derive(Debug)]
pub struct Ingress {
    path: PathBuf,
    config: NginxConfig,
    /// File content as read, written back when a reload fails. `None` when the
    /// file did not exist.
    original_text: Option<String>,
    /// Rendering at load time, for change detection.
    original: String,
    reload: ReloadStrategy,
}

impl Ingress {
    pub async fn load(path: PathBuf, reload: ReloadStrategy) -> Result<Self> {
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} not found, starting empty", path.display());
                None
            }
            Err(source) => return Err(IngressError::Io { path, source }),
        };
        let config = match NginxConfig::parse(text.as_deref().unwrap_or_default()) {
            Ok(config) => config,
            Err(source) => return Err(IngressError::Parse { path, source }),
        };
        Ok(Self {
            original: config.to_string(),
            original_text: text,
            path,
            config,
            reload,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &NginxConfig {
        &self.config
    }

    pub fn has_changed(&self) -> bool {
        self.config.to_string() != self.original
    }

    pub fn reverse_proxies(&self) -> Vec<ReverseProxy> {
        self.config
            .upstreams()
            .filter(|upstream| reverse_proxy::is_reverse_proxy(upstream))
            .map(|upstream| reverse_proxy::snapshot(&self.config, upstream))
            .collect()
    }

    pub fn load_balancers(&self) -> Vec<LoadBalancer> {
        self.config
            .servers()
            .filter_map(|server| load_balancer::application_of(&self.config, server))
            .filter_map(|application| {
                let upstream = self
                    .config
                    .upstream(&load_balancer::upstream_name(&application))?;
                Some(load_balancer::snapshot(&application, upstream))
            })
            .collect()
    }

    pub fn has_reverse_proxy_for(&self, node: &ClusterNode) -> bool {
        self.config.upstream(&node.host()).is_some()
    }

    pub fn get_or_create_reverse_proxy_for(&mut self, node: &ClusterNode) -> ReverseProxyMut<'_> {
        let host = node.host();
        get_or_create_server(&mut self.config, &host, node.port(), &host, "");
        get_or_create_upstream(&mut self.config, &host);
        ReverseProxyMut::new(&mut self.config, host)
    }

    /// Deletes the node's server and upstream; a no-op when there are none.
    pub fn remove_reverse_proxy_for(&mut self, node: &ClusterNode) {
        let host = node.host();
        self.config.remove_server(&host, node.port());
        self.config.remove_upstream(&host);
    }

    pub fn get_or_create_load_balancer_for(&mut self, application: &str) -> LoadBalancerMut<'_> {
        ensure_load_balancer(&mut self.config, application);
        LoadBalancerMut::new(&mut self.config, application.to_string())
    }

    pub fn load_balancer(&mut self, application: &str) -> Option<LoadBalancerMut<'_>> {
        self.config
            .upstream(&load_balancer::upstream_name(application))?;
        Some(LoadBalancerMut::new(
            &mut self.config,
            application.to_string(),
        ))
    }

    pub async fn add_to_load_balancer(&mut self, application: &str, node: &ClusterNode) -> Result<()> {
        let host = node.host();
        if !self.has_reverse_proxy_for(node) {
            let names: Vec<String> = self
                .reverse_proxies()
                .into_iter()
                .map(|proxy| proxy.name)
                .collect();
            return Err(IngressError::InvalidState(format!(
                "no reverse proxy found for {host} in [{}]",
                names.join(", ")
            )));
        }
        let port = self
            .get_or_create_reverse_proxy_for(node)
            .port()?
            .ok_or_else(|| {
                IngressError::InvalidState(format!("reverse proxy for {host} has no port"))
            })?;
        self.get_or_create_load_balancer_for(application)
            .add_or_update_endpoint(Endpoint::new(host, port));
        self.apply_if_changed().await
    }

    pub async fn remove_from_load_balancer(
        &mut self,
        application: &str,
        node: &ClusterNode,
    ) -> Result<()> {
        let host = node.host();
        match self.load_balancer(application) {
            Some(mut load_balancer) => {
                tracing::info!("remove {} from load balancer for {}", host, application);
                load_balancer.remove_host(&host);
            }
            None => {
                tracing::debug!("no load balancer found for {}", application);
                return Ok(());
            }
        }
        self.apply_if_changed().await
    }

    async fn apply_if_changed(&mut self) -> Result<()> {
        if self.has_changed() {
            self.apply().await
        } else {
            Ok(())
        }
    }

    /// Writes the document and reloads nginx. When the reload fails the previous
    /// file content is restored; the in-memory document keeps its mutations.
    pub async fn apply(&mut self) -> Result<()> {
        let rendered = self.config.to_string();
        tracing::info!("apply ingress config {}", self.path.display());
        self.write(&rendered).await?;

        tracing::info!("reload ingress via {}", self.reload.mode());
        if let Err(reason) = self.reload.reload().await {
            tracing::warn!(
                "failed to reload load balancer: {}. restoring original config in {}",
                reason,
                self.path.display()
            );
            if let Err(e) = self.restore().await {
                tracing::error!("{}", e);
            }
            return Err(IngressError::ReloadFailed(reason));
        }

        self.original = rendered.clone();
        self.original_text = Some(rendered);
        Ok(())
    }

    async fn restore(&self) -> Result<()> {
        match &self.original_text {
            Some(text) => self.write(text).await,
            None => tokio::fs::remove_file(&self.path)
                .await
                .map_err(|source| IngressError::Io {
                    path: self.path.clone(),
                    source,
                }),
        }
    }

    async fn write(&self, text: &str) -> Result<()> {
        tokio::fs::write(&self.path, text)
            .await
            .map_err(|source| IngressError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

pub(crate) fn ensure_load_balancer(config: &mut NginxConfig, application: &str) {
    let upstream = load_balancer::upstream_name(application);
    get_or_create_server(
        config,
        application,
        LOAD_BALANCER_LISTEN,
        &upstream,
        application,
    );
    get_or_create_upstream(config, &upstream);
}

fn get_or_create_server(
    config: &mut NginxConfig,
    name: &str,
    listen: u16,
    upstream: &str,
    path: &str,
) {
    if config.server(name, listen).is_none() {
        tracing::info!("create missing server {}:{}", name, listen);
        config.add_server(NginxServer::named(name).with_listen(listen));
    }
    let Some(server) = config.server_mut(name, listen) else {
        return;
    };
    if server.location("/").is_none() {
        tracing::info!("create missing location '/' in server {}", name);
        server.locations.push(
            NginxLocation::named("/")
                .with_proxy_pass(format!("http://{upstream}/{path}"))
                .with_directive("proxy_set_header", &["Host", "$host"])
                .with_directive("proxy_set_header", &["X-Real-IP", "$remote_addr"]),
        );
    }
}

fn get_or_create_upstream(config: &mut NginxConfig, name: &str) {
    if config.upstream(name).is_none() {
        tracing::info!("create missing upstream {}", name);
        config.add_upstream(NginxUpstream::named(name).with_method("least_conn"));
    }
}
