// ABOUTME: Per-application load balancers: upstream `<app>-lb` fronted by a server proxying to it.
// ABOUTME: Detection is structural; the mutable handle re-reads the document on every call.

use serde::Serialize;

use super::LB_SUFFIX;
use crate::model::Endpoint;
use crate::nginx::{NginxConfig, NginxServer, NginxUpstream};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancer {
    pub application: String,
    pub method: Option<String>,
    pub endpoints: Vec<Endpoint>,
}

impl LoadBalancer {
    pub fn has_host(&self, host: &str) -> bool {
        self.endpoints.iter().any(|endpoint| endpoint.host == host)
    }
}

pub(super) fn upstream_name(application: &str) -> String {
    format!("{application}{LB_SUFFIX}")
}

/// The application a server balances for: its root location proxy-passes to
/// `http://<app>-lb/<app>` and that upstream exists.
pub(super) fn application_of(config: &NginxConfig, server: &NginxServer) -> Option<String> {
    let root = server.location("/")?;
    let path = root.proxy_pass_path()?.trim_start_matches('/');
    if path.is_empty() {
        return None;
    }
    let host = root.proxy_pass_host()?;
    let upstream = config.upstream(host)?;
    (upstream.name == upstream_name(path)).then(|| path.to_string())
}

fn targets(server: &NginxServer, upstream: &str) -> bool {
    server
        .location("/")
        .and_then(|location| location.proxy_pass_host())
        == Some(upstream)
}

pub(super) fn snapshot(application: &str, upstream: &NginxUpstream) -> LoadBalancer {
    LoadBalancer {
        application: application.to_string(),
        method: upstream.method.clone(),
        endpoints: upstream.endpoints().cloned().collect(),
    }
}

/// Mutable view of one application's load balancer in a loaded ingress document.
pub struct LoadBalancerMut<'a> {
    config: &'a mut NginxConfig,
    application: String,
}

impl<'a> LoadBalancerMut<'a> {
    pub(super) fn new(config: &'a mut NginxConfig, application: String) -> Self {
        Self {
            config,
            application,
        }
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    fn upstream(&self) -> Option<&NginxUpstream> {
        self.config.upstream(&upstream_name(&self.application))
    }

    pub fn method(&self) -> Option<&str> {
        self.upstream()?.method.as_deref()
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.upstream()
            .map(|upstream| upstream.endpoints().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_host(&self, host: &str) -> bool {
        self.upstream().is_some_and(|upstream| upstream.has_host(host))
    }

    pub fn has_endpoint(&self, endpoint: &Endpoint) -> bool {
        self.upstream()
            .is_some_and(|upstream| upstream.endpoints().any(|e| e == endpoint))
    }

    pub fn snapshot(&self) -> Option<LoadBalancer> {
        self.upstream()
            .map(|upstream| snapshot(&self.application, upstream))
    }

    pub fn add_or_update_endpoint(&mut self, endpoint: Endpoint) {
        let name = upstream_name(&self.application);
        super::ensure_load_balancer(self.config, &self.application);
        let Some(upstream) = self.config.upstream_mut(&name) else {
            return;
        };
        if upstream.has_host(&endpoint.host) {
            tracing::info!("update endpoint {} in {}", endpoint, name);
            upstream.set_port(&endpoint.host, endpoint.port);
        } else {
            tracing::info!("add missing endpoint {} to {}", endpoint, name);
            upstream.add_endpoint(endpoint);
        }
    }

    pub fn update_port(&mut self, endpoint: &Endpoint, port: u16) {
        tracing::info!(
            "load balancer port doesn't match actual: {} -> {}",
            endpoint,
            port
        );
        if let Some(upstream) = self.config.upstream_mut(&upstream_name(&self.application)) {
            upstream.set_port(&endpoint.host, port);
        }
    }

    /// Removes every entry for `host`; an emptied load balancer is deleted.
    pub fn remove_host(&mut self, host: &str) {
        let name = upstream_name(&self.application);
        let Some(upstream) = self.config.upstream_mut(&name) else {
            return;
        };
        upstream.remove_host(host);
        if upstream.is_empty() {
            tracing::info!("remove empty load balancer {}", name);
            self.config.retain_servers(|server| !targets(server, &name));
            self.config.remove_upstream(&name);
        }
    }
}
