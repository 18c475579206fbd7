// ABOUTME: Per-node reverse proxies: an upstream named after the node host with one endpoint.
// ABOUTME: Snapshot type for listing plus a mutable handle for port updates.

use serde::Serialize;

use super::LB_SUFFIX;
use super::error::{IngressError, Result};
use crate::model::Endpoint;
use crate::nginx::{NginxConfig, NginxUpstream};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReverseProxy {
    pub name: String,
    /// Port the fronting server listens on, when there is one.
    pub listen: Option<u16>,
    pub port: Option<u16>,
}

pub(super) fn is_reverse_proxy(upstream: &NginxUpstream) -> bool {
    !upstream.name.ends_with(LB_SUFFIX) && upstream.servers.len() == 1
}

pub(super) fn snapshot(config: &NginxConfig, upstream: &NginxUpstream) -> ReverseProxy {
    let listen = config
        .servers()
        .find(|server| {
            server
                .location("/")
                .and_then(|location| location.proxy_pass_host())
                == Some(upstream.name.as_str())
        })
        .and_then(|server| server.listen_port());
    ReverseProxy {
        name: upstream.name.clone(),
        listen,
        port: upstream.endpoints().next().map(|endpoint| endpoint.port),
    }
}

/// Mutable view of one reverse proxy in a loaded ingress document.
pub struct ReverseProxyMut<'a> {
    config: &'a mut NginxConfig,
    name: String,
}

impl<'a> ReverseProxyMut<'a> {
    pub(super) fn new(config: &'a mut NginxConfig, name: String) -> Self {
        Self { config, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The single endpoint port; `None` while the upstream is still empty.
    pub fn port(&self) -> Result<Option<u16>> {
        let Some(upstream) = self.config.upstream(&self.name) else {
            return Ok(None);
        };
        match upstream.servers.as_slice() {
            [] => Ok(None),
            [server] => Ok(Some(server.endpoint.port)),
            _ => Err(IngressError::InvalidState(format!(
                "expected exactly one endpoint in reverse proxy {} but got {}",
                self.name,
                endpoint_list(upstream)
            ))),
        }
    }

    pub fn set_port(&mut self, port: u16) -> Result<()> {
        tracing::info!("set port of reverse proxy {} to {}", self.name, port);
        let name = self.name.clone();
        let upstream = self.config.upstream_mut(&name).ok_or_else(|| {
            IngressError::InvalidState(format!("no upstream for reverse proxy {name}"))
        })?;
        match upstream.servers.len() {
            0 => upstream.add_endpoint(Endpoint::new(name, port)),
            1 => upstream.servers[0].endpoint.port = port,
            _ => {
                return Err(IngressError::InvalidState(format!(
                    "expected no more than one endpoint in reverse proxy {} but got {}",
                    name,
                    endpoint_list(upstream)
                )));
            }
        }
        Ok(())
    }
}

pub(super) fn endpoint_list(upstream: &NginxUpstream) -> String {
    let endpoints: Vec<String> = upstream.endpoints().map(Endpoint::to_string).collect();
    format!("[{}]", endpoints.join(", "))
}
