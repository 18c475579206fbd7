// ABOUTME: Strategies that make a running nginx pick up a rewritten config file.
// ABOUTME: Selected per stage from its load-balancer config; custom ones come from a registry.

mod command;
mod service;

pub use command::CommandReload;
pub use service::{DEFAULT_PORT, ReloadService, ServiceReload};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::{IngressError, Result};
use crate::model::Stage;

/// Something that can reload nginx. `Err` carries a human-readable reason.
#[async_trait]
pub trait Reload: Send + Sync {
    async fn reload(&self) -> std::result::Result<(), String>;
}

/// Named custom reload implementations, selected with `reload: custom` and `class: <name>`.
#[derive(Clone, Default)]
pub struct ReloadRegistry {
    entries: HashMap<String, Arc<dyn Reload>>,
}

impl ReloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, reload: Arc<dyn Reload>) -> Self {
        self.entries.insert(name.into(), reload);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Reload>> {
        self.entries.get(name).cloned()
    }
}

impl fmt::Debug for ReloadRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("ReloadRegistry")
            .field("entries", &names)
            .finish()
    }
}

#[derive(Clone)]
pub enum ReloadStrategy {
    /// Ask the reload helper on a loopback port.
    Service { port: u16 },
    /// Run `nginx -s reload` directly.
    Direct,
    /// Run the `nginx-reload` set-user-id script.
    SetUserIdScript,
    /// Send SIGHUP to the nginx container.
    DockerKillHup { host: String },
    Custom { class: String, reload: Arc<dyn Reload> },
}

impl ReloadStrategy {
    pub fn for_stage(stage: &Stage, registry: &ReloadRegistry) -> Result<Self> {
        let mode = stage.load_balancer_config("reload").unwrap_or("service");
        match mode {
            "service" => {
                let port = match stage.load_balancer_config("port") {
                    Some(port) => port.parse().map_err(|_| {
                        IngressError::Config(format!("invalid reload service port: {port}"))
                    })?,
                    None => DEFAULT_PORT,
                };
                Ok(Self::Service { port })
            }
            "direct" => Ok(Self::Direct),
            "set-user-id-script" => Ok(Self::SetUserIdScript),
            "docker-kill-hup" => Ok(Self::DockerKillHup {
                host: stage
                    .load_balancer_config("host")
                    .unwrap_or("localhost")
                    .to_string(),
            }),
            "custom" => {
                let class = stage.load_balancer_config("class").ok_or_else(|| {
                    IngressError::Config("missing 'class' config for 'custom' mode".to_string())
                })?;
                let reload = registry.get(class).ok_or_else(|| {
                    IngressError::Config(format!("no custom reload registered as {class}"))
                })?;
                Ok(Self::Custom {
                    class: class.to_string(),
                    reload,
                })
            }
            other => Err(IngressError::Config(format!(
                "unknown reload mode: {other}"
            ))),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Service { .. } => "service",
            Self::Direct => "direct",
            Self::SetUserIdScript => "set-user-id-script",
            Self::DockerKillHup { .. } => "docker-kill-hup",
            Self::Custom { .. } => "custom",
        }
    }
}

impl fmt::Debug for ReloadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service { port } => f.debug_struct("Service").field("port", port).finish(),
            Self::DockerKillHup { host } => {
                f.debug_struct("DockerKillHup").field("host", host).finish()
            }
            Self::Custom { class, .. } => f.debug_struct("Custom").field("class", class).finish(),
            other => f.write_str(other.mode()),
        }
    }
}

#[async_trait]
impl Reload for ReloadStrategy {
    async fn reload(&self) -> std::result::Result<(), String> {
        tracing::debug!("reload nginx via {:?}", self);
        match self {
            Self::Service { port } => ServiceReload::new(*port).reload().await,
            Self::Direct => CommandReload::direct().reload().await,
            Self::SetUserIdScript => CommandReload::set_user_id_script().reload().await,
            Self::DockerKillHup { host } => CommandReload::docker_kill_hup(host).reload().await,
            Self::Custom { reload, .. } => reload.reload().await,
        }
    }
}
