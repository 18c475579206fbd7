// ABOUTME: Container status backed by the Docker API through bollard.
// ABOUTME: Containers are named after node hosts; ports come from the slot http port mapping.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{ListContainersOptions, StopContainerOptions};

use super::container::{ContainerError, ContainerRuntime, ContainerStatus};
use crate::model::{Cluster, ClusterNode, Endpoint};

const STOP_TIMEOUT_SECS: i32 = 10;

fn map_not_found_error(e: bollard::errors::Error, name: &str) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ContainerError::NotFound(name.to_string())
        }
        _ => ContainerError::Runtime(format!("{name}: {e}")),
    }
}

/// Connection to the local Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    client: Docker,
}

impl DockerRuntime {
    pub fn new(client: Docker) -> Self {
        Self { client }
    }

    pub fn connect() -> Result<Self, ContainerError> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| ContainerError::Connection(e.to_string()))?;
        Ok(Self::new(client))
    }
}

impl ContainerRuntime for DockerRuntime {
    fn status(&self, cluster: &Cluster) -> Box<dyn ContainerStatus> {
        Box::new(DockerContainerStatus {
            client: self.client.clone(),
            http_port: cluster.slot.http,
        })
    }
}

/// Containers of one cluster, identified by the container-side http port of its slot.
pub struct DockerContainerStatus {
    client: Docker,
    http_port: u16,
}

impl DockerContainerStatus {
    async fn running(&self, name: Option<&str>) -> Result<Vec<Endpoint>, ContainerError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(name) = name {
            filters.insert("name".to_string(), vec![name.to_string()]);
        }
        let opts = ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(|e| ContainerError::Runtime(e.to_string()))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let host = c
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())?;
                // The name filter matches substrings.
                if name.is_some_and(|name| name != host) {
                    return None;
                }
                let port = c
                    .ports
                    .unwrap_or_default()
                    .into_iter()
                    .find(|p| p.private_port == self.http_port)
                    .and_then(|p| p.public_port)?;
                Some(Endpoint::new(host, port))
            })
            .collect())
    }
}

#[async_trait]
impl ContainerStatus for DockerContainerStatus {
    async fn port(&self, host: &str) -> Result<Option<u16>, ContainerError> {
        Ok(self
            .running(Some(host))
            .await?
            .into_iter()
            .next()
            .map(|endpoint| endpoint.port))
    }

    async fn start(&self, node: &ClusterNode) -> Result<u16, ContainerError> {
        let host = node.host();
        tracing::info!("start container {}", host);
        self.client
            .start_container(
                &host,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(|e| map_not_found_error(e, &host))?;
        self.port(&host)
            .await?
            .ok_or(ContainerError::NoPort(host))
    }

    async fn stop(&self, endpoint: &Endpoint) -> Result<(), ContainerError> {
        tracing::info!("stop container {}", endpoint);
        let opts = StopContainerOptions {
            t: Some(STOP_TIMEOUT_SECS),
            signal: None,
        };
        self.client
            .stop_container(&endpoint.host, Some(opts))
            .await
            .map_err(|e| map_not_found_error(e, &endpoint.host))
    }

    async fn endpoints(&self) -> Result<Vec<Endpoint>, ContainerError> {
        self.running(None).await
    }
}
