// ABOUTME: Health gateway probing an application's health path over HTTP.
// ABOUTME: Anything but a 200 within the timeout counts as unhealthy.

use std::time::Duration;

use async_trait::async_trait;

use super::HealthGateway;
use super::http::{HttpRequest, send};
use crate::model::ClusterNode;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct HttpHealthGateway {
    timeout: Duration,
}

impl Default for HttpHealthGateway {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl HttpHealthGateway {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl HealthGateway for HttpHealthGateway {
    async fn fetch(&self, node: &ClusterNode, app: &str) -> bool {
        let Some(health) = &node.cluster().health else {
            return true;
        };
        let host = node.host();
        let request = HttpRequest {
            host: &host,
            port: node.port(),
            method: "GET",
            path: format!("/{}/{}", app, health.path.trim_start_matches('/')),
            form: None,
        };
        match send(&request, self.timeout).await {
            Ok(response) if response.status == 200 => true,
            Ok(response) => {
                tracing::debug!("{} answered {}", request.uri(), response.status);
                false
            }
            Err(e) => {
                tracing::debug!("health check failed: {}", e);
                false
            }
        }
    }
}
