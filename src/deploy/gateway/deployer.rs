// ABOUTME: Deployer gateway speaking the node deployer's YAML-over-HTTP API.
// ABOUTME: GET lists deployables, POST with a form changes one and answers with audits.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::http::{HttpRequest, send};
use super::{DeployerGateway, Deployment, GatewayError};
use crate::deploy::audit::Audits;
use crate::deploy::scalar;
use crate::model::ClusterNode;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpDeployerGateway {
    timeout: Duration,
}

impl Default for HttpDeployerGateway {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[derive(Debug, Default, Deserialize)]
struct Deployables {
    #[serde(default)]
    deployables: BTreeMap<String, Deployable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Deployable {
    #[serde(default)]
    group_id: Option<String>,
    #[serde(default)]
    artifact_id: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "scalar::deserialize")]
    version: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl Deployable {
    fn into_deployment(self, name: String) -> Deployment {
        let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
        Deployment {
            name,
            group_id: or_dash(self.group_id),
            artifact_id: or_dash(self.artifact_id),
            kind: or_dash(self.kind),
            version: or_dash(self.version),
            error: self.error,
        }
    }
}

impl HttpDeployerGateway {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn base_path(node: &ClusterNode) -> String {
        let path = node.stage().path.trim_matches('/');
        if path.is_empty() {
            String::new()
        } else {
            format!("/{path}")
        }
    }

    async fn get(&self, node: &ClusterNode, path: String) -> Result<String, GatewayError> {
        let host = node.host();
        let request = HttpRequest {
            host: &host,
            port: node.port(),
            method: "GET",
            path,
            form: None,
        };
        send(&request, self.timeout).await?.success(request.uri())
    }

    async fn listing(&self, node: &ClusterNode) -> Result<Deployables, GatewayError> {
        let body = self
            .get(node, format!("{}/", Self::base_path(node)))
            .await?;
        let listing: Option<Deployables> =
            serde_yaml::from_str(&body).map_err(|e| invalid(node, e))?;
        Ok(listing.unwrap_or_default())
    }

    async fn post(&self, node: &ClusterNode, form: String) -> Result<Audits, GatewayError> {
        let host = node.host();
        let request = HttpRequest {
            host: &host,
            port: node.port(),
            method: "POST",
            path: format!("{}/", Self::base_path(node)),
            form: Some(form),
        };
        let uri = request.uri();
        let body = send(&request, self.timeout).await?.success(uri.clone())?;
        Audits::parse_yaml(&body).map_err(|e| GatewayError::InvalidResponse {
            uri,
            message: e.to_string(),
        })
    }
}

fn form(key: &str, value: &str) -> String {
    format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
}

fn invalid(node: &ClusterNode, message: impl ToString) -> GatewayError {
    GatewayError::InvalidResponse {
        uri: format!("http://{}:{}", node.host(), node.port()),
        message: message.to_string(),
    }
}

#[async_trait]
impl DeployerGateway for HttpDeployerGateway {
    async fn fetch_deployables(
        &self,
        node: &ClusterNode,
    ) -> Result<Vec<Deployment>, GatewayError> {
        Ok(self
            .listing(node)
            .await?
            .deployables
            .into_iter()
            .map(|(name, deployable)| deployable.into_deployment(name))
            .collect())
    }

    async fn fetch_version(
        &self,
        node: &ClusterNode,
        app: &str,
    ) -> Result<Option<String>, GatewayError> {
        let Some(deployable) = self.listing(node).await?.deployables.remove(app) else {
            tracing::debug!("{} is not deployed on {}", app, node);
            return Ok(None);
        };
        if let Some(error) = &deployable.error {
            tracing::warn!("{} on {} reports error: {}", app, node, error);
        }
        tracing::debug!("{} on {} is at {:?}", app, node, deployable.version);
        Ok(deployable.version)
    }

    async fn fetch_versions(
        &self,
        node: &ClusterNode,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<String>, GatewayError> {
        let path = format!(
            "{}/repository/versions?artifactId={}&groupId={}",
            Self::base_path(node),
            urlencoding::encode(artifact_id),
            urlencoding::encode(group_id)
        );
        let body = self.get(node, path).await?;
        let versions: Option<Vec<serde_yaml::Value>> =
            serde_yaml::from_str(&body).map_err(|e| invalid(node, e))?;
        Ok(versions
            .unwrap_or_default()
            .into_iter()
            .filter_map(scalar::to_string)
            .collect())
    }

    async fn deploy(
        &self,
        node: &ClusterNode,
        app: &str,
        version: &str,
    ) -> Result<Audits, GatewayError> {
        tracing::info!("deploy {}@{} on {}", app, version, node);
        self.post(node, form(&format!("{app}.version"), version))
            .await
    }

    async fn undeploy(&self, node: &ClusterNode, app: &str) -> Result<Audits, GatewayError> {
        tracing::info!("undeploy {} from {}", app, node);
        self.post(node, form(&format!("{app}.state"), "undeployed"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cluster, Slot, Stage};

    #[test]
    fn form_is_url_encoded() {
        assert_eq!(form("my app.version", "1.0+b"), "my%20app.version=1.0%2Bb");
    }

    #[test]
    fn base_path_comes_from_stage() {
        let cluster = Cluster::new("worker", Slot::default());
        let node = cluster.node(&Stage::new("QA").with_path("/deployer/"), 1);
        assert_eq!(HttpDeployerGateway::base_path(&node), "/deployer");
        let node = cluster.node(&Stage::new("QA"), 1);
        assert_eq!(HttpDeployerGateway::base_path(&node), "/deployer");
        let node = cluster.node(&Stage::new("QA").with_path(""), 1);
        assert_eq!(HttpDeployerGateway::base_path(&node), "");
    }

    #[test]
    fn parses_deployables_with_numeric_versions() {
        let listing: Deployables = serde_yaml::from_str(
            "deployables:\n  foo:\n    group-id: com.example\n    artifact-id: foo\n    version: 1.0\n    type: war\n",
        )
        .unwrap();
        assert_eq!(listing.deployables["foo"].version.as_deref(), Some("1.0"));
        assert!(listing.deployables["foo"].error.is_none());
    }

    #[test]
    fn deployables_become_deployments() {
        let mut listing: Deployables = serde_yaml::from_str(
            "deployables:\n  foo:\n    group-id: com.example\n    artifact-id: foo\n    version: 2\n    type: war\n  bar:\n    error: broken\n",
        )
        .unwrap();
        let foo = listing.deployables.remove("foo").unwrap();
        assert_eq!(
            foo.into_deployment("foo".to_string()),
            Deployment {
                name: "foo".to_string(),
                group_id: "com.example".to_string(),
                artifact_id: "foo".to_string(),
                kind: "war".to_string(),
                version: "2".to_string(),
                error: None,
            }
        );
        let bar = listing.deployables.remove("bar").unwrap();
        let bar = bar.into_deployment("bar".to_string());
        assert_eq!(bar.version, "-");
        assert_eq!(bar.error.as_deref(), Some("broken"));
    }
}
