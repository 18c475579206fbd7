// ABOUTME: Cluster configuration file: slots, clusters and their stages.
// ABOUTME: Parsed with serde_yaml and resolved into the topology model.

mod deserialize;
mod store;

pub use store::ClusterStore;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nonempty::NonEmpty;
use serde::Deserialize;

use crate::model::{Cluster, ClusterNode, HealthConfig, Slot, Stage};
use crate::model::{DEFAULT_HTTP_PORT, DEFAULT_HTTPS_PORT};
use deserialize::{deserialize_clusters, deserialize_settings};

pub const CONFIG_FILENAME: &str = "cluster-config.yaml";
pub const CONFIG_FILENAME_ALT: &str = "cluster-config.yml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found in {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("cluster {cluster} refers to unknown slot {slot}")]
    UnknownSlot { cluster: String, slot: String },

    #[error("unknown cluster: {0}")]
    UnknownCluster(String),

    #[error("cluster {cluster} has no stage {stage}")]
    UnknownStage { cluster: String, stage: String },

    #[error("index {index} of stage {stage} is not in 1..={count}")]
    UnknownIndex { stage: String, index: u32, count: u32 },

    #[error("stage {stage} has invalid status {key}: {value}")]
    InvalidStatus {
        stage: String,
        key: String,
        value: String,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} has no {what}")]
    Missing { path: PathBuf, what: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub slots: BTreeMap<String, SlotConfig>,

    /// Default for stages that set none.
    #[serde(default)]
    pub index_length: usize,

    #[serde(default)]
    pub health: Option<HealthConfig>,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub nginx_root: Option<PathBuf>,

    #[serde(deserialize_with = "deserialize_clusters")]
    pub clusters: NonEmpty<ClusterConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotConfig {
    #[serde(default = "default_http")]
    pub http: u16,
    #[serde(default = "default_https")]
    pub https: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_deployer_timeout", with = "humantime_serde")]
    pub deployer: Duration,
    #[serde(default = "default_health_timeout", with = "humantime_serde")]
    pub health: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            deployer: default_deployer_timeout(),
            health: default_health_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    pub host: String,
    #[serde(default)]
    pub slot: Option<String>,
    /// Overrides the top-level health config.
    #[serde(default)]
    pub health: Option<HealthConfig>,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StageConfig {
    pub name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub index_length: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_settings")]
    pub load_balancer: BTreeMap<String, String>,
    /// `<index>:<app>: unbalanced` marks, maintained by [`ClusterStore`].
    #[serde(default, deserialize_with = "deserialize_settings")]
    pub status: BTreeMap<String, String>,
}

fn default_http() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_https() -> u16 {
    DEFAULT_HTTPS_PORT
}

fn default_deployer_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(ConfigError::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let path = Self::locate(dir)?;
        tracing::debug!("load cluster config {}", path.display());
        Self::load(&path)
    }

    /// The config file in `dir`, `.yaml` before `.yml`.
    pub fn locate(dir: &Path) -> Result<PathBuf> {
        [dir.join(CONFIG_FILENAME), dir.join(CONFIG_FILENAME_ALT)]
            .into_iter()
            .find(|path| path.exists())
            .ok_or_else(|| ConfigError::NotFound(dir.to_path_buf()))
    }

    /// Resolves slots and defaults into clusters, in file order.
    pub fn clusters(&self) -> Result<Vec<Cluster>> {
        self.clusters
            .iter()
            .map(|cluster| self.cluster(cluster))
            .collect()
    }

    fn cluster(&self, config: &ClusterConfig) -> Result<Cluster> {
        let slot = match &config.slot {
            None => Slot::default(),
            Some(name) => {
                let slot = self
                    .slots
                    .get(name)
                    .ok_or_else(|| ConfigError::UnknownSlot {
                        cluster: config.host.clone(),
                        slot: name.clone(),
                    })?;
                Slot::named(name.as_str())
                    .with_http(slot.http)
                    .with_https(slot.https)
            }
        };

        let mut cluster = Cluster::new(config.host.as_str(), slot);
        if let Some(health) = config.health.as_ref().or(self.health.as_ref()) {
            cluster = cluster.with_health(health.clone());
        }

        if config.stages.is_empty() {
            return Ok(cluster.with_stage(Stage::new("").with_index_length(self.index_length)));
        }
        for stage in &config.stages {
            cluster = cluster.with_stage(self.stage(stage)?);
        }
        Ok(cluster)
    }

    fn stage(&self, config: &StageConfig) -> Result<Stage> {
        let mut stage = Stage::new(config.name.as_str())
            .with_prefix(config.prefix.as_str())
            .with_suffix(config.suffix.as_str())
            .with_index_length(config.index_length.unwrap_or(self.index_length));
        if let Some(path) = &config.path {
            stage = stage.with_path(path.as_str());
        }
        if let Some(count) = config.count {
            stage = stage.with_count(count);
        }
        for (key, value) in &config.load_balancer {
            stage = stage.with_load_balancer_config(key.as_str(), value.as_str());
        }
        for (key, value) in &config.status {
            let invalid = || ConfigError::InvalidStatus {
                stage: config.name.clone(),
                key: key.clone(),
                value: value.clone(),
            };
            if value != store::UNBALANCED {
                return Err(invalid());
            }
            let (index, app) = key.split_once(':').ok_or_else(invalid)?;
            let index = index.parse().map_err(|_| invalid())?;
            stage = stage.with_unbalanced(index, app);
        }
        Ok(stage)
    }
}

/// Finds a declared node. `cluster` matches a cluster's host, simple name or id.
pub fn find_node(clusters: &[Cluster], cluster: &str, stage: &str, index: u32) -> Result<ClusterNode> {
    let found = clusters
        .iter()
        .find(|c| c.host == cluster || c.simple_name() == cluster || c.id() == cluster)
        .ok_or_else(|| ConfigError::UnknownCluster(cluster.to_string()))?;
    let declared = found
        .stage(stage)
        .ok_or_else(|| ConfigError::UnknownStage {
            cluster: found.id(),
            stage: stage.to_string(),
        })?;
    if index == 0 || index > declared.count {
        return Err(ConfigError::UnknownIndex {
            stage: declared.name.clone(),
            index,
            count: declared.count,
        });
    }
    Ok(found.node(declared, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
slots:
  "0": { http: 8080, https: 8443 }
index-length: 2
health: { path: "-/health" }
timeouts: { deployer: 30s, health: 2s }
clusters:
  - host: worker.example.com
    slot: "0"
    stages:
      - name: PROD
        count: 2
        load-balancer: { reload: service, port: 6060 }
      - name: DEV
        prefix: dev-
        index-length: 0
  - host: other.example.com
"#;

    #[test]
    fn resolves_slots_and_stages() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.timeouts.health, Duration::from_secs(2));

        let clusters = config.clusters().unwrap();
        assert_eq!(clusters.len(), 2);

        let worker = &clusters[0];
        assert_eq!(worker.slot, Slot::named("0").with_http(8080).with_https(8443));
        assert_eq!(worker.health.as_ref().unwrap().path, "-/health");

        let prod = worker.stage("PROD").unwrap();
        assert_eq!(prod.count, 2);
        assert_eq!(prod.index_length, 2);
        assert_eq!(prod.load_balancer_config("port"), Some("6060"));
        assert_eq!(prod.path, crate::model::DEFAULT_PATH);

        let dev = worker.stage("DEV").unwrap();
        assert_eq!(dev.count, 1);
        assert_eq!(worker.node(dev, 1).host(), "dev-worker");
    }

    #[test]
    fn cluster_without_stages_gets_default_stage() {
        let clusters = Config::from_yaml(YAML).unwrap().clusters().unwrap();
        let other = &clusters[1];
        assert_eq!(other.slot, Slot::default());
        assert_eq!(other.stages, vec![Stage::new("").with_index_length(2)]);
    }

    #[test]
    fn reads_unbalanced_marks() {
        let config = Config::from_yaml(
            "clusters:\n  - host: worker\n    stages:\n      - name: PROD\n        count: 2\n        status: { \"2:foo\": unbalanced }\n",
        )
        .unwrap();
        let clusters = config.clusters().unwrap();
        let prod = clusters[0].stage("PROD").unwrap();
        assert!(clusters[0].node(prod, 2).is_unbalanced("foo"));
        assert!(!clusters[0].node(prod, 1).is_unbalanced("foo"));
    }

    #[test]
    fn rejects_unknown_status() {
        let config = Config::from_yaml(
            "clusters:\n  - host: worker\n    stages:\n      - name: PROD\n        status: { \"1:foo\": sleeping }\n",
        )
        .unwrap();
        assert_eq!(
            config.clusters().unwrap_err().to_string(),
            "stage PROD has invalid status 1:foo: sleeping"
        );
    }

    #[test]
    fn unknown_slot_is_an_error() {
        let config =
            Config::from_yaml("clusters:\n  - host: worker\n    slot: \"9\"\n").unwrap();
        let err = config.clusters().unwrap_err();
        assert_eq!(err.to_string(), "cluster worker refers to unknown slot 9");
    }

    #[test]
    fn requires_a_cluster() {
        let err = Config::from_yaml("clusters: []\n").unwrap_err();
        assert!(err.to_string().contains("at least one cluster is required"));
    }

    #[test]
    fn default_timeouts() {
        let config = Config::from_yaml("clusters:\n  - host: worker\n").unwrap();
        assert_eq!(config.timeouts.deployer, Duration::from_secs(30));
        assert_eq!(config.timeouts.health, Duration::from_secs(5));
        assert!(config.nginx_root.is_none());
    }

    #[test]
    fn finds_declared_nodes_only() {
        let clusters = Config::from_yaml(YAML).unwrap().clusters().unwrap();
        let node = find_node(&clusters, "worker", "PROD", 2).unwrap();
        assert_eq!(node.host(), "worker02");
        assert_eq!(node.port(), 8080);
        assert!(find_node(&clusters, "worker:0", "PROD", 1).is_ok());

        assert!(matches!(
            find_node(&clusters, "worker", "PROD", 3),
            Err(ConfigError::UnknownIndex { .. })
        ));
        assert!(matches!(
            find_node(&clusters, "worker", "QA", 1),
            Err(ConfigError::UnknownStage { .. })
        ));
        assert!(matches!(
            find_node(&clusters, "nope", "PROD", 1),
            Err(ConfigError::UnknownCluster(_))
        ));
    }
}
