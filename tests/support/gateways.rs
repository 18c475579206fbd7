// ABOUTME: Scripted deploy collaborators sharing one call log.
// ABOUTME: The log shows the order of deployer, health and load balancer calls.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use stagehand::config::ConfigError;
use stagehand::deploy::{
    Audits, BalanceStatus, DeployerGateway, Deployment, GatewayError, HealthGateway,
    LoadBalancing,
};
use stagehand::ingress::{IngressError, LoadBalancer};
use stagehand::model::{ClusterNode, Stage};

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn audit(operation: &str, name: &str, old: Option<&str>, new: Option<&str>) -> Audits {
    let mut yaml = format!("audits:\n- !<deployable>\n  operation: {operation}\n  name: {name}\n");
    if old.is_some() || new.is_some() {
        yaml.push_str("  changes:\n  - name: version\n");
        if let Some(old) = old {
            yaml.push_str(&format!("    old-value: {old}\n"));
        }
        if let Some(new) = new {
            yaml.push_str(&format!("    new-value: {new}\n"));
        }
    }
    Audits::parse_yaml(&yaml).unwrap()
}

pub struct MockDeployer {
    log: CallLog,
    pub version: Mutex<Option<String>>,
    /// Answers of successive deploy calls; once exhausted deploys answer a matching change.
    pub deploy_answers: Mutex<VecDeque<Audits>>,
    pub versions: Mutex<Result<Vec<String>, ()>>,
    pub deployments: Mutex<Result<Vec<Deployment>, ()>>,
}

impl MockDeployer {
    pub fn new(log: &CallLog, version: Option<&str>) -> Self {
        Self {
            log: log.clone(),
            version: Mutex::new(version.map(str::to_string)),
            deploy_answers: Mutex::new(VecDeque::new()),
            versions: Mutex::new(Ok(Vec::new())),
            deployments: Mutex::new(Ok(Vec::new())),
        }
    }

    pub fn answer_deploy(&self, audits: Audits) {
        self.deploy_answers.lock().push_back(audits);
    }
}

#[async_trait]
impl DeployerGateway for MockDeployer {
    async fn fetch_deployables(
        &self,
        node: &ClusterNode,
    ) -> Result<Vec<Deployment>, GatewayError> {
        self.log
            .lock()
            .push(format!("fetch_deployables {}", node.host()));
        self.deployments
            .lock()
            .clone()
            .map_err(|()| GatewayError::Timeout {
                uri: format!("http://{}/deployer/", node.host()),
            })
    }

    async fn fetch_version(
        &self,
        node: &ClusterNode,
        app: &str,
    ) -> Result<Option<String>, GatewayError> {
        self.log
            .lock()
            .push(format!("fetch_version {} {}", node.host(), app));
        Ok(self.version.lock().clone())
    }

    async fn fetch_versions(
        &self,
        node: &ClusterNode,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<String>, GatewayError> {
        self.log.lock().push(format!(
            "fetch_versions {} {}:{}",
            node.host(),
            group_id,
            artifact_id
        ));
        self.versions
            .lock()
            .clone()
            .map_err(|()| GatewayError::NotFound {
                uri: format!("http://{}/repository/versions", node.host()),
            })
    }

    async fn deploy(
        &self,
        node: &ClusterNode,
        app: &str,
        version: &str,
    ) -> Result<Audits, GatewayError> {
        self.log
            .lock()
            .push(format!("deploy {} {}@{}", node.host(), app, version));
        let previous = self.version.lock().replace(version.to_string());
        Ok(self
            .deploy_answers
            .lock()
            .pop_front()
            .unwrap_or_else(|| audit("change", app, previous.as_deref(), Some(version))))
    }

    async fn undeploy(&self, node: &ClusterNode, app: &str) -> Result<Audits, GatewayError> {
        self.log
            .lock()
            .push(format!("undeploy {} {}", node.host(), app));
        let previous = self.version.lock().take();
        Ok(audit("remove", app, previous.as_deref(), None))
    }
}

/// Answers health checks from a script, then repeats the last answer.
pub struct MockHealth {
    log: CallLog,
    answers: Mutex<VecDeque<bool>>,
}

impl MockHealth {
    pub fn new(log: &CallLog, answers: &[bool]) -> Self {
        Self {
            log: log.clone(),
            answers: Mutex::new(answers.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl HealthGateway for MockHealth {
    async fn fetch(&self, node: &ClusterNode, app: &str) -> bool {
        self.log.lock().push(format!("health {} {}", node.host(), app));
        let mut answers = self.answers.lock();
        if answers.len() > 1 {
            answers.pop_front().unwrap_or(true)
        } else {
            answers.front().copied().unwrap_or(true)
        }
    }
}

pub struct MockBalancing {
    log: CallLog,
    pub fail_add: Mutex<bool>,
}

impl MockBalancing {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_add: Mutex::new(false),
        }
    }
}

#[async_trait]
impl LoadBalancing for MockBalancing {
    async fn add_to_load_balancer(&self, app: &str, node: &ClusterNode) -> Result<(), IngressError> {
        self.log.lock().push(format!("add {} {}", node.host(), app));
        if *self.fail_add.lock() {
            return Err(IngressError::InvalidState(format!(
                "no reverse proxy found for {} in []",
                node.host()
            )));
        }
        Ok(())
    }

    async fn remove_from_load_balancer(
        &self,
        app: &str,
        node: &ClusterNode,
    ) -> Result<(), IngressError> {
        self.log.lock().push(format!("remove {} {}", node.host(), app));
        Ok(())
    }

    async fn load_balancers(&self, stage: &Stage) -> Result<Vec<LoadBalancer>, IngressError> {
        self.log.lock().push(format!("load_balancers {}", stage.name));
        Ok(vec![LoadBalancer {
            application: format!("{}-app", stage.name.to_lowercase()),
            method: Some("least_conn".to_string()),
            endpoints: Vec::new(),
        }])
    }
}

/// Records balance marks in the call log.
pub struct MockStatus {
    log: CallLog,
}

impl MockStatus {
    pub fn new(log: &CallLog) -> Self {
        Self { log: log.clone() }
    }
}

impl BalanceStatus for MockStatus {
    fn mark_balanced(&self, node: &ClusterNode, app: &str) -> Result<(), ConfigError> {
        self.log
            .lock()
            .push(format!("mark_balanced {} {}", node.host(), app));
        Ok(())
    }

    fn mark_unbalanced(&self, node: &ClusterNode, app: &str) -> Result<(), ConfigError> {
        self.log
            .lock()
            .push(format!("mark_unbalanced {} {}", node.host(), app));
        Ok(())
    }
}
