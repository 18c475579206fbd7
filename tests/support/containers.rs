// ABOUTME: In-memory container runtime keyed by host name.
// ABOUTME: Records starts and stops; started nodes get port 10000 + index.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use stagehand::model::{Cluster, ClusterNode, Endpoint};
use stagehand::reconcile::{ContainerError, ContainerRuntime, ContainerStatus};

#[derive(Default)]
struct State {
    running: BTreeMap<String, u16>,
    started: Vec<String>,
    stopped: Vec<Endpoint>,
    fail_start: bool,
}

#[derive(Clone, Default)]
pub struct MockContainers {
    state: Arc<Mutex<State>>,
}

impl MockContainers {
    pub fn with(endpoints: &[(&str, u16)]) -> Self {
        let containers = Self::default();
        for (host, port) in endpoints {
            containers.run(host, *port);
        }
        containers
    }

    pub fn run(&self, host: &str, port: u16) {
        self.state.lock().running.insert(host.to_string(), port);
    }

    pub fn fail_starts(&self) {
        self.state.lock().fail_start = true;
    }

    pub fn running(&self) -> Vec<(String, u16)> {
        self.state
            .lock()
            .running
            .iter()
            .map(|(host, port)| (host.clone(), *port))
            .collect()
    }

    pub fn started(&self) -> Vec<String> {
        self.state.lock().started.clone()
    }

    pub fn stopped(&self) -> Vec<Endpoint> {
        self.state.lock().stopped.clone()
    }
}

#[async_trait]
impl ContainerStatus for MockContainers {
    async fn port(&self, host: &str) -> Result<Option<u16>, ContainerError> {
        Ok(self.state.lock().running.get(host).copied())
    }

    async fn start(&self, node: &ClusterNode) -> Result<u16, ContainerError> {
        let mut state = self.state.lock();
        if state.fail_start {
            return Err(ContainerError::Runtime(format!("cannot start {}", node.host())));
        }
        let port = 10000 + node.index() as u16;
        state.running.insert(node.host(), port);
        state.started.push(node.host());
        Ok(port)
    }

    async fn stop(&self, endpoint: &Endpoint) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        state.running.remove(&endpoint.host);
        state.stopped.push(endpoint.clone());
        Ok(())
    }

    async fn endpoints(&self) -> Result<Vec<Endpoint>, ContainerError> {
        Ok(self
            .state
            .lock()
            .running
            .iter()
            .map(|(host, port)| Endpoint::new(host.as_str(), *port))
            .collect())
    }
}

impl ContainerRuntime for MockContainers {
    fn status(&self, _cluster: &Cluster) -> Box<dyn ContainerStatus> {
        Box::new(self.clone())
    }
}
