// ABOUTME: Reload that counts its calls and can be told to fail.
// ABOUTME: Registered as a custom reload so tests never touch a real nginx.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use stagehand::ingress::{IngressFactory, Reload, ReloadRegistry};
use stagehand::model::Stage;

pub const CLASS: &str = "recorder";

#[derive(Default)]
pub struct RecordingReload {
    calls: Mutex<usize>,
    failure: Mutex<Option<String>>,
}

impl RecordingReload {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        let reload = Self::default();
        *reload.failure.lock() = Some(reason.to_string());
        Arc::new(reload)
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Reload for RecordingReload {
    async fn reload(&self) -> Result<(), String> {
        *self.calls.lock() += 1;
        match self.failure.lock().clone() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

/// A factory rooted at `root` whose stages reload through `reload`.
pub fn factory(root: &std::path::Path, reload: &Arc<RecordingReload>) -> IngressFactory {
    let reload: Arc<dyn Reload> = reload.clone();
    IngressFactory::new(root).with_registry(ReloadRegistry::new().register(CLASS, reload))
}

/// Stage configured for the recording reload.
pub fn stage(name: &str, count: u32) -> Stage {
    Stage::new(name)
        .with_count(count)
        .with_index_length(2)
        .with_load_balancer_config("reload", "custom")
        .with_load_balancer_config("class", CLASS)
}
