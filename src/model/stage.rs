// ABOUTME: A named environment (DEV, QA, PROD) of a cluster.
// ABOUTME: Carries the node count, host naming scheme and load-balancer settings.

use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_PATH: &str = "deployer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub prefix: String,
    pub suffix: String,
    /// Path of the deployer application on every node.
    pub path: String,
    pub count: u32,
    /// Zero-padding width of the node index; 0 means no padding.
    pub index_length: usize,
    pub load_balancer: BTreeMap<String, String>,
    /// (index, application) pairs taken out of their load balancer on purpose.
    pub unbalanced: BTreeSet<(u32, String)>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
            suffix: String::new(),
            path: DEFAULT_PATH.to_string(),
            count: 1,
            index_length: 0,
            load_balancer: BTreeMap::new(),
            unbalanced: BTreeSet::new(),
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_index_length(mut self, index_length: usize) -> Self {
        self.index_length = index_length;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_load_balancer_config(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.load_balancer.insert(key.into(), value.into());
        self
    }

    pub fn with_unbalanced(mut self, index: u32, application: impl Into<String>) -> Self {
        self.unbalanced.insert((index, application.into()));
        self
    }

    /// Whether the node at `index` must stay out of `application`'s load balancer.
    pub fn is_unbalanced(&self, index: u32, application: &str) -> bool {
        self.unbalanced
            .iter()
            .any(|(i, app)| *i == index && app == application)
    }

    pub fn load_balancer_config(&self, key: &str) -> Option<&str> {
        self.load_balancer.get(key).map(String::as_str)
    }

    /// Declared node indices, ascending.
    pub fn indices(&self) -> impl Iterator<Item = u32> + use<> {
        1..=self.count
    }

    /// The index part of a host name.
    ///
    /// The only node of a single-node stage without padding gets no number at
    /// all. Indices past the declared count are always numbered, so excess nodes
    /// never collide with that node.
    pub fn formatted_index(&self, index: u32) -> String {
        if self.index_length == 0 {
            if self.count == 1 && index == 1 {
                String::new()
            } else {
                index.to_string()
            }
        } else {
            format!("{:0width$}", index, width = self.index_length)
        }
    }
}
