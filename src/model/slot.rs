// ABOUTME: Port identity that separates processes sharing one host.
// ABOUTME: Defaults to the plain http/https ports.

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_HTTPS_PORT: u16 = 443;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Logical name; the default slot has none.
    pub name: Option<String>,
    pub http: u16,
    pub https: u16,
}

impl Slot {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            http: DEFAULT_HTTP_PORT,
            https: DEFAULT_HTTPS_PORT,
        }
    }

    pub fn with_http(mut self, http: u16) -> Self {
        self.http = http;
        self
    }

    pub fn with_https(mut self, https: u16) -> Self {
        self.https = https;
        self
    }

    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            name: None,
            http: DEFAULT_HTTP_PORT,
            https: DEFAULT_HTTPS_PORT,
        }
    }
}
