// ABOUTME: Structured, mutable model of an nginx configuration document.
// ABOUTME: Upstreams, servers and locations are typed; other directives pass through.

mod parse;
mod render;

pub use parse::ParseError;

use crate::model::Endpoint;

/// A parsed nginx configuration.
///
/// Upstreams and servers are looked up in the `http` block when the document has
/// one, at the top level otherwise. Everything else is kept as generic nodes and
/// rendered back unchanged apart from formatting. Comments are kept as nodes;
/// inside typed blocks they render after the typed directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NginxConfig {
    nodes: Vec<Node>,
}

/// One entry of a configuration block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Directive { name: String, args: Vec<String> },
    /// `# text`, stored without the `#`.
    Comment(String),
    Block {
        name: String,
        args: Vec<String>,
        children: Vec<Node>,
    },
    Upstream(NginxUpstream),
    Server(NginxServer),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NginxUpstream {
    pub name: String,
    /// Balancing method directive, e.g. `least_conn`.
    pub method: Option<String>,
    pub servers: Vec<UpstreamServer>,
    pub other: Vec<Node>,
}

/// A `server host:port [params];` line of an upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamServer {
    pub endpoint: Endpoint,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NginxServer {
    pub names: Vec<String>,
    /// The raw `listen` address, e.g. `80` or `127.0.0.1:8080`.
    pub listen: Option<String>,
    pub locations: Vec<NginxLocation>,
    pub other: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NginxLocation {
    pub path: String,
    pub proxy_pass: Option<String>,
    pub other: Vec<Node>,
}

impl NginxConfig {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Ok(Self {
            nodes: parse::parse(text)?,
        })
    }

    fn container(&self) -> &Vec<Node> {
        self.nodes
            .iter()
            .find_map(|node| match node {
                Node::Block { name, children, .. } if name == "http" => Some(children),
                _ => None,
            })
            .unwrap_or(&self.nodes)
    }

    fn container_mut(&mut self) -> &mut Vec<Node> {
        let http = self
            .nodes
            .iter()
            .position(|node| matches!(node, Node::Block { name, .. } if name == "http"));
        match http {
            Some(position) => match &mut self.nodes[position] {
                Node::Block { children, .. } => children,
                _ => unreachable!("position points at the http block"),
            },
            None => &mut self.nodes,
        }
    }

    pub fn upstreams(&self) -> impl Iterator<Item = &NginxUpstream> {
        self.container().iter().filter_map(|node| match node {
            Node::Upstream(upstream) => Some(upstream),
            _ => None,
        })
    }

    pub fn upstream(&self, name: &str) -> Option<&NginxUpstream> {
        self.upstreams().find(|upstream| upstream.name == name)
    }

    pub fn upstream_mut(&mut self, name: &str) -> Option<&mut NginxUpstream> {
        self.container_mut().iter_mut().find_map(|node| match node {
            Node::Upstream(upstream) if upstream.name == name => Some(upstream),
            _ => None,
        })
    }

    /// New upstreams go after the last existing one, or first in the container.
    pub fn add_upstream(&mut self, upstream: NginxUpstream) {
        let container = self.container_mut();
        let position = container
            .iter()
            .rposition(|node| matches!(node, Node::Upstream(_)))
            .map_or(0, |last| last + 1);
        container.insert(position, Node::Upstream(upstream));
    }

    pub fn remove_upstream(&mut self, name: &str) {
        self.container_mut()
            .retain(|node| !matches!(node, Node::Upstream(upstream) if upstream.name == name));
    }

    pub fn servers(&self) -> impl Iterator<Item = &NginxServer> {
        self.container().iter().filter_map(|node| match node {
            Node::Server(server) => Some(server),
            _ => None,
        })
    }

    pub fn server(&self, name: &str, listen: u16) -> Option<&NginxServer> {
        self.servers().find(|server| server.is(name, listen))
    }

    pub fn server_mut(&mut self, name: &str, listen: u16) -> Option<&mut NginxServer> {
        self.container_mut().iter_mut().find_map(|node| match node {
            Node::Server(server) if server.is(name, listen) => Some(server),
            _ => None,
        })
    }

    pub fn add_server(&mut self, server: NginxServer) {
        self.container_mut().push(Node::Server(server));
    }

    pub fn remove_server(&mut self, name: &str, listen: u16) {
        self.retain_servers(|server| !server.is(name, listen));
    }

    pub fn retain_servers(&mut self, mut keep: impl FnMut(&NginxServer) -> bool) {
        self.container_mut().retain(|node| match node {
            Node::Server(server) => keep(server),
            _ => true,
        });
    }
}

impl NginxUpstream {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: None,
            servers: Vec::new(),
            other: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.servers.push(UpstreamServer {
            endpoint,
            params: Vec::new(),
        });
        self
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.servers.iter().map(|server| &server.endpoint)
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn has_host(&self, host: &str) -> bool {
        self.index_of(host).is_some()
    }

    pub fn index_of(&self, host: &str) -> Option<usize> {
        self.servers
            .iter()
            .position(|server| server.endpoint.host == host)
    }

    pub fn add_endpoint(&mut self, endpoint: Endpoint) {
        self.servers.push(UpstreamServer {
            endpoint,
            params: Vec::new(),
        });
    }

    /// Sets the port of the first entry for `host`; false if there is none.
    pub fn set_port(&mut self, host: &str, port: u16) -> bool {
        match self.index_of(host) {
            Some(index) => {
                self.servers[index].endpoint.port = port;
                true
            }
            None => false,
        }
    }

    pub fn remove_host(&mut self, host: &str) {
        self.servers.retain(|server| server.endpoint.host != host);
    }
}

impl NginxServer {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            listen: None,
            locations: Vec::new(),
            other: Vec::new(),
        }
    }

    pub fn with_listen(mut self, port: u16) -> Self {
        self.listen = Some(port.to_string());
        self
    }

    pub fn with_location(mut self, location: NginxLocation) -> Self {
        self.locations.push(location);
        self
    }

    pub fn name(&self) -> &str {
        self.names.first().map_or("", String::as_str)
    }

    /// Port part of the `listen` address.
    pub fn listen_port(&self) -> Option<u16> {
        let listen = self.listen.as_deref()?;
        let port = listen.rsplit_once(':').map_or(listen, |(_, port)| port);
        port.parse().ok()
    }

    fn is(&self, name: &str, listen: u16) -> bool {
        self.names.iter().any(|n| n == name) && self.listen_port() == Some(listen)
    }

    pub fn location(&self, path: &str) -> Option<&NginxLocation> {
        self.locations.iter().find(|location| location.path == path)
    }
}

impl NginxLocation {
    pub fn named(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            proxy_pass: None,
            other: Vec::new(),
        }
    }

    pub fn with_proxy_pass(mut self, uri: impl Into<String>) -> Self {
        self.proxy_pass = Some(uri.into());
        self
    }

    pub fn with_directive(mut self, name: &str, args: &[&str]) -> Self {
        self.other.push(Node::Directive {
            name: name.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        });
        self
    }

    /// Host part of the `proxy_pass` URI, i.e. the upstream it targets.
    pub fn proxy_pass_host(&self) -> Option<&str> {
        let (_, rest) = self.proxy_pass.as_deref()?.split_once("://")?;
        let host = rest.split('/').next()?;
        Some(host.split(':').next().unwrap_or(host))
    }

    /// Path part of the `proxy_pass` URI without leading or trailing slash.
    pub fn proxy_pass_path(&self) -> Option<&str> {
        let (_, rest) = self.proxy_pass.as_deref()?.split_once("://")?;
        let path = rest.split_once('/').map_or("", |(_, path)| path);
        Some(path.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lb_config() -> NginxConfig {
        let mut config = NginxConfig::default();
        config.add_upstream(
            NginxUpstream::named("app-lb")
                .with_method("least_conn")
                .with_endpoint(Endpoint::new("worker01", 10001)),
        );
        config.add_server(
            NginxServer::named("app").with_listen(80).with_location(
                NginxLocation::named("/").with_proxy_pass("http://app-lb/app"),
            ),
        );
        config
    }

    #[test]
    fn finds_upstreams_and_servers() {
        let config = lb_config();
        assert!(config.upstream("app-lb").is_some());
        assert!(config.server("app", 80).is_some());
        assert!(config.server("app", 8080).is_none());
    }

    #[test]
    fn removes_upstreams_and_servers() {
        let mut config = lb_config();
        config.remove_upstream("app-lb");
        config.remove_server("app", 80);
        assert_eq!(config.upstreams().count(), 0);
        assert_eq!(config.servers().count(), 0);
    }

    #[test]
    fn upstream_host_operations() {
        let mut upstream = NginxUpstream::named("app-lb")
            .with_endpoint(Endpoint::new("worker01", 1))
            .with_endpoint(Endpoint::new("worker02", 2));

        assert_eq!(upstream.index_of("worker02"), Some(1));
        assert!(upstream.set_port("worker02", 3));
        assert!(!upstream.set_port("worker03", 3));
        upstream.remove_host("worker01");
        assert_eq!(
            upstream.endpoints().cloned().collect::<Vec<_>>(),
            vec![Endpoint::new("worker02", 3)]
        );
    }

    #[test]
    fn listen_port_accepts_addresses() {
        let mut server = NginxServer::named("x");
        server.listen = Some("127.0.0.1:8080".to_string());
        assert_eq!(server.listen_port(), Some(8080));
    }

    #[test]
    fn splits_proxy_pass_uri() {
        let location = NginxLocation::named("/").with_proxy_pass("http://app-lb/app/");
        assert_eq!(location.proxy_pass_host(), Some("app-lb"));
        assert_eq!(location.proxy_pass_path(), Some("app"));

        let location = NginxLocation::named("/").with_proxy_pass("http://worker01:8080");
        assert_eq!(location.proxy_pass_host(), Some("worker01"));
        assert_eq!(location.proxy_pass_path(), Some(""));
    }

    #[test]
    fn entities_live_inside_http_block() {
        let mut config = NginxConfig::parse("events {}\nhttp {\n  sendfile on;\n}\n").unwrap();
        config.add_upstream(NginxUpstream::named("worker01"));

        let rendered = config.to_string();
        let http = rendered.find("http {").unwrap();
        assert!(rendered.find("upstream worker01").unwrap() > http);
        assert!(config.upstream("worker01").is_some());
    }
}
