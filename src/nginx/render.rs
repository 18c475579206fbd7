// ABOUTME: Canonical text rendering of an nginx configuration document.
// ABOUTME: Four-space indentation, one directive per line, quoting only where needed.

use std::fmt::{self, Display, Formatter, Write};

use super::{NginxConfig, NginxLocation, NginxServer, NginxUpstream, Node};

const INDENT: &str = "    ";

impl Display for NginxConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_nodes(f, &self.nodes, 0)
    }
}

fn write_nodes(f: &mut Formatter<'_>, nodes: &[Node], depth: usize) -> fmt::Result {
    for node in nodes {
        write_node(f, node, depth)?;
    }
    Ok(())
}

fn write_node(f: &mut Formatter<'_>, node: &Node, depth: usize) -> fmt::Result {
    match node {
        Node::Directive { name, args } => directive(f, depth, name, args),
        Node::Comment(text) => writeln!(f, "{}#{text}", INDENT.repeat(depth)),
        Node::Block {
            name,
            args,
            children,
        } => {
            open(f, depth, name, args)?;
            write_nodes(f, children, depth + 1)?;
            close(f, depth)
        }
        Node::Upstream(upstream) => write_upstream(f, upstream, depth),
        Node::Server(server) => write_server(f, server, depth),
    }
}

fn write_upstream(f: &mut Formatter<'_>, upstream: &NginxUpstream, depth: usize) -> fmt::Result {
    open(f, depth, "upstream", std::slice::from_ref(&upstream.name))?;
    if let Some(method) = &upstream.method {
        directive(f, depth + 1, method, &[])?;
    }
    for server in &upstream.servers {
        let mut args = vec![server.endpoint.to_string()];
        args.extend(server.params.iter().cloned());
        directive(f, depth + 1, "server", &args)?;
    }
    write_nodes(f, &upstream.other, depth + 1)?;
    close(f, depth)
}

fn write_server(f: &mut Formatter<'_>, server: &NginxServer, depth: usize) -> fmt::Result {
    open(f, depth, "server", &[])?;
    if !server.names.is_empty() {
        directive(f, depth + 1, "server_name", &server.names)?;
    }
    if let Some(listen) = &server.listen {
        directive(f, depth + 1, "listen", std::slice::from_ref(listen))?;
    }
    write_nodes(f, &server.other, depth + 1)?;
    for location in &server.locations {
        write_location(f, location, depth + 1)?;
    }
    close(f, depth)
}

fn write_location(f: &mut Formatter<'_>, location: &NginxLocation, depth: usize) -> fmt::Result {
    // The path may hold a modifier ("= /health"), which renders as separate words.
    let args: Vec<String> = location.path.split(' ').map(str::to_string).collect();
    open(f, depth, "location", &args)?;
    if let Some(proxy_pass) = &location.proxy_pass {
        directive(f, depth + 1, "proxy_pass", std::slice::from_ref(proxy_pass))?;
    }
    write_nodes(f, &location.other, depth + 1)?;
    close(f, depth)
}

fn directive(f: &mut Formatter<'_>, depth: usize, name: &str, args: &[String]) -> fmt::Result {
    line(f, depth, name, args)?;
    f.write_str(";\n")
}

fn open(f: &mut Formatter<'_>, depth: usize, name: &str, args: &[String]) -> fmt::Result {
    line(f, depth, name, args)?;
    f.write_str(" {\n")
}

fn close(f: &mut Formatter<'_>, depth: usize) -> fmt::Result {
    writeln!(f, "{}}}", INDENT.repeat(depth))
}

fn line(f: &mut Formatter<'_>, depth: usize, name: &str, args: &[String]) -> fmt::Result {
    write!(f, "{}{name}", INDENT.repeat(depth))?;
    for arg in args {
        f.write_char(' ')?;
        word(f, arg)?;
    }
    Ok(())
}

fn word(f: &mut Formatter<'_>, word: &str) -> fmt::Result {
    let needs_quotes = word.is_empty()
        || word
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '{' | '}' | '#' | '"' | '\''));
    if !needs_quotes {
        return f.write_str(word);
    }
    f.write_char('"')?;
    for c in word.chars() {
        if matches!(c, '"' | '\\') {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    f.write_char('"')
}
