// ABOUTME: Tokenizer and recursive parser for nginx configuration text.
// ABOUTME: Lifts upstream/server/location blocks into typed entities; comments become nodes.

use thiserror::Error;

use super::{NginxLocation, NginxServer, NginxUpstream, Node, UpstreamServer};
use crate::model::Endpoint;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    /// Text after `#` up to the end of the line.
    Comment(String),
    Open,
    Close,
    Semicolon,
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '#' => {
                let mut text = String::new();
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    text.push(next);
                    chars.next();
                }
                tokens.push((Token::Comment(text.trim_end().to_string()), line));
            }
            '{' => tokens.push((Token::Open, line)),
            '}' => tokens.push((Token::Close, line)),
            ';' => tokens.push((Token::Semicolon, line)),
            '"' | '\'' => {
                let start = line;
                let mut word = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => break,
                        Some('\\') => {
                            if let Some(escaped) = chars.next() {
                                word.push(escaped);
                            }
                        }
                        Some(other) => {
                            if other == '\n' {
                                line += 1;
                            }
                            word.push(other);
                        }
                        None => {
                            return Err(ParseError {
                                line: start,
                                message: "unterminated quoted string".to_string(),
                            });
                        }
                    }
                }
                tokens.push((Token::Word(word), start));
            }
            c => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || matches!(next, '{' | '}' | ';') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push((Token::Word(word), line));
            }
        }
    }
    Ok(tokens)
}

pub(super) fn parse(text: &str) -> Result<Vec<Node>, ParseError> {
    let tokens = tokenize(text)?;
    let mut position = 0;
    let nodes = parse_block(&tokens, &mut position, true)?;
    Ok(nodes.into_iter().map(|node| lift(node, true)).collect())
}

fn parse_block(
    tokens: &[(Token, usize)],
    position: &mut usize,
    top_level: bool,
) -> Result<Vec<Node>, ParseError> {
    let mut nodes = Vec::new();
    let mut words: Vec<String> = Vec::new();

    while let Some((token, line)) = tokens.get(*position) {
        *position += 1;
        match token {
            Token::Word(word) => words.push(word.clone()),
            // A comment inside an unfinished directive has no place to go.
            Token::Comment(text) if words.is_empty() => nodes.push(Node::Comment(text.clone())),
            Token::Comment(_) => {}
            Token::Semicolon => {
                let mut words = std::mem::take(&mut words).into_iter();
                let name = words.next().ok_or_else(|| ParseError {
                    line: *line,
                    message: "unexpected ';'".to_string(),
                })?;
                nodes.push(Node::Directive {
                    name,
                    args: words.collect(),
                });
            }
            Token::Open => {
                let mut words = std::mem::take(&mut words).into_iter();
                let name = words.next().ok_or_else(|| ParseError {
                    line: *line,
                    message: "block without a name".to_string(),
                })?;
                let children = parse_block(tokens, position, false)?;
                nodes.push(Node::Block {
                    name,
                    args: words.collect(),
                    children,
                });
            }
            Token::Close => {
                if top_level {
                    return Err(ParseError {
                        line: *line,
                        message: "unexpected '}'".to_string(),
                    });
                }
                return dangling(&words, *line).map(|()| nodes);
            }
        }
    }

    let line = tokens.last().map_or(1, |(_, line)| *line);
    if !top_level {
        return Err(ParseError {
            line,
            message: "missing '}'".to_string(),
        });
    }
    dangling(&words, line).map(|()| nodes)
}

fn dangling(words: &[String], line: usize) -> Result<(), ParseError> {
    match words.first() {
        Some(word) => Err(ParseError {
            line,
            message: format!("directive '{word}' is missing ';'"),
        }),
        None => Ok(()),
    }
}

/// Turns generic blocks into typed entities where they are managed: at the top
/// level and directly inside `http`.
fn lift(node: Node, managed: bool) -> Node {
    match node {
        Node::Block {
            name,
            args,
            children,
        } => match name.as_str() {
            "upstream" if managed && args.len() == 1 => {
                Node::Upstream(upstream(args[0].clone(), children))
            }
            "server" if managed && args.is_empty() => Node::Server(server(children)),
            "http" if managed => Node::Block {
                name,
                args,
                children: children.into_iter().map(|c| lift(c, true)).collect(),
            },
            _ => Node::Block {
                name,
                args,
                children,
            },
        },
        other => other,
    }
}

fn upstream(name: String, children: Vec<Node>) -> NginxUpstream {
    let mut upstream = NginxUpstream::named(name);
    for child in children {
        match child {
            Node::Directive { name, args } if name == "server" => {
                match args.split_first().and_then(|(address, params)| {
                    Some(UpstreamServer {
                        endpoint: endpoint(address)?,
                        params: params.to_vec(),
                    })
                }) {
                    Some(server) => upstream.servers.push(server),
                    None => upstream.other.push(Node::Directive { name, args }),
                }
            }
            Node::Directive { name, args }
                if args.is_empty() && upstream.method.is_none() && is_method(&name) =>
            {
                upstream.method = Some(name);
            }
            other => upstream.other.push(other),
        }
    }
    upstream
}

fn is_method(name: &str) -> bool {
    matches!(name, "least_conn" | "ip_hash" | "random" | "least_time")
}

fn endpoint(address: &str) -> Option<Endpoint> {
    if address.starts_with("unix:") {
        return None;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => Some(Endpoint::new(host, port.parse().ok()?)),
        None => Some(Endpoint::new(address, 80)),
    }
}

fn server(children: Vec<Node>) -> NginxServer {
    let mut server = NginxServer {
        names: Vec::new(),
        listen: None,
        locations: Vec::new(),
        other: Vec::new(),
    };
    for child in children {
        match child {
            Node::Directive { name, args } if name == "server_name" && server.names.is_empty() => {
                server.names = args;
            }
            Node::Directive { name, args }
                if name == "listen" && server.listen.is_none() && args.len() == 1 =>
            {
                server.listen = args.into_iter().next();
            }
            Node::Block {
                name,
                args,
                children,
            } if name == "location" && !args.is_empty() => {
                server.locations.push(location(args.join(" "), children));
            }
            other => server.other.push(other),
        }
    }
    server
}

fn location(path: String, children: Vec<Node>) -> NginxLocation {
    let mut location = NginxLocation::named(path);
    for child in children {
        match child {
            Node::Directive { name, args }
                if name == "proxy_pass" && location.proxy_pass.is_none() && args.len() == 1 =>
            {
                location.proxy_pass = args.into_iter().next();
            }
            other => location.other.push(other),
        }
    }
    location
}
