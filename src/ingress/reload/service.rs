// ABOUTME: Line-based loopback protocol for reloading an nginx owned by another user.
// ABOUTME: ReloadService is the privileged helper; ServiceReload is the client strategy.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use super::{CommandReload, Reload};

pub const DEFAULT_PORT: u16 = 6060;

/// Client side: asks the helper on a loopback port to reload.
#[derive(Debug, Clone, Copy)]
pub struct ServiceReload {
    port: u16,
}

impl ServiceReload {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    async fn call(&self) -> io::Result<Result<(), String>> {
        let stream = TcpStream::connect(("127.0.0.1", self.port)).await?;
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        write.write_all(b"reload\n").await?;
        let response = lines.next_line().await?.unwrap_or_default();
        if response != "reloaded" {
            return Ok(Err(format!("reload returned: {response}")));
        }

        write.write_all(b"exit\n").await?;
        let response = lines.next_line().await?.unwrap_or_default();
        if response != "exiting" {
            return Ok(Err(format!("exit returned: {response}")));
        }
        Ok(Ok(()))
    }
}

#[async_trait]
impl Reload for ServiceReload {
    async fn reload(&self) -> Result<(), String> {
        match self.call().await {
            Ok(result) => result,
            Err(e) => Err(format!("nginx-reload adapter failed: {e}")),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Session {
    Closed,
    Stop,
}

/// The helper: serves one connection at a time until told to `stop`.
pub struct ReloadService {
    listener: TcpListener,
    action: Arc<dyn Reload>,
}

impl ReloadService {
    /// Binds with the direct `nginx -s reload` as the reload action.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        Self::bind_with(addr, Arc::new(CommandReload::direct())).await
    }

    pub async fn bind_with(addr: SocketAddr, action: Arc<dyn Reload>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, action })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> io::Result<()> {
        tracing::info!("reload service listening on {}", self.local_addr()?);
        loop {
            let (stream, peer) = self.listener.accept().await?;
            tracing::debug!("connected {}", peer);
            match self.serve(stream, peer).await {
                Ok(Session::Stop) => {
                    tracing::info!("reload service stopped by {}", peer);
                    return Ok(());
                }
                Ok(Session::Closed) => tracing::debug!("disconnected {}", peer),
                Err(e) => tracing::warn!("connection from {} failed: {}", peer, e),
            }
        }
    }

    async fn serve(&self, stream: TcpStream, peer: SocketAddr) -> io::Result<Session> {
        let (read, mut write) = stream.into_split();

        if let Some(rejection) = reject(&peer) {
            tracing::warn!("{}", rejection);
            write.write_all(format!("{rejection}\n").as_bytes()).await?;
            return Ok(Session::Closed);
        }

        let mut lines = BufReader::new(read).lines();
        while let Some(command) = lines.next_line().await? {
            let command = command.trim();
            tracing::debug!("> {}", command);
            let reply = match command {
                "stop" => {
                    write.write_all(b"stopping\n").await?;
                    return Ok(Session::Stop);
                }
                "exit" => {
                    write.write_all(b"exiting\n").await?;
                    return Ok(Session::Closed);
                }
                "reload" => match self.action.reload().await {
                    Ok(()) => "reloaded".to_string(),
                    Err(e) => e.replace('\n', " "),
                },
                other => format!("unknown command: {other}"),
            };
            write.write_all(format!("{reply}\n").as_bytes()).await?;
        }
        Ok(Session::Closed)
    }
}

fn reject(peer: &SocketAddr) -> Option<String> {
    if peer.ip().is_loopback() {
        None
    } else {
        Some(format!(
            "can only connect from localhost not from {}",
            peer.ip()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_remote_peers() {
        assert_eq!(reject(&"127.0.0.1:4000".parse().unwrap()), None);
        assert_eq!(reject(&"[::1]:4000".parse().unwrap()), None);
        assert_eq!(
            reject(&"10.0.0.7:4000".parse().unwrap()).as_deref(),
            Some("can only connect from localhost not from 10.0.0.7")
        );
    }

    #[tokio::test]
    async fn adapter_reports_unreachable_helper() {
        // Bind and drop to find a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = ServiceReload::new(port).reload().await.unwrap_err();
        assert!(err.starts_with("nginx-reload adapter failed: "), "{err}");
    }
}
