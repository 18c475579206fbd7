// ABOUTME: Integration tests for the loopback reload helper and its client.
// ABOUTME: Runs the helper on an ephemeral port and talks the line protocol to it.

mod support;

use std::net::{Ipv4Addr, SocketAddr};

use stagehand::ingress::reload::{ReloadService, ServiceReload};
use stagehand::ingress::Reload;
use support::reload::RecordingReload;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

async fn start(reload: &std::sync::Arc<RecordingReload>) -> (u16, JoinHandle<std::io::Result<()>>) {
    let service = ReloadService::bind_with(
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        reload.clone(),
    )
    .await
    .unwrap();
    let port = service.local_addr().unwrap().port();
    (port, tokio::spawn(service.run()))
}

async fn send(port: u16, commands: &[&str]) -> Vec<String> {
    let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let mut replies = Vec::new();
    for command in commands {
        write
            .write_all(format!("{command}\n").as_bytes())
            .await
            .unwrap();
        replies.push(lines.next_line().await.unwrap().unwrap_or_default());
    }
    replies
}

#[tokio::test]
async fn client_reloads_through_service() {
    support::init_tracing();
    let reload = RecordingReload::new();
    let (port, service) = start(&reload).await;

    ServiceReload::new(port).reload().await.unwrap();
    ServiceReload::new(port).reload().await.unwrap();
    assert_eq!(reload.calls(), 2);

    assert_eq!(send(port, &["stop"]).await, vec!["stopping"]);
    service.await.unwrap().unwrap();
}

#[tokio::test]
async fn protocol_replies() {
    let reload = RecordingReload::new();
    let (port, service) = start(&reload).await;

    assert_eq!(
        send(port, &["reload", "reload", "status", "exit"]).await,
        vec!["reloaded", "reloaded", "unknown command: status", "exiting"]
    );
    assert_eq!(reload.calls(), 2);

    send(port, &["stop"]).await;
    service.await.unwrap().unwrap();
}

#[tokio::test]
async fn failing_reload_is_reported_to_client() {
    let reload = RecordingReload::failing("nginx: [emerg] unknown directive\nin line 3");
    let (port, service) = start(&reload).await;

    let err = ServiceReload::new(port).reload().await.unwrap_err();
    assert_eq!(
        err,
        "reload returned: nginx: [emerg] unknown directive in line 3"
    );

    send(port, &["stop"]).await;
    service.await.unwrap().unwrap();
}
