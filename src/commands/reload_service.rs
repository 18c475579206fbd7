// ABOUTME: Reload-service command implementation.
// ABOUTME: Serves the loopback reload protocol until a client sends stop.

use std::net::{Ipv4Addr, SocketAddr};

use stagehand::error::Result;
use stagehand::ingress::reload::ReloadService;
use stagehand::output::Output;

pub async fn reload_service(port: u16, output: Output) -> Result<()> {
    let service = ReloadService::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await?;
    output.progress(&format!("Serving nginx reloads on {}", service.local_addr()?));
    service.run().await?;
    output.success("Reload service stopped");
    Ok(())
}
