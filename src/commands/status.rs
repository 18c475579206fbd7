// ABOUTME: Status command implementation.
// ABOUTME: Lists reverse proxies and load balancers of each stage's ingress config.

use std::path::PathBuf;

use serde::Serialize;
use stagehand::error::Result;
use stagehand::ingress::{LoadBalancer, ReverseProxy};
use stagehand::output::Output;

use super::Context;

#[derive(Serialize)]
struct StageStatus {
    cluster: String,
    stage: String,
    config: PathBuf,
    reverse_proxies: Vec<ReverseProxy>,
    load_balancers: Vec<LoadBalancer>,
}

pub async fn status(ctx: &Context, output: Output) -> Result<()> {
    let mut stages = Vec::new();
    for cluster in &ctx.clusters {
        for stage in &cluster.stages {
            let ingress = ctx.ingress.open(stage).await?;
            stages.push(StageStatus {
                cluster: cluster.id(),
                stage: stage.name.clone(),
                config: ingress.path().to_path_buf(),
                reverse_proxies: ingress.reverse_proxies(),
                load_balancers: ingress.load_balancers(),
            });
        }
    }
    output.report(&render(&stages), &stages);
    Ok(())
}

fn render(stages: &[StageStatus]) -> String {
    let mut text = String::new();
    for stage in stages {
        text.push_str(&format!(
            "{} {} ({})\n",
            stage.cluster,
            stage.stage,
            stage.config.display()
        ));
        for proxy in &stage.reverse_proxies {
            let listen = proxy.listen.map_or("-".to_string(), |port| port.to_string());
            let port = proxy.port.map_or("-".to_string(), |port| port.to_string());
            text.push_str(&format!("  proxy {}:{} -> {}\n", proxy.name, listen, port));
        }
        for lb in &stage.load_balancers {
            let endpoints: Vec<String> = lb.endpoints.iter().map(ToString::to_string).collect();
            text.push_str(&format!(
                "  lb    {} [{}] {}\n",
                lb.application,
                lb.method.as_deref().unwrap_or("round-robin"),
                endpoints.join(", ")
            ));
        }
    }
    text.trim_end().to_string()
}
