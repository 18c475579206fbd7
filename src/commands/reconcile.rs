// ABOUTME: Reconcile command implementation.
// ABOUTME: Runs one pass against the local Docker daemon and reports what changed.

use stagehand::deploy::HttpDeployerGateway;
use stagehand::error::Result;
use stagehand::output::Output;
use stagehand::reconcile::{ClusterReconciler, DockerRuntime};

use super::Context;

pub async fn reconcile(ctx: &Context, mut output: Output) -> Result<()> {
    output.start_timer();
    output.progress(&format!("Reconciling {} cluster(s)", ctx.clusters.len()));

    let runtime = DockerRuntime::connect()?;
    let deployer = HttpDeployerGateway::new(ctx.config.timeouts.deployer);
    let summary = ClusterReconciler::new(&ctx.clusters, &ctx.ingress, &runtime)
        .with_deployer(&deployer)
        .run()
        .await?;

    for host in &summary.started {
        output.progress(&format!("  → started {host}"));
    }
    for endpoint in &summary.stopped {
        output.progress(&format!("  → stopped {endpoint}"));
    }
    for path in &summary.applied {
        output.progress(&format!("  → applied {}", path.display()));
    }

    let text = if summary.applied.is_empty() {
        "Ingress up to date".to_string()
    } else {
        format!("Applied {} ingress config(s)", summary.applied.len())
    };
    output.report(&text, &summary);
    Ok(())
}
