// ABOUTME: Deploy, undeploy, load balancer membership and deployer listing commands.
// ABOUTME: Wires the HTTP gateways and the ingress engine into the orchestrator.

use stagehand::deploy::{HttpDeployerGateway, HttpHealthGateway, Orchestrator};
use stagehand::error::Result;
use stagehand::output::Output;

use super::Context;
use crate::cli::NodeArgs;

struct Gateways {
    deployer: HttpDeployerGateway,
    health: HttpHealthGateway,
}

impl Gateways {
    fn new(ctx: &Context) -> Self {
        Self {
            deployer: HttpDeployerGateway::new(ctx.config.timeouts.deployer),
            health: HttpHealthGateway::new(ctx.config.timeouts.health),
        }
    }

    fn orchestrator<'a>(&'a self, ctx: &'a Context) -> Orchestrator<'a> {
        Orchestrator::new(&self.deployer, &self.health, &ctx.ingress).with_status(&ctx.store)
    }
}

pub async fn deploy(
    ctx: &Context,
    args: &NodeArgs,
    app: &str,
    version: &str,
    mut output: Output,
) -> Result<()> {
    let node = ctx.node(args)?;
    output.start_timer();
    output.progress(&format!("Deploying {app}@{version} to {node}"));

    let gateways = Gateways::new(ctx);
    gateways
        .orchestrator(ctx)
        .deploy(&node, app, version)
        .await?;

    output.success(&format!("Deployed {app}@{version} to {}", node.host()));
    Ok(())
}

pub async fn undeploy(ctx: &Context, args: &NodeArgs, app: &str, mut output: Output) -> Result<()> {
    let node = ctx.node(args)?;
    output.start_timer();
    output.progress(&format!("Undeploying {app} from {node}"));

    let gateways = Gateways::new(ctx);
    gateways.orchestrator(ctx).undeploy(&node, app).await?;

    output.success(&format!("Undeployed {app} from {}", node.host()));
    Ok(())
}

pub async fn balance(ctx: &Context, args: &NodeArgs, app: &str, output: Output) -> Result<()> {
    let node = ctx.node(args)?;
    let gateways = Gateways::new(ctx);
    gateways.orchestrator(ctx).balance(&node, app).await?;
    output.success(&format!("Added {} to load balancer {app}", node.host()));
    Ok(())
}

pub async fn unbalance(ctx: &Context, args: &NodeArgs, app: &str, output: Output) -> Result<()> {
    let node = ctx.node(args)?;
    let gateways = Gateways::new(ctx);
    gateways.orchestrator(ctx).unbalance(&node, app).await?;
    output.success(&format!("Removed {} from load balancer {app}", node.host()));
    Ok(())
}

pub async fn versions(
    ctx: &Context,
    args: &NodeArgs,
    group_id: &str,
    artifact_id: &str,
    output: Output,
) -> Result<()> {
    let node = ctx.node(args)?;
    let gateways = Gateways::new(ctx);
    let versions = gateways
        .orchestrator(ctx)
        .fetch_versions(&node, group_id, artifact_id)
        .await?;
    output.report(&versions.join("\n"), &versions);
    Ok(())
}

pub async fn deployments(ctx: &Context, args: &NodeArgs, output: Output) -> Result<()> {
    let node = ctx.node(args)?;
    let gateways = Gateways::new(ctx);
    let deployments = gateways.orchestrator(ctx).fetch_deployments(&node).await;
    let text = deployments
        .iter()
        .map(|d| match &d.error {
            Some(error) => format!("{} {}", d.name, error),
            None => format!(
                "{} {}:{}:{} {}",
                d.name, d.group_id, d.artifact_id, d.kind, d.version
            ),
        })
        .collect::<Vec<_>>()
        .join("\n");
    output.report(&text, &deployments);
    Ok(())
}
