// ABOUTME: Entry point for the stagehand CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::Context;
use stagehand::error::Result;
use stagehand::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = OutputMode::from_flags(cli.quiet, cli.json);
    if let Err(e) = run(cli, Output::new(mode)).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    match cli.command {
        Commands::ReloadService { port } => commands::reload_service(port, output).await,
        command => {
            let ctx = Context::load(cli.config, cli.nginx_root)?;
            run_with_config(command, &ctx, output).await
        }
    }
}

async fn run_with_config(command: Commands, ctx: &Context, output: Output) -> Result<()> {
    match command {
        Commands::Reconcile => commands::reconcile(ctx, output).await,
        Commands::Deploy { node, app, version } => {
            commands::deploy(ctx, &node, &app, &version, output).await
        }
        Commands::Undeploy { node, app } => commands::undeploy(ctx, &node, &app, output).await,
        Commands::Balance { node, app } => commands::balance(ctx, &node, &app, output).await,
        Commands::Unbalance { node, app } => commands::unbalance(ctx, &node, &app, output).await,
        Commands::Deployments { node } => commands::deployments(ctx, &node, output).await,
        Commands::Versions {
            node,
            group_id,
            artifact_id,
        } => commands::versions(ctx, &node, &group_id, &artifact_id, output).await,
        Commands::Status => commands::status(ctx, output).await,
        Commands::ReloadService { port } => commands::reload_service(port, output).await,
    }
}
