// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use stagehand::ingress::reload::DEFAULT_PORT;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Keeps staged clusters in sync with their nginx ingress and deploys versions")]
#[command(version)]
pub struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only final results
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Cluster config file (default: cluster-config.yaml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the nginx config files
    #[arg(long, global = true)]
    pub nginx_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// A declared node.
#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// Cluster host, simple name or id
    pub cluster: String,
    /// Stage name
    pub stage: String,
    /// Node index, starting at 1
    pub index: u32,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one reconciliation of all clusters
    Reconcile,

    /// Deploy an application version to a node
    Deploy {
        #[command(flatten)]
        node: NodeArgs,
        app: String,
        version: String,
    },

    /// Undeploy an application from a node
    Undeploy {
        #[command(flatten)]
        node: NodeArgs,
        app: String,
    },

    /// Add a node to an application's load balancer
    Balance {
        #[command(flatten)]
        node: NodeArgs,
        app: String,
    },

    /// Remove a node from an application's load balancer
    Unbalance {
        #[command(flatten)]
        node: NodeArgs,
        app: String,
    },

    /// List what a node's deployer has deployed
    Deployments {
        #[command(flatten)]
        node: NodeArgs,
    },

    /// List the versions a node's deployer knows for an artifact
    Versions {
        #[command(flatten)]
        node: NodeArgs,
        group_id: String,
        artifact_id: String,
    },

    /// Show reverse proxies and load balancers of every stage
    Status,

    /// Serve nginx reloads on a loopback port
    ReloadService {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}
