//! cmdeploy - declarative lifecycle operators for managed Hadoop clusters
//!
//! This is the main CLI entry point for cmdeploy.

use clap::{Args, Parser, Subcommand};
use cmdeploy::api::CmClient;
use cmdeploy::config::{parse_host_list, ConfigOverrides, OperatorConfig};
use cmdeploy::error::Result;
use cmdeploy::host::LocalExecutor;
use cmdeploy::lifecycle::{self, plan_services, Action, Orchestrator};
use cmdeploy::report::{Outcome, Report};
use cmdeploy::service::ServiceFamily;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// cmdeploy - cluster lifecycle operators
#[derive(Parser)]
#[command(name = "cmdeploy")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Declarative lifecycle operators for managed Hadoop clusters", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OverrideArgs {
    /// Cluster name
    #[arg(long, global = true)]
    name: Option<String>,

    /// Full distribution version, e.g. 5.6.0
    #[arg(long, global = true)]
    full_version: Option<String>,

    /// Comma separated host inventory
    #[arg(long, global = true)]
    hosts: Option<String>,

    /// Comma separated worker hosts
    #[arg(long, global = true)]
    workers: Option<String>,

    /// Comma separated gateway hosts
    #[arg(long, global = true)]
    gateways: Option<String>,

    /// Control-plane host
    #[arg(long, global = true)]
    cm_host: Option<String>,

    /// Control-plane port
    #[arg(long, global = true)]
    cm_port: Option<u16>,

    /// Control-plane admin user
    #[arg(long, global = true)]
    admin_user: Option<String>,

    /// Control-plane admin password
    #[arg(long, global = true, env = "CMDEPLOY_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,

    /// Upper bound on each long-running command, in seconds
    #[arg(long, global = true)]
    wait_timeout: Option<u64>,

    /// Begin the control-plane trial licence first
    #[arg(long, global = true, overrides_with = "no_trial")]
    trial: bool,

    /// Skip the trial licence even if the config file asks for it
    #[arg(long, global = true, overrides_with = "trial")]
    no_trial: bool,

    /// Log and continue past failed finalize steps
    #[arg(long, global = true, overrides_with = "no_best_effort")]
    best_effort: bool,

    /// Abort on the first failed finalize step
    #[arg(long, global = true, overrides_with = "best_effort")]
    no_best_effort: bool,
}

/// Collapse a `--flag` / `--no-flag` pair; neither given keeps the file value
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            name: args.name,
            full_version: args.full_version,
            hosts: args.hosts.as_deref().map(parse_host_list),
            workers: args.workers.as_deref().map(parse_host_list),
            gateways: args.gateways.as_deref().map(parse_host_list),
            cm_host: args.cm_host,
            cm_port: args.cm_port,
            admin_user: args.admin_user,
            admin_password: args.admin_password,
            wait_timeout_secs: args.wait_timeout,
            trial: switch(args.trial, args.no_trial),
            best_effort: switch(args.best_effort, args.no_best_effort),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Bring a cluster to the requested state
    Cluster {
        /// Target state
        #[arg(short, long, value_enum)]
        state: Action,
        /// Services to deploy when the state is present
        #[arg(long = "service", value_enum)]
        services: Vec<ServiceFamily>,
    },

    /// Deploy services onto an existing cluster
    Deploy {
        /// Services to deploy
        #[arg(value_enum, required = true)]
        services: Vec<ServiceFamily>,
    },

    /// Print the planned service layout without contacting the control plane
    Plan {
        /// Services to plan
        #[arg(value_enum, required = true)]
        services: Vec<ServiceFamily>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the report.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let report = match execute(cli).await {
        Ok(Some(outcome)) => Report::Success(outcome),
        Ok(None) => std::process::exit(0),
        Err(e) => {
            tracing::error!("{}", e);
            Report::from(e)
        }
    };

    if let Err(e) = report.emit(std::io::stdout().lock()) {
        tracing::error!("Failed to write report: {}", e);
        std::process::exit(2);
    }
    std::process::exit(report.exit_code());
}

/// Run the command; `None` means output was already written
async fn execute(cli: Cli) -> Result<Option<Outcome>> {
    let mut config = OperatorConfig::load(cli.config.as_deref())?;
    config.apply(cli.overrides.into());

    match cli.command {
        Commands::Plan { services } => {
            let plans = plan_services(&config, &services)?;
            println!("{}", serde_json::to_string_pretty(&plans)?);
            Ok(None)
        }
        Commands::Cluster { state, services } => {
            config.cluster_spec().validate()?;
            let client = CmClient::new(&config.client_config()?)?;
            lifecycle::connect(&client, config.trial).await?;

            let host = LocalExecutor;
            let orch = Orchestrator::new(&client, &host, &config);
            orch.run(state, &services).await.map(Some)
        }
        Commands::Deploy { services } => {
            config.cluster_spec().validate()?;
            let client = CmClient::new(&config.client_config()?)?;
            lifecycle::connect(&client, config.trial).await?;

            let host = LocalExecutor;
            let orch = Orchestrator::new(&client, &host, &config);
            orch.deploy(&services).await.map(Some)
        }
    }
}
