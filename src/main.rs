// ABOUTME: Entry point for the rolltrack CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, RolloutCommand, TargetArg};
use commands::Policy;
use rolltrack::config::{self, Manifest};
use rolltrack::error::{Error, Result};
use rolltrack::kubectl::{Kubectl, Target};
use rolltrack::multitrack::DEFAULT_TIMEOUT;
use rolltrack::output::Output;
use rolltrack::signals::cancel_on_shutdown_signal;
use rolltrack::types::{Namespace, ResourceKind};
use std::env;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
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

    let mode = cli.output;
    let scope = CancellationToken::new();
    let _watcher = cancel_on_shutdown_signal(scope.clone());

    let result = run(cli, scope.clone()).await;
    scope.cancel();

    if let Err(e) = result {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, scope: CancellationToken) -> Result<()> {
    let namespace = match cli.namespace.as_deref() {
        Some(ns) => Namespace::new(ns).map_err(|e| Error::InvalidConfig(e.to_string()))?,
        None => Namespace::default(),
    };
    let timeout = cli.timeout.map(Duration::from_secs);
    let output = Output::new(cli.output);
    let kubectl = match cli.context {
        Some(context) => Kubectl::new().context(context),
        None => Kubectl::new(),
    };

    match cli.command {
        Commands::Init { name, force } => {
            let cwd = env::current_dir()?;
            config::init_manifest(&cwd, name.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Follow { target } => {
            let (target, name) = resolve_target(target);
            commands::track_one(
                kubectl,
                target,
                &name,
                namespace,
                timeout.unwrap_or(DEFAULT_TIMEOUT),
                Policy::Follow,
                output,
                scope,
            )
            .await
        }
        Commands::Rollout {
            command: RolloutCommand::Track { target },
        } => {
            let (target, name) = resolve_target(target);
            commands::track_one(
                kubectl,
                target,
                &name,
                namespace,
                timeout.unwrap_or(DEFAULT_TIMEOUT),
                Policy::FailFast,
                output,
                scope,
            )
            .await
        }
        Commands::Multitrack { file } => {
            let manifest = match file {
                Some(path) => Manifest::load(&path)?,
                None => Manifest::discover(&env::current_dir()?)?,
            };
            commands::multitrack(kubectl, manifest, &namespace, timeout, output, scope).await
        }
    }
}

fn resolve_target(target: TargetArg) -> (Target, String) {
    match target {
        TargetArg::Job { name } => (Target::Workload(ResourceKind::Job), name),
        TargetArg::Deployment { name } => (Target::Workload(ResourceKind::Deployment), name),
        TargetArg::Pod { name } => (Target::Pod, name),
    }
}
