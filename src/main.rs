use anyhow::{bail, Context as _};
use clap::Parser;
use cloudflarext::{AuthlessClient, HttpApiClientConfig};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};
use tunnel_reconciler::{ConnectorManager, Context, Reconciler, Report, SystemServiceManager};

mod cli;
mod commands;
mod config;

use cli::{Cli, Command};
use config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if cli.dry_run && !cli.command.supports_dry_run() {
        bail!("--dry-run is not supported by this command");
    }

    let settings = Settings::load(cli.config.as_deref(), cli.overrides())?;
    debug!(
        account = ?settings.account,
        cloudflared = %settings.cloudflared,
        "Loaded settings"
    );

    let connector =
        ConnectorManager::new(Arc::new(SystemServiceManager), settings.cloudflared.clone());
    // Built on demand, connector status runs without credentials.
    let context = || -> anyhow::Result<_> {
        let cloudflare_client =
            AuthlessClient::try_new(HttpApiClientConfig::default(), settings.environment())
                .context("failed to build Cloudflare client")?;
        Ok(Context::new(cloudflare_client, settings.auth()?))
    };

    let output = match &cli.command {
        Command::Present(args) => {
            let rules = args.ingress_rules()?;
            let reconciler = Reconciler::new(context()?, connector).dry_run(cli.dry_run);
            return finish(reconciler.present(&args.name, rules).await?);
        }
        Command::Absent { name } => {
            let reconciler = Reconciler::new(context()?, connector).dry_run(cli.dry_run);
            return finish(reconciler.absent(name).await?);
        }
        Command::Dns(command) => commands::dns(context()?, command).await?,
        Command::Tunnel(command) => commands::tunnel(context()?, command).await?,
        Command::Connector(command) => commands::connector(&connector, command).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

fn finish(report: Report) -> anyhow::Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_failure() {
        error!(name = %report.name, "{}", report.comment);
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
