// # dyndnsd - dynamic DNS update gateway
//
// Thin integration layer over `dyndns-core`: no DNS, retry or caching logic
// lives here.
//
// The daemon is responsible for:
// 1. Parsing command line flags (with `DYNDNS_*` environment fallbacks)
// 2. Initializing logging and the runtime
// 3. Registering the compiled-in providers
// 4. Loading the configuration and host registry
// 5. Serving `GET /dyndns`, or running a one-shot subcommand
//
// ## Example
//
// ```bash
// export DYNDNS_CONFIG=/etc/dyndns/config.json
// export DYNDNS_LISTEN=0.0.0.0:8080
//
// dyndnsd serve
// dyndnsd update --hostname nas --domain example.org --ip 192.0.2.4
// dyndnsd check
// ```

mod app;
mod cli;
mod server;

use std::net::{Ipv4Addr, SocketAddr};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use dyndns_core::{FileConfigStore, UpdateResult};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::{Cli, Command};
use crate::server::AppState;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (serve failure, failed one-shot update)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::from(cli.log_level))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(cli)).into()
}

async fn run(cli: Cli) -> DdnsExitCode {
    let config_path = cli.config_path();
    info!(config = %config_path.display(), "Starting dyndnsd");

    let store = FileConfigStore::new(&config_path);
    let providers = app::builtin_providers();

    let state = match app::load(&store, &providers).await {
        Ok(state) => state,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    let outcome = match cli.subcommand() {
        Command::Serve => serve(state, cli.listen).await,
        Command::Update { hostname, domain, ip } => update(&state, &hostname, &domain, ip).await,
        Command::Check => {
            check(&state);
            Ok(())
        }
    };

    match outcome {
        Ok(()) => DdnsExitCode::CleanShutdown,
        Err(e) => {
            error!("{:#}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

/// Serve the update endpoint until Rocket's shutdown signals fire
async fn serve(state: AppState, listen: SocketAddr) -> Result<()> {
    info!(listen = %listen, hosts = state.registry.len(), "Serving GET /dyndns");

    server::build(state, listen)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server failed: {}", e))?;

    info!("Shutting down");
    Ok(())
}

/// One-shot reconciliation of a configured host
async fn update(state: &AppState, hostname: &str, domain: &str, ip: Ipv4Addr) -> Result<()> {
    let fqdn = format!("{}.{}", hostname, domain);
    let host = state
        .registry
        .lookup(&fqdn)
        .with_context(|| format!("{} is not configured", fqdn))?;

    let result = state
        .reconciler
        .reconcile(&host, ip)
        .await
        .with_context(|| format!("update of {} failed", host.fqdn()))?;

    match result {
        UpdateResult::Unchanged { current_ip } => {
            println!("{} unchanged ({})", host.fqdn(), current_ip)
        }
        UpdateResult::Updated { previous_ip, new_ip } => match previous_ip {
            Some(previous) => println!("{} updated {} -> {}", host.fqdn(), previous, new_ip),
            None => println!("{} updated to {}", host.fqdn(), new_ip),
        },
    }
    Ok(())
}

fn check(state: &AppState) {
    for fqdn in state.registry.fqdns() {
        println!("{}", fqdn);
    }
    info!(hosts = state.registry.len(), "Configuration is valid");
}
