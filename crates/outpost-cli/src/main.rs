//! Outpost - LDAP bind bridge to authentication flows
//!
//! Runs a single bind through the configured flow and access check, or
//! validates a configuration file.

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use outpost_core::config::OutpostConfig;
use outpost_ldap::{BindRequest, BindRouter};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "outpost")]
#[command(author = "Outpost Team")]
#[command(version = outpost_core::VERSION)]
#[command(about = "LDAP bind bridge to authentication flows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "OUTPOST_CONFIG")]
    config: Option<String>,

    /// Flow engine base URL
    #[arg(long, global = true, env = "OUTPOST_HOST")]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "OUTPOST_LOG_LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and list providers
    CheckConfig,

    /// Perform one simple bind and print the LDAP result
    Bind {
        /// Bind DN
        #[arg(long)]
        dn: String,

        /// Bind password
        #[arg(long, env = "OUTPOST_BIND_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => OutpostConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => OutpostConfig::from_env(),
    };

    // Override with CLI args
    if let Some(host) = cli.host {
        config.api.host = host;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config);

    match cli.command {
        Commands::Version => {
            println!("outpost {}", outpost_core::VERSION);
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckConfig => {
            let router = BindRouter::from_config(&config)?;
            println!("Flow engine: {}", config.api.host);
            for provider in router.providers() {
                println!(
                    "  {:<16} {:<32} flow={} application={}",
                    provider.name(),
                    provider.base_dn(),
                    provider.config().flow_slug,
                    provider.config().application_slug
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Bind { dn, password } => {
            let router = BindRouter::from_config(&config)?;
            let request = BindRequest::new(dn, password);

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, abandoning bind");
                    on_signal.cancel();
                }
            });

            let outcome = router.bind_with_cancel(&request, &cancel).await;
            info!(dn = %request.dn, result = %outcome, "Bind finished");
            println!("{outcome}");

            Ok(if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(outcome.code() as u8)
            })
        }
    }
}

fn init_logging(config: &OutpostConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let json = config.logging.format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_target(true).with_writer(std::io::stderr)))
        .init();
}
