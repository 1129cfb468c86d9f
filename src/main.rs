//! Main entry point for the Lobby Warden
//!
//! Loads configuration, initializes logging, and runs one lobby session
//! against the simulated coordinator with graceful shutdown on Ctrl+C.

use anyhow::Result;
use clap::Parser;
use lobby_warden::config::AppConfig;
use lobby_warden::service::LobbyOrchestrator;
use lobby_warden::types::SteamId;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Lobby Warden - tear down stale lobbies, create one fresh lobby, invite and launch
#[derive(Parser)]
#[command(
    name = "lobby-warden",
    version,
    about = "Reconciles a game-coordinator session to exactly one freshly created lobby",
    long_about = "Lobby Warden tears down any lobby the session still holds, creates a new lobby \
                 from the configured details, polls the coordinator cache until the lobby shows \
                 up, then invites the configured members and launches the lobby."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Members to invite
    #[arg(long = "invite", value_name = "STEAM_ID", help = "Invite a member (repeatable)")]
    invite: Vec<SteamId>,

    /// Skip the launch step
    #[arg(long, help = "Do not launch the lobby after inviting")]
    no_launch: bool,

    /// Simulated cache lag override
    #[arg(
        long,
        value_name = "LOOKUPS",
        help = "Lookups the simulated cache misses after a create"
    )]
    convergence_lag: Option<u32>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without running a session")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with session information
fn display_startup_banner(config: &AppConfig) {
    info!("Lobby Warden {}", lobby_warden::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Lobby: {}", config.lobby.game_name);
    info!(
        "   Poll budget: {} x {}ms",
        config.reconcile.poll_attempts, config.reconcile.poll_interval_ms
    );
    info!("   Invitees: {}", config.invite.members.len());
    info!("   Launch: {}", config.invite.launch);
}

/// Load and merge configuration from environment/file and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if !args.invite.is_empty() {
        config.invite.members = args.invite.clone();
    }

    if args.no_launch {
        config.invite.launch = false;
    }

    if let Some(lag) = args.convergence_lag {
        config.simulation.convergence_lag = lag;
    }

    lobby_warden::config::validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config);

    if args.dry_run {
        info!("Configuration validation successful");
        info!("Dry run completed - exiting without running a session");
        return Ok(());
    }

    let (orchestrator, _coordinator) = match LobbyOrchestrator::simulated(config.clone()) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Failed to initialize session: {}", e);
            std::process::exit(1);
        }
    };

    let result = orchestrator.run_until(wait_for_shutdown_signal()).await;

    if config.service.dump_metrics {
        match orchestrator.metrics().gather_text() {
            Ok(text) => info!("Final metrics:\n{}", text),
            Err(e) => warn!("Failed to render metrics: {}", e),
        }
    }

    match result {
        Ok(Some(report)) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!("Failed to serialize session report: {}", e),
            }
            info!("Lobby Warden finished");
            Ok(())
        }
        Ok(None) => {
            info!("Lobby Warden stopped before the session completed");
            Ok(())
        }
        Err(e) => {
            error!("Lobby session failed: {}", e);
            std::process::exit(1);
        }
    }
}
