mod http;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use headlessd_config::{HeadlessdConfig, Severity};
use headlessd_core::{CoreApi, Ports};
use headlessd_metrics::{MetricsRecorderConfig, init_metrics};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "headlessd", about = "Headless-browser automation service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides `ambient.logging.level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON. Overrides `ambient.logging.json`.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Path to a config file (overrides the discovery search order).
    #[arg(long, global = true, env = "HEADLESSD_CONFIG")]
    config: Option<PathBuf>,

    /// Address the `/healthz` and `/metrics` endpoints bind to.
    /// Overrides `ambient.metrics.prometheus_addr`.
    #[arg(long, global = true, env = "HEADLESSD_BIND")]
    bind: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the service (default when no subcommand is given).
    Run,
    /// Configuration inspection.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as JSON.
    Show,
    /// Validate the effective configuration and print every diagnostic.
    Validate,
}

fn load_config(cli: &Cli) -> anyhow::Result<HeadlessdConfig> {
    match &cli.config {
        Some(path) => headlessd_config::load_config(path)
            .map_err(|err| anyhow::anyhow!("failed to load config from {}: {err}", path.display())),
        None => Ok(headlessd_config::discover_and_load()),
    }
}

fn init_telemetry(cli: &Cli, config: &HeadlessdConfig) {
    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(config.ambient.logging.level.as_str());
    let json = cli.json_logs || config.ambient.logging.json;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Config { action }) => {
            let config = load_config(&cli)?;
            return run_config_command(action, &config);
        },
        None | Some(Commands::Run) => {},
    }

    let config = load_config(&cli)?;
    init_telemetry(&cli, &config);
    info!(version = env!("CARGO_PKG_VERSION"), "headlessd starting");

    let validation = headlessd_config::validate(&config);
    for diagnostic in &validation.diagnostics {
        match diagnostic.severity {
            Severity::Error => error!(path = %diagnostic.path, category = diagnostic.category, "{}", diagnostic.message),
            Severity::Warning => warn!(path = %diagnostic.path, category = diagnostic.category, "{}", diagnostic.message),
            Severity::Info => info!(path = %diagnostic.path, category = diagnostic.category, "{}", diagnostic.message),
        }
    }
    if validation.has_errors() {
        anyhow::bail!(
            "configuration failed validation with {} error(s), refusing to start",
            validation.count(Severity::Error)
        );
    }

    let metrics_handle = init_metrics(MetricsRecorderConfig {
        enabled: config.ambient.metrics.enabled,
        prefix: None,
        global_labels: Vec::new(),
    })?;

    // §6 process lifecycle: config is loaded and validated, telemetry is up.
    // `CoreApi::new` does the rest of the init order (SS+SM, CS, BP+warm_up).
    let core = CoreApi::new(config.clone(), Ports::default()).await?;

    let bind_addr = cli
        .bind
        .clone()
        .or_else(|| config.ambient.metrics.prometheus_addr.clone())
        .unwrap_or_else(|| "127.0.0.1:9090".to_string());
    let http_server = http::spawn(bind_addr, metrics_handle, std::sync::Arc::clone(&core));

    shutdown_signal().await;
    info!("shutdown signal received, stopping");

    http_server.abort();
    core.shutdown().await;
    info!("headlessd stopped");

    Ok(())
}

fn run_config_command(action: &ConfigAction, config: &HeadlessdConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        },
        ConfigAction::Validate => {
            let result = headlessd_config::validate(config);
            for diagnostic in &result.diagnostics {
                println!(
                    "[{}] {} ({}): {}",
                    diagnostic.severity, diagnostic.path, diagnostic.category, diagnostic.message
                );
            }
            if result.has_errors() {
                anyhow::bail!("{} error(s) found", result.count(Severity::Error));
            }
            println!("configuration OK ({} diagnostic(s))", result.diagnostics.len());
        },
    }
    Ok(())
}

/// Waits for either Ctrl-C or, on Unix, SIGTERM — whichever arrives first.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(err) => {
                error!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
