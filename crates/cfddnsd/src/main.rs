// # cfddnsd - Cloudflare DDNS Daemon
//
// Thin integration layer: all reconciliation logic lives in cfddns-core.
//
// The daemon is responsible for:
// 1. Parsing the command line and loading the JSON configuration
// 2. Initializing logging (stdout, plus optional daily-rotated files)
// 3. Wiring the HTTP IP source and Cloudflare provider into a Reconciler
// 4. Running the Scheduler until SIGINT/SIGTERM
//
// ## Configuration
//
// ```json
// {
//   "zone": "example.com",
//   "dnsrecord": "home.example.com",
//   "cloudflare_auth_email": "admin@example.com",
//   "cloudflare_auth_key": "your_global_api_key"
// }
// ```
//
// Optional keys: `cloudflare_api_token`, `interval_secs`, `ip_service_url`,
// `ip_service_json_field`, `request_timeout_secs`, `zone_cache_ttl_secs`,
// `log_level`, `log_dir`, `log_retention_days`, `dry_run`.
//
// ## Example
//
// ```bash
// cfddnsd --config /etc/cfddns/config.json
// cfddnsd --once --dry-run --log-level debug
// ```

use anyhow::{Context, Result};
use cfddns_core::config::DEFAULT_CONFIG_PATH;
use cfddns_core::{Reconciler, Scheduler, Settings};
use cfddns_ip_http::HttpIpSource;
use cfddns_provider_cloudflare::CloudflareProvider;
use clap::Parser;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error, or a failed cycle in `--once` mode
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep a Cloudflare A record pointed at this host's public IPv4 address
#[derive(Parser, Debug)]
#[command(name = "cfddnsd", version, about)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "CFDDNS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run a single reconciliation cycle and exit
    #[arg(long)]
    once: bool,

    /// Resolve and compare, but never write to Cloudflare
    #[arg(long)]
    dry_run: bool,

    /// Log level: trace, debug, info, warn or error (overrides the config file)
    #[arg(long, env = "CFDDNS_LOG_LEVEL")]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Dropping the guard flushes the file writer, so it lives until exit
    let _log_guard = match init_tracing(&settings) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    info!("Starting cfddnsd {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Managing {} in zone {} (interval: {:?}{})",
        settings.dnsrecord,
        settings.zone,
        settings.interval(),
        if settings.dry_run { ", DRY-RUN" } else { "" }
    );

    let reconciler = match build_reconciler(&settings) {
        Ok(reconciler) => reconciler,
        Err(e) => {
            error!("Startup error: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    let scheduler = Scheduler::new(settings.interval());

    // A single cycle is strictly sequential; no worker threads needed
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(&scheduler, &reconciler, args.once).await {
            Ok(code) => code,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DaemonExitCode::RuntimeError
            }
        }
    });

    info!("cfddnsd exiting with code {}", code as u8);
    code.into()
}

/// Load settings and apply command-line overrides
fn load_settings(args: &Args) -> cfddns_core::Result<Settings> {
    let mut settings = Settings::load(&args.config)?;

    if args.dry_run {
        settings.dry_run = true;
    }
    if let Some(level) = &args.log_level {
        settings.log_level = level.clone();
    }

    settings.validate()?;
    Ok(settings)
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level when set. With `log_dir`, a
/// second non-ANSI layer writes `cfddns.log.YYYY-MM-DD` files rotated daily.
fn init_tracing(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .with_context(|| format!("invalid log level '{}'", settings.log_level))?;

    let (file_layer, guard) = match &settings.log_dir {
        Some(dir) => {
            let appender = log_file_appender(dir, settings.log_retention_days)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .context("failed to set tracing subscriber")?;

    Ok(guard)
}

/// Daily-rotated log files in `dir`, keeping the newest `keep` of them
fn log_file_appender(dir: &Path, keep: usize) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("cfddns.log")
        .max_log_files(keep)
        .build(dir)
        .with_context(|| format!("cannot open log file in {}", dir.display()))
}

/// Wire the IP source and provider into a Reconciler
fn build_reconciler(settings: &Settings) -> cfddns_core::Result<Reconciler> {
    let ip_source = HttpIpSource::from_settings(settings)?;
    let provider = CloudflareProvider::from_settings(settings)?;

    if let Some(ttl) = settings.zone_cache_ttl() {
        info!("Caching zone ID for {:?}", ttl);
    }

    Reconciler::new(Box::new(ip_source), Box::new(provider), settings)
}

/// Run the scheduler, or a single cycle with `--once`
async fn run_daemon(
    scheduler: &Scheduler,
    reconciler: &Reconciler,
    once: bool,
) -> Result<DaemonExitCode> {
    if once {
        let result = scheduler.run_once(reconciler).await;
        return Ok(if result.is_failed() {
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        });
    }

    let shutdown = shutdown_signal()?;
    scheduler.run(reconciler, shutdown).await;

    info!("Shutting down daemon");
    Ok(DaemonExitCode::CleanShutdown)
}

/// Future that resolves on SIGTERM or SIGINT
///
/// Handlers are registered before returning, so a signal that arrives while
/// a cycle is running is not lost.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Future that resolves on CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal: CTRL-C"),
            Err(e) => tracing::warn!("Failed to wait for CTRL-C, shutting down: {}", e),
        }
    })
}
