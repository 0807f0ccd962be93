// # cfddnsd - Cloudflare DDNS Controller Daemon
//
// Thin integration layer around `cfddns-core`. No reconciliation logic lives
// here. The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the Cloudflare zone authority and the trace address source into
//    the controller
// 4. Serving the status gauge on `GET /metrics`
// 5. Supervising the controller until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Zone authority
// - `CF_ZONE_ID`: Zone identifier (required)
// - `CF_API_TOKEN`: Scoped API token, or
// - `CF_API_KEY` + `CF_API_EMAIL`: Global API key and account email
//
// ### Records
// - `CFDDNS_SUBDOMAINS`: Comma-separated labels; an empty item is the apex
// - `CFDDNS_PROXIED`: Proxy flag for address records (default false)
// - `CFDDNS_IPV4` / `CFDDNS_IPV6`: Families to publish (at least one)
// - `CFDDNS_PURGE`: Delete orphaned owned records (default false)
//
// ### Timing
// - `CFDDNS_INTERVAL`: Seconds between cycles (default 300)
// - `CFDDNS_HTTP_TIMEOUT`: Zone API timeout in seconds (default 30)
// - `CFDDNS_ELECTION_LEASE_DURATION` / `CFDDNS_ELECTION_RENEW_DEADLINE`
//
// ### Runtime
// - `POD_NAME`: Owner id written into ownership markers
// - `CFDDNS_METRICS_ADDR`: Metrics listen address (default 0.0.0.0:2157)
// - `CFDDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export CF_ZONE_ID=023e105f4ecef8ad9ca31a8372d0c353
// export CF_API_TOKEN=your_token
// export CFDDNS_SUBDOMAINS=home,nas
// export CFDDNS_IPV4=true
//
// cfddnsd
// ```

mod config;
mod metrics_server;

use anyhow::Result;
use cfddns_cloudflare::CloudflareZone;
use cfddns_core::{Controller, ControllerEvent, IpStatus, StandaloneGate, Supervisor};
use cfddns_ip_trace::TraceSource;
use config::Config;
use metrics_server::MetricsServer;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (fatal controller error)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DaemonExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting cfddnsd");
    if config.owner_generated {
        warn!(
            "POD_NAME is not set, using generated owner id {}",
            config.controller.owner_id
        );
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
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
        let daemon = match Daemon::start(config).await {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return DaemonExitCode::ConfigError;
            }
        };

        match daemon.run().await {
            Ok(()) => DaemonExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DaemonExitCode::RuntimeError
            }
        }
    });

    info!("cfddnsd stopped");
    code.into()
}

/// Wired components, ready to run
struct Daemon {
    supervisor: Supervisor,
    events: mpsc::Receiver<ControllerEvent>,
    metrics: MetricsServer,
    shutdown: CancellationToken,
}

impl Daemon {
    async fn start(config: Config) -> Result<Self> {
        let zone = CloudflareZone::from_config(&config.controller)?;
        let source = TraceSource::new()?;
        let status = IpStatus::new()?;
        let registry = status.registry();

        info!(
            "Managing {} name(s) in zone {} as owner {} ({} auth, purge: {})",
            config.controller.subdomains.len(),
            config.controller.zone_id,
            config.controller.owner_id,
            config.controller.credentials.scheme(),
            config.controller.purge
        );

        let (controller, events) = Controller::with_status(
            Box::new(zone),
            Box::new(source),
            config.controller,
            status,
        )?;

        let shutdown = CancellationToken::new();
        let metrics = MetricsServer::start(config.metrics_addr, registry, shutdown.clone()).await?;

        Ok(Self {
            supervisor: Supervisor::new(controller),
            events,
            metrics,
            shutdown,
        })
    }

    async fn run(self) -> Result<()> {
        let Self {
            mut supervisor,
            events,
            metrics,
            shutdown,
        } = self;

        tokio::spawn(log_events(events));

        let signals = wait_for_shutdown()?;
        let on_signal = shutdown.clone();
        tokio::spawn(async move {
            let name = signals.await;
            info!("Received shutdown signal: {}", name);
            on_signal.cancel();
        });

        // Single-replica deployment: this process always holds leadership
        let result = supervisor.run(&StandaloneGate, shutdown.clone()).await;

        shutdown.cancel();
        metrics.stopped().await;

        result.map_err(Into::into)
    }
}

/// Drain controller events into the log
async fn log_events(mut events: mpsc::Receiver<ControllerEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Controller event: {:?}", event);
    }
}

/// Install SIGTERM and SIGINT handlers
///
/// Returns a future resolving to the name of the first signal received.
#[cfg(unix)]
fn wait_for_shutdown() -> Result<impl Future<Output = &'static str> + Send + 'static> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Install the CTRL-C handler
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn wait_for_shutdown() -> Result<impl Future<Output = &'static str> + Send + 'static> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
        "SIGINT"
    })
}
