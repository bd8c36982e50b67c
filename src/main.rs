//! Log Pusher demo harness.
//!
//! Spawns a pusher per simulated source, feeds it synthetic log lines, and
//! forwards them through an in-memory sink so the batching and flush
//! behavior can be observed end to end without a real CloudWatch-like
//! backend. Production deployments construct their own `SinkClient` and
//! wire it into `Pusher::spawn` the same way.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `LOGPUSHER_FLUSH_INTERVAL_MS`: flush timer period (default: 5000)
//! - `LOGPUSHER_MAX_RETRIES`: recoverable-error retry ceiling (default: 5)
//! - `LOGPUSHER_INGRESS_CAPACITY`: per-target bounded queue size (default: 100)
//! - `LOGPUSHER_SHUTDOWN_TIMEOUT_MS`: drain deadline on stop (default: 10000)
//! - `RUST_LOG`: logging level filter (default: info)

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use logpusher::config::Config;
use logpusher::demo::LogGenerator;
use logpusher::event::LogEvent;
use logpusher::mock::MockSinkClient;
use logpusher::pusher::Pusher;
use logpusher::sink::Target;

/// Interval between generated log lines per demo source.
const DEFAULT_GENERATION_INTERVAL_MS: u64 = 50;

/// Demo sources, each mapped onto its own (group, stream) target.
const DEMO_SOURCES: [&str; 2] = ["checkout-service", "inventory-service"];

#[tokio::main]
async fn main() {
    init_tracing();

    info!("Starting log pusher demo...");

    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                flush_interval_ms = config.flush_interval.as_millis(),
                max_retries = config.max_retries,
                ingress_capacity = config.ingress_capacity,
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let sink = Arc::new(MockSinkClient::new());

    let mut pushers = Vec::new();
    let mut generator_handles = Vec::new();

    for source in DEMO_SOURCES {
        let target = Target::new("demo-app-logs", source);
        let pusher = Arc::new(Pusher::spawn(target, sink.clone(), &config));
        info!(source, "Pusher started");

        let pusher_clone = pusher.clone();
        let handle = tokio::spawn(async move {
            run_generator(source, pusher_clone).await;
        });

        pushers.push(pusher);
        generator_handles.push(handle);
    }

    info!("Log pusher demo running. Press Ctrl+C to stop.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }

    info!("Shutdown signal received, stopping...");
    for handle in generator_handles {
        handle.abort();
    }
    for pusher in pushers {
        if let Err(e) = pusher.stop().await {
            warn!(error = %e, "pusher did not shut down cleanly");
        }
    }

    info!("Log pusher demo stopped");
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Feed a source's generated log lines into its pusher at a steady rate
/// until the task is aborted.
async fn run_generator(source: &str, pusher: Arc<Pusher>) {
    let generator = LogGenerator::new(source);
    let mut ticker = tokio::time::interval(Duration::from_millis(DEFAULT_GENERATION_INTERVAL_MS));

    loop {
        ticker.tick().await;
        let line = generator.generate();
        pusher.add_event(LogEvent::new(line)).await;
    }
}
