use std::env;

use chanbus::BusBuilder;
use chanbus::BusConfig;
use chanbus::Error;
use chanbus::Handlers;
use chanbus::Manifest;
use chanbus::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable naming the manifest when no path argument is given
const MANIFEST_ENV: &str = "CHANBUS_MANIFEST";

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    // Initializing Logs
    init_observability()?;

    let config = BusConfig::new()?.validate()?;
    info!("loaded config: {:?}", config);

    let manifest_path = env::args()
        .nth(1)
        .or_else(|| env::var(MANIFEST_ENV).ok())
        .ok_or_else(|| Error::Fatal(format!("usage: chanbus <manifest.toml> (or set {})", MANIFEST_ENV)))?;
    let manifest = Manifest::load(&manifest_path)?;

    // Every declared task gets a callback that logs its notifications
    let mut handlers = Handlers::with_builtins();
    for task in &manifest.tasks {
        let name = task.name.clone();
        handlers = handlers.callback(task.name.clone(), move |channel| {
            info!("task {} notified of channel #{} change", name, channel);
        });
    }
    let specs = manifest.resolve(&handlers)?;

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let builder = BusBuilder::new(config, specs, graceful_rx);
    let bus = builder.build().await?;
    info!(
        "Bus started with {} channels from {}. Waiting for CTRL+C signal...",
        bus.registry().len(),
        manifest_path
    );

    if let Err(e) = graceful_shutdown(graceful_tx).await {
        error!("Failed to shutdown: {:?}", e);
    }

    bus.join().await;
    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Shutdown bus..");
    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;
    Ok(())
}

/// Logs go to stderr so stdout stays free for forwarded event lines.
fn init_observability() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .map_err(|e| Error::Fatal(format!("failed to init tracing: {}", e)))
}
