use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use corsair_server::config::ServerConfig;
use corsair_server::game::systems::ai::MobManager;
use corsair_server::hub::{scheduler, WorldHub};
use corsair_server::metrics::{self, Metrics};
use corsair_server::net::transport::WebTransportServer;
use corsair_server::persistence::{AdminList, JsonFileStore, PlayerStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Corsair Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate().context("Invalid configuration")?;
    info!(
        "Configuration loaded: {}:{}, data in {}",
        config.bind_address,
        config.port,
        config.data_dir.display()
    );

    // Storage must be usable before anyone can connect
    let store = JsonFileStore::open(&config.data_dir)
        .with_context(|| format!("Player store at {} is not usable", config.data_dir.display()))?;
    if config.reset_data {
        warn!("RESET_DATA set, wiping player store");
        store.reset().context("Failed to reset player store")?;
    }
    let admins = AdminList::load(&config.admins_file)
        .with_context(|| format!("Failed to read admin list {}", config.admins_file.display()))?;

    let metrics = Arc::new(Metrics::new());
    let metrics_clone = metrics.clone();
    let metrics_bind = config.bind_address.to_string();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, &metrics_bind, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let hub = Arc::new(WorldHub::new(
        Arc::new(store),
        Arc::new(admins),
        metrics,
        MobManager::with_default_population(),
        config.owner_account.clone(),
    ));

    let server = WebTransportServer::new(config.clone(), hub.clone()).await?;
    info!("Server ready on https://{}", server.bind_addr());
    info!("Certificate hash: {}", server.cert_hash());

    let timers = scheduler::start(hub.clone(), &config);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        }
    }

    for timer in timers {
        timer.abort();
    }

    // Final save of everyone still in memory
    let batch = hub.take_save_batch();
    let count = batch.len();
    let worker = hub.clone();
    let report = tokio::task::spawn_blocking(move || worker.save_batch(batch))
        .await
        .context("Final save task failed")?;
    info!("Final save: {} of {} players written", report.saved, count);

    info!("Server stopped");
    Ok(())
}
