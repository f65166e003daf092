//! Rentflow server: booking services, event consumers and live updates.

use anyhow::Context;
use rentflow_core::environment::SystemClock;
use rentflow_core::event_bus::EventBus;
use rentflow_postgres::PostgresRentalStore;
use rentflow_redis::RedisKeyValueStore;
use rentflow_redpanda::RedpandaEventBus;
use rentflow_rental::{Application, Config, RentalServices};
use rentflow_runtime::metrics::MetricsServer;
use rentflow_web::{WebState, router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rentflow=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rentflow server");
    let config = Config::from_env();
    info!(
        redpanda_brokers = %config.redpanda.brokers,
        redis_url = %config.redis.url,
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.metrics_port)
        .parse()
        .context("invalid metrics address")?;
    let mut metrics = MetricsServer::new(metrics_addr);
    metrics.start()?;

    info!("Connecting to PostgreSQL...");
    let store =
        PostgresRentalStore::connect(&config.postgres.url, config.postgres.max_connections)
            .await?;
    store.migrate().await?;

    info!("Connecting to Redis...");
    let kv_store = RedisKeyValueStore::new(&config.redis.url).await?;

    info!("Connecting to Redpanda...");
    let event_bus: Arc<dyn EventBus> = Arc::new(
        RedpandaEventBus::builder()
            .brokers(&config.redpanda.brokers)
            .build()?,
    );

    let services = RentalServices::new(
        Arc::new(store),
        Arc::new(kv_store),
        event_bus,
        Arc::new(SystemClock),
        &config,
    );
    services.availability.warm().await;

    let (shutdown_tx, _) = broadcast::channel(1);
    let consumers = services.consumers(&config.redpanda, &shutdown_tx)?;

    let app = router(WebState::new(Arc::clone(&services.broadcaster)));
    let listener = tokio::net::TcpListener::bind(config.server.address())
        .await
        .with_context(|| format!("failed to bind {}", config.server.address()))?;

    Application::new(
        listener,
        app,
        consumers,
        shutdown_tx,
        config.server.shutdown_timeout(),
    )
    .run()
    .await?;

    Ok(())
}
