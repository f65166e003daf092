//! Application lifecycle and graceful shutdown.
//!
//! 1. **Startup**: spawn every event consumer
//! 2. **Runtime**: serve HTTP (live updates and health)
//! 3. **Shutdown**: on Ctrl+C or SIGTERM stop the HTTP server, signal the
//!    consumers, then wait for each one up to the configured timeout

use rentflow_runtime::EventConsumer;
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Running application with all background tasks.
pub struct Application {
    listener: tokio::net::TcpListener,
    router: axum::Router,
    consumers: Vec<EventConsumer>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_timeout: Duration,
}

impl Application {
    /// Assemble an application.
    ///
    /// `shutdown_tx` must be the sender the consumers subscribed to.
    #[must_use]
    pub fn new(
        listener: tokio::net::TcpListener,
        router: axum::Router,
        consumers: Vec<EventConsumer>,
        shutdown_tx: broadcast::Sender<()>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            listener,
            router,
            consumers,
            shutdown_tx,
            shutdown_timeout,
        }
    }

    /// Run until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails.
    pub async fn run(self) -> std::io::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails.
    pub async fn run_until(
        self,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        info!(consumer_count = self.consumers.len(), "Starting event consumers");
        let handles: Vec<_> = self
            .consumers
            .into_iter()
            .map(|consumer| (consumer.name().to_string(), consumer.spawn()))
            .collect();

        info!(address = ?self.listener.local_addr().ok(), "HTTP server listening");
        let served = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await;

        info!("HTTP server stopped, initiating graceful shutdown");
        let _ = self.shutdown_tx.send(());

        for (name, handle) in handles {
            match tokio::time::timeout(self.shutdown_timeout, handle).await {
                Ok(Ok(())) => info!(consumer = %name, "Consumer stopped gracefully"),
                Ok(Err(e)) => warn!(consumer = %name, error = %e, "Consumer task failed"),
                Err(_) => warn!(consumer = %name, "Consumer shutdown timed out"),
            }
        }

        info!("Graceful shutdown complete");
        served
    }
}

/// Wait for Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed the error is logged and that source is
/// ignored.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
