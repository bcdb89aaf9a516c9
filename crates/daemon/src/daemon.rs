//! Daemon assembly and lifecycle
//!
//! Wires the registry, routing-service launcher, event bus, and control API
//! into one long-running process. The daemon owns the listening socket and
//! drives shutdown: on Ctrl-C the API stops accepting requests, every running
//! task is stopped, and a launched routing service is torn down.

use crate::api::create_api_router;
use crate::events::{EventBus, TaskEvent};
use crate::registry::Registry;
use crate::router::RouterLauncher;
use std::sync::Arc;
use stream_bridge_config::{Config, ConfigError};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;

/// Error type for daemon startup and serving
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The API listener could not bind its address
    #[error("Failed to bind API address: {0}")]
    Bind(#[source] std::io::Error),

    /// The API server failed while serving
    #[error("API server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// The assembled control-plane daemon
pub struct Daemon {
    config: Config,
    bus: EventBus,
    registry: Arc<Registry>,
}

impl Daemon {
    /// Assemble a daemon from a loaded configuration.
    pub fn new(config: Config) -> Self {
        let bus = EventBus::default();
        let launcher = Arc::new(RouterLauncher::new(config.router.clone()));
        let registry = Arc::new(Registry::new(config.clone(), launcher, bus.clone()));
        Self {
            config,
            bus,
            registry,
        }
    }

    /// Access the shared registry, mainly for embedding and tests.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Forward task lifecycle events to the tracing output.
    ///
    /// Worker log lines are high-volume and go out at debug level; terminal
    /// transitions are info. A lagged receiver skips ahead rather than
    /// stalling publishers.
    fn start_event_logger(&self) {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(TaskEvent::Log { id, text, .. }) => {
                        tracing::debug!(task = %id, "{}", text);
                    }
                    Ok(TaskEvent::Ended {
                        id,
                        exit_code,
                        status,
                    }) => {
                        tracing::info!(task = %id, ?exit_code, %status, "task ended");
                    }
                    Ok(TaskEvent::Stopped { id }) => {
                        tracing::info!(task = %id, "task stopped");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event logger lagged behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Run the daemon until interrupted.
    ///
    /// Binds the control API, serves requests, and on Ctrl-C stops all
    /// running tasks before returning.
    pub async fn run(self) -> Result<(), DaemonError> {
        self.start_event_logger();

        let addr = format!("{}:{}", self.config.api.bind, self.config.api.port);
        let listener = TcpListener::bind(&addr).await.map_err(DaemonError::Bind)?;
        tracing::info!(%addr, "control API listening");

        let app = create_api_router(Arc::clone(&self.registry));
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(DaemonError::Serve)?;

        tracing::info!("shutting down, stopping all tasks");
        self.registry.stop_all().await;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        // Without a signal handler the server would never stop; park forever
        // instead of shutting down immediately.
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_daemon_assembles_from_default_config() {
        let daemon = Daemon::new(Config::default());
        assert!(daemon.registry().list().await.is_empty());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        // Hold the port so the daemon's bind must fail.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut config = Config::default();
        config.api.bind = "127.0.0.1".to_string();
        config.api.port = port;

        let result = Daemon::new(config).run().await;
        assert!(matches!(result, Err(DaemonError::Bind(_))));
    }
}
