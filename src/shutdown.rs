use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Graceful shutdown handler: listens for termination signals and bounds how
/// long in-flight requests may take to drain once one arrives.
#[derive(Clone)]
pub struct GracefulShutdown {
    shutdown_timeout: Duration,
    triggered: Arc<Notify>,
}

impl GracefulShutdown {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            shutdown_timeout,
            triggered: Arc::new(Notify::new()),
        }
    }

    /// Future for `axum::serve(..).with_graceful_shutdown`; resolves on SIGINT or
    /// SIGTERM and starts the drain deadline.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let triggered = self.triggered.clone();
        async move {
            wait_for_termination().await;
            triggered.notify_one();
        }
    }

    /// Start the drain deadline without a signal
    pub fn trigger(&self) {
        self.triggered.notify_one();
    }

    /// Drive the server future to completion. Once shutdown has been triggered
    /// the server gets `shutdown_timeout` to finish, after which it is abandoned.
    pub async fn run<F, E>(&self, server: F) -> Result<(), ShutdownError>
    where
        F: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        tokio::pin!(server);

        let deadline = async {
            self.triggered.notified().await;
            info!("Draining in-flight requests for up to {:?}", self.shutdown_timeout);
            tokio::time::sleep(self.shutdown_timeout).await;
        };

        tokio::select! {
            result = &mut server => match result {
                Ok(()) => {
                    info!("HTTP server stopped");
                    Ok(())
                }
                Err(e) => {
                    error!("HTTP server failed: {}", e);
                    Err(ShutdownError::HttpServer(e.to_string()))
                }
            },
            _ = deadline => {
                warn!("Graceful shutdown timed out after {:?}, forcing exit", self.shutdown_timeout);
                Err(ShutdownError::Timeout)
            }
        }
    }
}

async fn wait_for_termination() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

/// Errors that can occur during shutdown
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("Shutdown timed out")]
    Timeout,

    #[error("HTTP server shutdown error: {0}")]
    HttpServer(String),
}

#[cfg(test)]
mod tests;
