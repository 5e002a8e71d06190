use log::{error, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::ServerError;
use crate::protocol::FileService;
use crate::server::connection::handle_connection;
use crate::storage::FileStore;

/// Storage node RPC server
pub struct Server {
    listener: TcpListener,
    service: Arc<FileService>,
    dispatcher: Arc<Dispatcher>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Opens the storage root, starts the worker pool and binds the listener.
    ///
    /// Must be called from inside a tokio runtime.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let store = FileStore::open(config.storage_root_path(), config.path_locking)?;
        let service = Arc::new(FileService::new(store, config.node_id.clone()));
        let dispatcher = Arc::new(Dispatcher::start(
            config.worker_count,
            config.queue_capacity,
        )?);

        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Server bound to {}", listener.local_addr()?);

        Ok(Self {
            listener,
            service,
            dispatcher,
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Serves until SIGINT/SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves, then shuts down gracefully.
    ///
    /// Shutdown order: stop accepting connections, tell connections to stop reading new
    /// frames, drain the dispatcher queue, wait for every connection to flush its
    /// pending responses, and finally drop the listener.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Starting storage node {} on {} ({} workers, queue capacity {})",
            self.config.node_id,
            self.listener.local_addr()?,
            self.dispatcher.worker_count(),
            self.dispatcher.queue_capacity()
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, closing server...");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        connections.spawn(handle_connection(
                            stream,
                            addr,
                            Arc::clone(&self.service),
                            Arc::clone(&self.dispatcher),
                            self.config.max_frame_bytes,
                            self.config.drain_timeout(),
                            stop_rx.clone(),
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        warn!("Connection task failed: {}", e);
                    }
                }
            }
        }

        let _ = stop_tx.send(true);
        self.dispatcher.shutdown().await;

        while let Some(finished) = connections.join_next().await {
            if let Err(e) = finished {
                warn!("Connection task failed: {}", e);
            }
        }

        drop(self.listener);
        info!("Server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
