//! Forwarding server.
//!
//! Accepts Replicant connections and relays each one to a fixed TCP target.
//!
//! ```text
//!   client ══ Replicant ══> [ listener ─> handshake ─> relay ] ──TCP──> forward_addr
//! ```
//!
//! Handshakes run on the per-connection task, so a slow or hostile peer
//! never holds up the accept loop.

pub mod config;
mod metrics;

pub use config::{ServerConfig, ServerConfigFile};
pub use metrics::{MetricsSnapshot, ServerMetrics};

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::connection::Acceptor;
use crate::error::{Error, Result};
use crate::relay::relay;

/// Main server instance.
pub struct Server {
    config: Arc<ServerConfig>,
    acceptor: Acceptor,
    metrics: Arc<ServerMetrics>,
}

impl Server {
    /// Create a new server, constructing the polish once for all connections.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let acceptor = Acceptor::new(&config.replicant)?;

        Ok(Self {
            config: Arc::new(config),
            acceptor,
            metrics: Arc::new(ServerMetrics::new()),
        })
    }

    /// Bind the configured address and serve forever.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.listen_addr, self.config.listen_port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(
            "Replicant server listening on {}, forwarding to {}",
            listener.local_addr()?,
            self.config.forward_addr
        );

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let config = Arc::clone(&self.config);
                    let acceptor = self.acceptor.clone();
                    let metrics = Arc::clone(&self.metrics);

                    tokio::spawn(async move {
                        metrics.increment_connections();

                        if let Err(e) =
                            Self::handle_connection(config, acceptor, metrics.clone(), stream).await
                        {
                            tracing::debug!("Connection error from {}: {}", peer_addr, e);
                        }

                        metrics.decrement_connections();
                    });
                }
                Err(e) => {
                    tracing::warn!("Accept error: {}", e);
                }
            }
        }
    }

    async fn handle_connection(
        config: Arc<ServerConfig>,
        acceptor: Acceptor,
        metrics: Arc<ServerMetrics>,
        stream: TcpStream,
    ) -> Result<()> {
        stream.set_nodelay(true)?;

        let connection = match acceptor.accept(stream).await {
            Ok(connection) => connection,
            Err(e) => {
                if e.is_timeout() {
                    metrics.increment_handshake_timeouts();
                } else {
                    metrics.increment_handshake_errors();
                }
                return Err(e);
            }
        };
        metrics.increment_established();

        let target = match TcpStream::connect(&config.forward_addr).await {
            Ok(target) => target,
            Err(e) => {
                metrics.increment_forward_errors();
                return Err(Error::Network(e));
            }
        };
        target.set_nodelay(true)?;

        let stats = relay(connection, target).await?;
        metrics.add_bytes_received(stats.received);
        metrics.add_bytes_sent(stats.sent);
        Ok(())
    }

    /// Get server metrics.
    pub fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }
}
