//! Local tunnel client.
//!
//! Accepts plain TCP connections on a local address and carries each one
//! over its own Replicant connection to the server.
//!
//! ```text
//!   app ──TCP──> [ local listener ─> dial ─> relay ] ══ Replicant ══> server
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};

use crate::config::ClientConfig as ReplicantConfig;
use crate::connection::dial;
use crate::error::{Error, Result};
use crate::relay::relay;

/// Tunnel client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Local address applications connect to (`host:port`)
    pub listen_addr: String,
    /// Replicant server (`host:port`)
    pub server_addr: String,
    /// Toneburst and polish for outgoing connections
    pub replicant: ReplicantConfig,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            return Err(Error::config("listen_addr cannot be empty"));
        }
        if self.server_addr.is_empty() {
            return Err(Error::config("server_addr cannot be empty"));
        }
        if let Some(toneburst) = &self.replicant.toneburst {
            toneburst.construct()?;
        }
        if let Some(polish) = &self.replicant.polish {
            polish.validate()?;
        }
        Ok(())
    }
}

/// JSON file format, e.g. `client.json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientConfigFile {
    pub listen_addr: String,
    pub server_addr: String,
    /// Encoded Replicant client config, as printed by `replicant-server --generate`
    pub replicant: String,
}

impl ClientConfigFile {
    pub fn to_config(&self) -> Result<ClientConfig> {
        Ok(ClientConfig {
            listen_addr: self.listen_addr.clone(),
            server_addr: self.server_addr.clone(),
            replicant: ReplicantConfig::decode(&self.replicant)?,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            listen_addr: config.listen_addr.clone(),
            server_addr: config.server_addr.clone(),
            replicant: config.replicant.encode()?,
        })
    }
}

/// Tunnel client instance.
pub struct Client {
    config: Arc<ClientConfig>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Bind the local address and serve forever.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(
            "Replicant client listening on {}, server {}",
            listener.local_addr()?,
            self.config.server_addr
        );

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let config = Arc::clone(&self.config);
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(config, stream).await {
                            tracing::debug!("Tunnel error for {}: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("Accept error: {}", e);
                }
            }
        }
    }

    async fn handle_connection(config: Arc<ClientConfig>, local: TcpStream) -> Result<()> {
        local.set_nodelay(true)?;
        let connection = dial(&config.server_addr, &config.replicant).await?;
        let stats = relay(connection, local).await?;
        tracing::debug!(
            "Tunnel closed: {} bytes sent, {} bytes received",
            stats.sent,
            stats.received
        );
        Ok(())
    }
}
