//! Forwarding server configuration.

use serde::{Deserialize, Serialize};

use crate::config::ServerConfig as ReplicantConfig;
use crate::error::{Error, Result};

/// Forwarding server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: String,
    /// Listen port
    pub listen_port: u16,
    /// Where accepted connections are relayed to (`host:port`)
    pub forward_addr: String,
    /// Toneburst and polish for accepted connections
    pub replicant: ReplicantConfig,
}

impl ServerConfig {
    /// Create a configuration with a fresh Silver key and no toneburst.
    pub fn new_random(
        listen_addr: impl Into<String>,
        listen_port: u16,
        forward_addr: impl Into<String>,
    ) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            listen_port,
            forward_addr: forward_addr.into(),
            replicant: ReplicantConfig::generate_silver(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            return Err(Error::config("listen_addr cannot be empty"));
        }
        if self.forward_addr.is_empty() {
            return Err(Error::config("forward_addr cannot be empty"));
        }
        self.replicant.validate()
    }
}

/// Configuration file format for serialization.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServerConfigFile {
    /// Listen address
    pub listen_addr: String,
    /// Listen port
    pub listen_port: u16,
    /// Relay target
    pub forward_addr: String,
    /// Encoded Replicant server config
    pub replicant: String,
}

impl ServerConfigFile {
    /// Convert to runtime configuration.
    pub fn to_config(&self) -> Result<ServerConfig> {
        Ok(ServerConfig {
            listen_addr: self.listen_addr.clone(),
            listen_port: self.listen_port,
            forward_addr: self.forward_addr.clone(),
            replicant: ReplicantConfig::decode(&self.replicant)?,
        })
    }

    /// Create from runtime configuration.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Ok(Self {
            listen_addr: config.listen_addr.clone(),
            listen_port: config.listen_port,
            forward_addr: config.forward_addr.clone(),
            replicant: config.replicant.encode()?,
        })
    }
}
