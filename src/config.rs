//! Replicant client and server configuration.
//!
//! A config names the optional toneburst and the optional polish a
//! connection uses. Configs travel between operators and clients as opaque
//! strings:
//!
//! ```text
//!   encode()    {"version":1,"body":{...}} as base64
//!   marshal()   client: {"config":"<encoded>"}
//!               server: {"Replicant":{"config":"<encoded>"}}
//! ```

use serde::{Deserialize, Serialize};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::connection::{self, Connection, Listener};
use crate::error::{Error, Result};
use crate::monolith::persistence;
use crate::polish::{PolishClientConfig, PolishServerConfig, SilverServerConfig};
use crate::toneburst::ToneBurstConfig;

/// Client-side Replicant configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Scripted handshake run before the polish handshake
    #[serde(default)]
    pub toneburst: Option<ToneBurstConfig>,

    /// Encryption layer for the rest of the connection
    #[serde(default)]
    pub polish: Option<PolishClientConfig>,
}

/// Server-side Replicant configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Scripted handshake run before the polish handshake
    #[serde(default)]
    pub toneburst: Option<ToneBurstConfig>,

    /// Encryption layer for the rest of the connection
    #[serde(default)]
    pub polish: Option<PolishServerConfig>,
}

#[derive(Serialize, Deserialize)]
struct ClientJson {
    config: String,
}

#[derive(Serialize, Deserialize)]
struct ServerJsonInner {
    config: String,
}

#[derive(Serialize, Deserialize)]
struct ServerJson {
    #[serde(rename = "Replicant")]
    replicant: ServerJsonInner,
}

impl ClientConfig {
    pub fn new(toneburst: Option<ToneBurstConfig>, polish: Option<PolishClientConfig>) -> Self {
        Self { toneburst, polish }
    }

    /// Encode as a versioned opaque string.
    pub fn encode(&self) -> Result<String> {
        persistence::encode(self)
    }

    /// Decode a string produced by [`ClientConfig::encode`].
    pub fn decode(encoded: &str) -> Result<Self> {
        persistence::decode(encoded)
    }

    /// `{"config": "<encoded>"}`
    pub fn marshal(&self) -> Result<String> {
        let json = ClientJson {
            config: self.encode()?,
        };
        serde_json::to_string(&json).map_err(|e| Error::encoding(e.to_string()))
    }

    /// Parse the output of [`ClientConfig::marshal`].
    pub fn unmarshal(json: &str) -> Result<Self> {
        let outer: ClientJson =
            serde_json::from_str(json).map_err(|e| Error::encoding(e.to_string()))?;
        Self::decode(&outer.config)
    }

    /// Connect to a Replicant server and run the client handshake.
    pub async fn dial<A: ToSocketAddrs>(&self, addr: A) -> Result<Connection<TcpStream>> {
        connection::dial(addr, self).await
    }
}

impl ServerConfig {
    pub fn new(toneburst: Option<ToneBurstConfig>, polish: Option<PolishServerConfig>) -> Self {
        Self { toneburst, polish }
    }

    /// A server with a freshly generated Silver key and no toneburst.
    pub fn generate_silver() -> Self {
        Self::new(
            None,
            Some(PolishServerConfig::Silver(SilverServerConfig::generate())),
        )
    }

    /// The client config that talks to this server.
    ///
    /// Toneburst scripts are directional, so the client's script is given
    /// separately rather than derived.
    pub fn client_config(&self, toneburst: Option<ToneBurstConfig>) -> ClientConfig {
        ClientConfig::new(
            toneburst,
            self.polish.as_ref().map(PolishServerConfig::client_config),
        )
    }

    /// Check every part of the config without touching the network.
    pub fn validate(&self) -> Result<()> {
        if let Some(toneburst) = &self.toneburst {
            toneburst.construct()?;
        }
        if let Some(polish) = &self.polish {
            polish.construct()?;
        }
        Ok(())
    }

    /// Encode as a versioned opaque string.
    pub fn encode(&self) -> Result<String> {
        persistence::encode(self)
    }

    /// Decode a string produced by [`ServerConfig::encode`].
    pub fn decode(encoded: &str) -> Result<Self> {
        persistence::decode(encoded)
    }

    /// `{"Replicant": {"config": "<encoded>"}}`
    pub fn marshal(&self) -> Result<String> {
        let json = ServerJson {
            replicant: ServerJsonInner {
                config: self.encode()?,
            },
        };
        serde_json::to_string(&json).map_err(|e| Error::encoding(e.to_string()))
    }

    /// Parse the output of [`ServerConfig::marshal`].
    pub fn unmarshal(json: &str) -> Result<Self> {
        let outer: ServerJson =
            serde_json::from_str(json).map_err(|e| Error::encoding(e.to_string()))?;
        Self::decode(&outer.replicant.config)
    }

    /// Bind a listener whose `accept` runs the server handshake.
    pub async fn listen<A: ToSocketAddrs>(&self, addr: A) -> Result<Listener> {
        Listener::bind(addr, self).await
    }
}
