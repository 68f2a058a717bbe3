//! Post-handshake encryption ("polish").
//!
//! A polish layer performs its own key agreement over the raw stream and
//! then frames all payload into fixed-size encrypted chunks. Silver is the
//! only polish currently defined; configs are tagged so others can be added
//! without breaking stored configs.

mod silver;

pub use silver::{
    SilverCipher, SilverClient, SilverClientConfig, SilverServer, SilverServerConfig,
    BASE_PAYLOAD_SIZE, LENGTH_PREFIX_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, PAYLOAD_SIZE_RANDOMNESS,
};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// Client-side polish selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolishClientConfig {
    Silver(SilverClientConfig),
}

/// Server-side polish selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolishServerConfig {
    Silver(SilverServerConfig),
}

/// A constructed server polish, shared by every accepted connection.
#[derive(Clone)]
pub enum PolishServer {
    Silver(SilverServer),
}

impl PolishClientConfig {
    pub fn chunk_size(&self) -> usize {
        match self {
            PolishClientConfig::Silver(config) => config.chunk_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            PolishClientConfig::Silver(config) => config.validate(),
        }
    }

    /// Run the client half of the polish handshake.
    pub async fn handshake<S>(&self, stream: &mut S) -> Result<SilverCipher>
    where
        S: AsyncWrite + Unpin,
    {
        match self {
            PolishClientConfig::Silver(config) => SilverClient::new(config)?.handshake(stream).await,
        }
    }
}

impl PolishServerConfig {
    pub fn chunk_size(&self) -> usize {
        match self {
            PolishServerConfig::Silver(config) => config.chunk_size,
        }
    }

    /// The matching client config.
    pub fn client_config(&self) -> PolishClientConfig {
        match self {
            PolishServerConfig::Silver(config) => PolishClientConfig::Silver(config.client_config()),
        }
    }

    pub fn construct(&self) -> Result<PolishServer> {
        match self {
            PolishServerConfig::Silver(config) => Ok(PolishServer::Silver(SilverServer::new(config)?)),
        }
    }
}

impl PolishServer {
    /// Run the server half of the polish handshake for one connection.
    pub async fn handshake<S>(&self, stream: &mut S) -> Result<SilverCipher>
    where
        S: AsyncRead + Unpin,
    {
        match self {
            PolishServer::Silver(server) => server.handshake(stream).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serde() {
        let server = PolishServerConfig::Silver(SilverServerConfig::generate());
        let client = server.client_config();
        assert_eq!(client.chunk_size(), server.chunk_size());

        let json = serde_json::to_value(&client).unwrap();
        assert_eq!(json["type"], "silver");
        assert!(json["server_public_key"].is_string());

        let back: PolishClientConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, client);
    }

    #[tokio::test]
    async fn test_handshake_through_enums() {
        let server_config = PolishServerConfig::Silver(SilverServerConfig::generate());
        let client_config = server_config.client_config();
        let server = server_config.construct().unwrap();

        let (mut client_io, mut server_io) = tokio::io::duplex(16 * 1024);
        let accept = tokio::spawn(async move { server.handshake(&mut server_io).await });

        let client_cipher = client_config.handshake(&mut client_io).await.unwrap();
        let server_cipher = accept.await.unwrap().unwrap();

        let sealed = server_cipher.polish(b"ok").unwrap();
        assert_eq!(client_cipher.unpolish(&sealed).unwrap(), b"ok");
    }
}
