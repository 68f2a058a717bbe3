//! Pre-payload handshakes ("tonebursts").
//!
//! A toneburst runs over the raw stream before any polish handshake and
//! makes the first bytes of a connection look like whatever its grammar
//! describes. Monotone is the only toneburst currently defined; configs are
//! tagged so others can be added without breaking stored configs.

mod monotone;

pub use monotone::{Monotone, MonotoneConfig};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// Toneburst selection, shared by client and server configs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToneBurstConfig {
    Monotone(MonotoneConfig),
}

impl ToneBurstConfig {
    /// Build the per-connection state, checking the config.
    pub fn construct(&self) -> Result<ToneBurst> {
        match self {
            ToneBurstConfig::Monotone(config) => Ok(ToneBurst::Monotone(Monotone::new(config)?)),
        }
    }
}

/// Per-connection toneburst state.
#[derive(Debug)]
pub enum ToneBurst {
    Monotone(Monotone),
}

impl ToneBurst {
    /// Run the handshake to completion.
    pub async fn perform<S>(&mut self, stream: &mut S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self {
            ToneBurst::Monotone(monotone) => monotone.perform(stream).await,
        }
    }
}
