//! # Replicant
//!
//! An adversary-tunable obfuscating transport. The first bytes of every
//! connection follow an operator-written byte-pattern grammar, and
//! everything after them is framed into fixed-size encrypted chunks.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Server (forward) / Client (local tunnel)       │
//! ├─────────────────────────────────────────────────────────┤
//! │  Connection: dial / listen / read / write / relay       │
//! ├─────────────────────────────────────────────────────────┤
//! │  Toneburst: Monotone scripted send/expect handshake     │
//! ├─────────────────────────────────────────────────────────┤
//! │  Polish: Silver ECDH key block + chunked AEAD framing   │
//! ├─────────────────────────────────────────────────────────┤
//! │  Monolith grammar │ Crypto (P-256, X9.63, ChaCha20)     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> replicant::Result<()> {
//! use replicant::ServerConfig;
//!
//! let server = ServerConfig::generate_silver();
//! let client = server.client_config(None);
//!
//! let listener = server.listen("127.0.0.1:2277").await?;
//! let mut connection = client.dial("127.0.0.1:2277").await?;
//! connection.write(b"hello").await?;
//! # let _ = listener;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod monolith;
pub mod polish;
pub mod relay;
pub mod toneburst;

#[cfg(feature = "server")]
pub mod server;

pub use config::{ClientConfig, ServerConfig};
pub use connection::{dial, Acceptor, Connection, ConnectionReader, ConnectionWriter, Listener};
pub use error::{Error, Result};
pub use monolith::Validity;

/// Default timeout for handshake operations (milliseconds)
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

/// Default timeout for establishing the raw TCP connection (milliseconds)
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;
