//! Bidirectional relay between a Replicant connection and a plain stream.
//!
//! Each direction runs until its source closes, then shuts down the write
//! side of its destination. The relay finishes when both directions have
//! finished, or as soon as either fails.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::connection::Connection;
use crate::error::Result;

/// Read size on the plain side. Larger reads are split into several chunks.
const RELAY_BUFFER_SIZE: usize = 16 * 1024;

/// Bytes moved by one relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Plaintext received over the Replicant connection
    pub received: u64,
    /// Plaintext sent over the Replicant connection
    pub sent: u64,
}

/// Relay data between `connection` and `plain` until both sides close.
pub async fn relay<S, P>(connection: Connection<S>, plain: P) -> Result<RelayStats>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    P: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (mut conn_reader, mut conn_writer) = connection.into_split();
    let (mut plain_reader, mut plain_writer) = tokio::io::split(plain);

    // Replicant -> plain
    let inbound = async {
        let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = conn_reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            plain_writer.write_all(&buf[..n]).await?;
            total += n as u64;
        }
        plain_writer.shutdown().await?;
        debug!("Relay inbound closed after {} bytes", total);
        Ok::<u64, crate::Error>(total)
    };

    // Plain -> Replicant
    let outbound = async {
        let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = plain_reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            conn_writer.write(&buf[..n]).await?;
            total += n as u64;
        }
        conn_writer.close().await?;
        debug!("Relay outbound closed after {} bytes", total);
        Ok::<u64, crate::Error>(total)
    };

    let (received, sent) = tokio::try_join!(inbound, outbound)?;
    Ok(RelayStats { received, sent })
}
