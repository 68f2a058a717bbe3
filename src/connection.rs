//! Replicant connections.
//!
//! A [`Connection`] wraps a raw byte stream. Establishing it runs the
//! configured toneburst over the raw stream, then the polish handshake;
//! afterwards every write is sealed into whole chunks and every read opens
//! exactly one chunk.
//!
//! ```text
//!   raw stream ──> toneburst.perform ──> polish.handshake ──> Connection
//!                     (optional)             (optional)
//! ```
//!
//! Plaintext left over from a chunk that did not fit the caller's buffer is
//! kept for the next read. A read that times out part way through a chunk
//! keeps the bytes it got, so the next read resumes on the same chunk. A
//! write that fails or is cancelled part way leaves the wire misaligned, so
//! every later write on that side fails.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info};

use crate::config::{ClientConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::polish::{PolishServer, SilverCipher};
use crate::toneburst::ToneBurstConfig;
use crate::{CONNECT_TIMEOUT_MS, HANDSHAKE_TIMEOUT_MS};

/// Receive side state: the cipher, the chunk being filled, leftover
/// plaintext, and the deadline.
#[derive(Clone, Debug)]
struct ReadState {
    cipher: Option<SilverCipher>,
    pending: PartialChunk,
    received: BytesMut,
    timeout: Option<Duration>,
}

/// Send side state. `poisoned` is set while a write is in flight and only
/// cleared once it has fully landed.
#[derive(Clone, Debug)]
struct WriteState {
    cipher: Option<SilverCipher>,
    timeout: Option<Duration>,
    poisoned: bool,
}

/// A chunk being read off the wire.
#[derive(Clone, Debug, Default)]
struct PartialChunk {
    buf: Vec<u8>,
    filled: usize,
}

impl ReadState {
    async fn read<R>(&mut self, reader: &mut R, buf: &mut [u8]) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.received.is_empty() {
            return Ok(self.drain_into(buf));
        }

        let Some(cipher) = &self.cipher else {
            return with_timeout(self.timeout, reader.read(buf)).await;
        };

        // A chunk may carry no plaintext; keep reading until one does.
        let chunk_size = cipher.chunk_size();
        let plaintext = loop {
            let chunk = with_timeout(self.timeout, self.pending.fill(reader, chunk_size)).await?;
            let Some(chunk) = chunk else {
                return Ok(0);
            };
            let plaintext = cipher.unpolish(&chunk)?;
            if !plaintext.is_empty() {
                break plaintext;
            }
        };

        self.received.extend_from_slice(&plaintext);
        Ok(self.drain_into(buf))
    }

    fn drain_into(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.received.len());
        buf[..n].copy_from_slice(&self.received[..n]);
        self.received.advance(n);
        n
    }
}

impl WriteState {
    async fn write<W>(&mut self, writer: &mut W, data: &[u8]) -> Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        if self.poisoned {
            return Err(Error::Network(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "an earlier write did not complete",
            )));
        }

        let sealed;
        let wire: &[u8] = match &self.cipher {
            Some(cipher) => {
                sealed = cipher.polish(data)?;
                &sealed
            }
            None => data,
        };

        self.poisoned = true;
        let written = with_timeout(self.timeout, async {
            writer.write_all(wire).await?;
            writer.flush().await
        })
        .await;
        if let Err(e) = written {
            debug!("Write failed part way, poisoning the send side: {}", e);
            return Err(e);
        }
        self.poisoned = false;
        Ok(data.len())
    }
}

impl PartialChunk {
    /// Fill one chunk. `None` when the peer closed cleanly on a chunk
    /// boundary. Bytes read before a cancellation stay in `self`.
    async fn fill<R>(&mut self, reader: &mut R, chunk_size: usize) -> Result<Option<Vec<u8>>>
    where
        R: AsyncRead + Unpin,
    {
        if self.buf.len() != chunk_size {
            self.buf = vec![0u8; chunk_size];
            self.filled = 0;
        }
        while self.filled < chunk_size {
            let n = reader.read(&mut self.buf[self.filled..]).await?;
            if n == 0 {
                if self.filled == 0 {
                    return Ok(None);
                }
                return Err(Error::Buffer {
                    expected: chunk_size,
                    actual: self.filled,
                });
            }
            self.filled += n;
        }
        self.filled = 0;
        Ok(Some(std::mem::take(&mut self.buf)))
    }
}

async fn with_timeout<F, T, E>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<Error>,
{
    match limit {
        None => fut.await.map_err(Into::into),
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(Error::Timeout(limit.as_millis() as u64)),
        },
    }
}

/// An established Replicant connection over a raw stream `S`.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    reader: ReadState,
    writer: WriteState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// A connection with no polish: reads and writes pass through.
    pub fn raw(stream: S) -> Self {
        Self::with_cipher(stream, None)
    }

    fn with_cipher(stream: S, cipher: Option<SilverCipher>) -> Self {
        Self {
            stream,
            reader: ReadState {
                cipher: cipher.clone(),
                pending: PartialChunk::default(),
                received: BytesMut::new(),
                timeout: None,
            },
            writer: WriteState {
                cipher,
                timeout: None,
                poisoned: false,
            },
        }
    }

    /// Run the client side of the handshake over `stream`.
    pub async fn client(mut stream: S, config: &ClientConfig) -> Result<Self> {
        if let Some(toneburst) = &config.toneburst {
            toneburst.construct()?.perform(&mut stream).await?;
        }
        let cipher = match &config.polish {
            Some(polish) => Some(polish.handshake(&mut stream).await?),
            None => None,
        };
        debug!("Client handshake complete (polish: {})", cipher.is_some());
        Ok(Self::with_cipher(stream, cipher))
    }

    /// Run the server side of the handshake over `stream`.
    ///
    /// Constructs the polish from `config` on every call; use an
    /// [`Acceptor`] to share one across connections.
    pub async fn server(stream: S, config: &ServerConfig) -> Result<Self> {
        Acceptor::new(config)?.handshake(stream).await
    }

    /// Whether a polish cipher is active.
    pub fn is_polished(&self) -> bool {
        self.writer.cipher.is_some()
    }

    /// Read plaintext into `buf`. `Ok(0)` means the peer closed.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.reader.read(&mut self.stream, buf).await
    }

    /// Read until `buf` is full.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(Error::Buffer {
                    expected: buf.len(),
                    actual: filled,
                });
            }
            filled += n;
        }
        Ok(())
    }

    /// Write all of `data`, returning its length.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.writer.write(&mut self.stream, data).await
    }

    /// Shut down the write side of the raw stream.
    pub async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.reader.timeout = timeout;
    }

    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.writer.timeout = timeout;
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(self) -> (ConnectionReader<S>, ConnectionWriter<S>) {
        let (read_half, write_half) = tokio::io::split(self.stream);
        (
            ConnectionReader {
                half: read_half,
                state: self.reader,
            },
            ConnectionWriter {
                half: write_half,
                state: self.writer,
            },
        )
    }
}

impl Connection<TcpStream> {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.local_addr()?)
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }
}

/// Read half of a split [`Connection`].
#[derive(Debug)]
pub struct ConnectionReader<S> {
    half: ReadHalf<S>,
    state: ReadState,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> ConnectionReader<S> {
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.state.read(&mut self.half, buf).await
    }
}

/// Write half of a split [`Connection`].
#[derive(Debug)]
pub struct ConnectionWriter<S> {
    half: WriteHalf<S>,
    state: WriteState,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> ConnectionWriter<S> {
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.state.write(&mut self.half, data).await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.half.shutdown().await?;
        Ok(())
    }
}

struct AcceptorInner {
    toneburst: Option<ToneBurstConfig>,
    polish: Option<PolishServer>,
}

/// Server-side handshake state shared by every accepted connection.
///
/// The polish is constructed once; each connection gets its own
/// toneburst state.
#[derive(Clone)]
pub struct Acceptor {
    inner: Arc<AcceptorInner>,
}

impl Acceptor {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        if let Some(toneburst) = &config.toneburst {
            toneburst.construct()?;
        }
        let polish = config
            .polish
            .as_ref()
            .map(|polish| polish.construct())
            .transpose()?;

        Ok(Self {
            inner: Arc::new(AcceptorInner {
                toneburst: config.toneburst.clone(),
                polish,
            }),
        })
    }

    /// Run the server handshake with no deadline.
    pub async fn handshake<S>(&self, mut stream: S) -> Result<Connection<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        if let Some(toneburst) = &self.inner.toneburst {
            toneburst.construct()?.perform(&mut stream).await?;
        }
        let cipher = match &self.inner.polish {
            Some(polish) => Some(polish.handshake(&mut stream).await?),
            None => None,
        };
        debug!("Server handshake complete (polish: {})", cipher.is_some());
        Ok(Connection::with_cipher(stream, cipher))
    }

    /// Run the server handshake, giving up after the handshake timeout.
    pub async fn accept<S>(&self, stream: S) -> Result<Connection<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let limit = Duration::from_millis(HANDSHAKE_TIMEOUT_MS);
        tokio::time::timeout(limit, self.handshake(stream))
            .await
            .map_err(|_| Error::Timeout(HANDSHAKE_TIMEOUT_MS))?
    }
}

impl std::fmt::Debug for Acceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acceptor")
            .field("toneburst", &self.inner.toneburst.is_some())
            .field("polish", &self.inner.polish.is_some())
            .finish()
    }
}

/// A TCP listener whose `accept` yields handshaken connections.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    acceptor: Acceptor,
}

impl Listener {
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: &ServerConfig) -> Result<Self> {
        let acceptor = Acceptor::new(config)?;
        let inner = TcpListener::bind(addr).await?;
        info!("Replicant listening on {}", inner.local_addr()?);
        Ok(Self { inner, acceptor })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Accept the next TCP connection and run the server handshake on it.
    ///
    /// The handshake runs inline, so a peer that stalls holds up the next
    /// accept for up to [`HANDSHAKE_TIMEOUT_MS`]. Servers taking many
    /// connections should accept raw streams themselves and hand each to
    /// [`Acceptor::accept`] on a spawned task.
    pub async fn accept(&self) -> Result<(Connection<TcpStream>, SocketAddr)> {
        let (stream, peer) = self.inner.accept().await?;
        stream.set_nodelay(true)?;
        let connection = self.acceptor.accept(stream).await?;
        Ok((connection, peer))
    }
}

/// Connect to `addr` over TCP and run the client handshake.
pub async fn dial<A: ToSocketAddrs>(addr: A, config: &ClientConfig) -> Result<Connection<TcpStream>> {
    let stream = tokio::time::timeout(
        Duration::from_millis(CONNECT_TIMEOUT_MS),
        TcpStream::connect(addr),
    )
    .await
    .map_err(|_| Error::Timeout(CONNECT_TIMEOUT_MS))??;
    stream.set_nodelay(true)?;

    tokio::time::timeout(
        Duration::from_millis(HANDSHAKE_TIMEOUT_MS),
        Connection::client(stream, config),
    )
    .await
    .map_err(|_| Error::Timeout(HANDSHAKE_TIMEOUT_MS))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monolith::{Args, ByteType, BytesPart, Description, Instance, Part, Validity};
    use crate::polish::{PolishServerConfig, SilverServerConfig};
    use crate::toneburst::MonotoneConfig;

    fn silver_pair() -> (ClientConfig, ServerConfig) {
        let server = ServerConfig::new(
            None,
            Some(PolishServerConfig::Silver(SilverServerConfig::generate())),
        );
        (server.client_config(None), server)
    }

    async fn connect<S>(
        client_io: S,
        server_io: S,
        client: &ClientConfig,
        server: &ServerConfig,
    ) -> (Connection<S>, Connection<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let acceptor = Acceptor::new(server).unwrap();
        let (client, server) = tokio::join!(
            Connection::client(client_io, client),
            acceptor.accept(server_io)
        );
        (client.unwrap(), server.unwrap())
    }

    #[tokio::test]
    async fn test_raw_passthrough() {
        let (client_io, server_io) = tokio::io::duplex(1024);
        let mut client = Connection::raw(client_io);
        let mut server = Connection::raw(server_io);

        client.write(b"plain").await.unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"plain");
        assert!(!client.is_polished());
    }

    #[tokio::test]
    async fn test_polished_round_trip() {
        let (client_config, server_config) = silver_pair();
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (mut client, mut server) =
            connect(client_io, server_io, &client_config, &server_config).await;
        assert!(client.is_polished());

        client.write(&[0x0A, 0x11, 0xB0, 0xB1]).await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x0A, 0x11, 0xB0, 0xB1]);

        server.write(b"reply").await.unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"reply");
    }

    #[tokio::test]
    async fn test_small_reads_keep_leftover() {
        let (client_config, server_config) = silver_pair();
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (mut client, mut server) =
            connect(client_io, server_io, &client_config, &server_config).await;

        let message: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        client.write(&message).await.unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 7];
        while received.len() < message.len() {
            let n = server.read(&mut buf).await.unwrap();
            assert!(n > 0);
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, message);
    }

    #[tokio::test]
    async fn test_close_reads_zero() {
        let (client_config, server_config) = silver_pair();
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (mut client, mut server) =
            connect(client_io, server_io, &client_config, &server_config).await;

        client.close().await.unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_toneburst_mismatch_aborts() {
        let expect = |byte| {
            Description::new(vec![Part::Bytes(BytesPart::new(vec![ByteType::fixed(byte)]))])
        };
        let client = ClientConfig::new(
            Some(ToneBurstConfig::Monotone(MonotoneConfig::new(
                Some(Instance::new(expect(0x14), Args::empty())),
                None,
                true,
            ))),
            None,
        );
        let server = ServerConfig::new(
            Some(ToneBurstConfig::Monotone(MonotoneConfig::new(
                None,
                Some(expect(0x13)),
                false,
            ))),
            None,
        );

        let (client_io, server_io) = tokio::io::duplex(1024);
        let acceptor = Acceptor::new(&server).unwrap();
        let (client, server) = tokio::join!(
            Connection::client(client_io, &client),
            acceptor.accept(server_io)
        );
        assert!(client.is_ok());
        assert!(matches!(server, Err(Error::Validation(Validity::Invalid))));
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let (client_io, _server_io) = tokio::io::duplex(1024);
        let mut client = Connection::raw(client_io);
        client.set_read_timeout(Some(Duration::from_millis(20)));

        let mut buf = [0u8; 1];
        let err = client.read(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(20)));
    }

    #[tokio::test]
    async fn test_read_resumes_after_mid_chunk_timeout() {
        let (client_config, server_config) = silver_pair();
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (mut client, mut server) =
            connect(client_io, server_io, &client_config, &server_config).await;
        server.set_read_timeout(Some(Duration::from_millis(20)));

        let sealed = client.writer.cipher.as_ref().unwrap().polish(b"late").unwrap();
        let (head, tail) = sealed.split_at(sealed.len() / 2);

        // The sender stalls halfway through the chunk.
        client.stream.write_all(head).await.unwrap();
        let mut buf = [0u8; 4];
        let err = server.read(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(20)));

        client.stream.write_all(tail).await.unwrap();
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"late");

        client.write(b"next").await.unwrap();
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"next");
    }

    #[tokio::test]
    async fn test_write_timeout_poisons_writer() {
        let (client_config, server_config) = silver_pair();
        let (client_io, server_io) = tokio::io::duplex(256);
        let (mut client, _server) =
            connect(client_io, server_io, &client_config, &server_config).await;
        client.set_write_timeout(Some(Duration::from_millis(20)));

        // Nobody drains the pipe, so the chunk cannot land in full.
        let err = client.write(b"stalled").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(20)));

        let err = client.write(b"after").await.unwrap_err();
        assert!(matches!(err, Error::Network(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[tokio::test]
    async fn test_split_halves() {
        let (client_config, server_config) = silver_pair();
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (client, server) = connect(client_io, server_io, &client_config, &server_config).await;

        let (mut client_reader, mut client_writer) = client.into_split();
        let (mut server_reader, mut server_writer) = server.into_split();

        client_writer.write(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        let n = server_reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");

        server_writer.write(b"pong").await.unwrap();
        let n = client_reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pong");
    }

    #[tokio::test]
    async fn test_dial_and_listen() {
        let (client_config, server_config) = silver_pair();
        let listener = Listener::bind("127.0.0.1:0", &server_config).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut connection, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            connection.read_exact(&mut buf).await.unwrap();
            connection.write(&buf).await.unwrap();
        });

        let mut client = dial(addr, &client_config).await.unwrap();
        assert_eq!(client.peer_addr().unwrap(), addr);
        client.write(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        server.await.unwrap();
    }
}
