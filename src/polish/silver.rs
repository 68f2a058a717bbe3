//! Silver: P-256 key agreement and fixed-size encrypted chunks.
//!
//! ```text
//! Handshake (client -> server), exactly chunk_size bytes:
//!
//!   +----------------------------+---------------------------------+
//!   | client public key (65)     | random padding                  |
//!   +----------------------------+---------------------------------+
//!
//! Data chunk, exactly chunk_size bytes:
//!
//!   +-----------+--------------------------------------------------+
//!   | nonce(12) | seal( len:u16 LE | data | zero padding ) + tag(16)|
//!   +-----------+--------------------------------------------------+
//! ```
//!
//! The chunk size is chosen once when the server config is generated and
//! shared with clients through their config.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::crypto::{
    derive_key, random_padding, Aead, AeadKey, EphemeralSecret, Nonce, PublicKey, SecureRandom,
    StaticSecret, NONCE_SIZE, PUBLIC_KEY_SIZE, TAG_SIZE,
};
use crate::error::{Error, Result};

/// Payload bytes every chunk carries at minimum.
pub const BASE_PAYLOAD_SIZE: usize = 1024;

/// Exclusive upper bound of the random payload size added on generation.
pub const PAYLOAD_SIZE_RANDOMNESS: usize = 512;

/// Size of the plaintext length prefix inside each sealed payload.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Smallest chunk that can carry the handshake block and one data byte.
pub const MIN_CHUNK_SIZE: usize = NONCE_SIZE + TAG_SIZE + PUBLIC_KEY_SIZE;

/// Largest chunk whose length prefix still fits in 16 bits.
pub const MAX_CHUNK_SIZE: usize = NONCE_SIZE + TAG_SIZE + LENGTH_PREFIX_SIZE + u16::MAX as usize;

fn check_chunk_size(chunk_size: usize) -> Result<()> {
    if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
        return Err(Error::config(format!(
            "chunk size {} outside {}..={}",
            chunk_size, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
        )));
    }
    Ok(())
}

/// Public half of a Silver server config, handed to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilverClientConfig {
    /// Server's static public key (uncompressed SEC1, base64 in config files)
    #[serde(with = "base64_public_key")]
    pub server_public_key: PublicKey,

    /// Fixed size of every handshake block and data chunk
    pub chunk_size: usize,
}

impl SilverClientConfig {
    pub fn new(server_public_key: PublicKey, chunk_size: usize) -> Self {
        Self {
            server_public_key,
            chunk_size,
        }
    }

    /// Check that the chunk size can carry the handshake and data.
    pub fn validate(&self) -> Result<()> {
        check_chunk_size(self.chunk_size)
    }
}

/// A Silver server's long-term key and chunk size.
#[derive(Clone, Serialize, Deserialize)]
pub struct SilverServerConfig {
    /// Server's static public key (uncompressed SEC1, base64 in config files)
    #[serde(with = "base64_public_key")]
    pub server_public_key: PublicKey,

    /// Server's static secret key (base64 in config files)
    #[serde(with = "base64_secret_key")]
    pub server_private_key: StaticSecret,

    /// Fixed size of every handshake block and data chunk
    pub chunk_size: usize,
}

impl SilverServerConfig {
    /// Create a fresh config with a random key and a random chunk size.
    ///
    /// `chunk_size = nonce + tag + 1024 + uniform(0..512)`
    pub fn generate() -> Self {
        let secret = StaticSecret::random();
        let chunk_size =
            NONCE_SIZE + TAG_SIZE + BASE_PAYLOAD_SIZE + SecureRandom::below(PAYLOAD_SIZE_RANDOMNESS);

        Self {
            server_public_key: PublicKey::from(&secret),
            server_private_key: secret,
            chunk_size,
        }
    }

    /// The matching client config.
    pub fn client_config(&self) -> SilverClientConfig {
        SilverClientConfig::new(self.server_public_key.clone(), self.chunk_size)
    }

    /// Check the chunk size and that the public key belongs to the private key.
    pub fn validate(&self) -> Result<()> {
        check_chunk_size(self.chunk_size)?;
        if PublicKey::from(&self.server_private_key) != self.server_public_key {
            return Err(Error::config("server public key does not match private key"));
        }
        Ok(())
    }
}

impl PartialEq for SilverServerConfig {
    fn eq(&self, other: &Self) -> bool {
        self.server_public_key == other.server_public_key
            && self.chunk_size == other.chunk_size
            && *self.server_private_key.to_bytes() == *other.server_private_key.to_bytes()
    }
}

impl Eq for SilverServerConfig {}

impl std::fmt::Debug for SilverServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SilverServerConfig")
            .field("server_public_key", &self.server_public_key)
            .field("server_private_key", &"<redacted>")
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// Client side of a Silver handshake.
///
/// Holds a fresh ephemeral key and the cipher derived from it, ready to
/// send the key block.
pub struct SilverClient {
    public_key: [u8; PUBLIC_KEY_SIZE],
    cipher: SilverCipher,
}

impl SilverClient {
    /// Generate an ephemeral key and derive the shared cipher.
    pub fn new(config: &SilverClientConfig) -> Result<Self> {
        config.validate()?;

        let secret = EphemeralSecret::random();
        let public_key = PublicKey::from(&secret).to_bytes();
        let shared = secret.diffie_hellman(&config.server_public_key);
        let key = derive_key(&shared, &public_key);

        Ok(Self {
            public_key,
            cipher: SilverCipher::new(&key, config.chunk_size)?,
        })
    }

    /// Send the key block and return the cipher for the connection.
    pub async fn handshake<S>(self, stream: &mut S) -> Result<SilverCipher>
    where
        S: AsyncWrite + Unpin,
    {
        let mut block = random_padding(self.cipher.chunk_size());
        block[..PUBLIC_KEY_SIZE].copy_from_slice(&self.public_key);

        stream.write_all(&block).await?;
        stream.flush().await?;

        debug!("Silver client handshake sent ({} bytes)", block.len());
        Ok(self.cipher)
    }
}

/// Server side of the Silver handshake, shared by every accepted connection.
#[derive(Clone)]
pub struct SilverServer {
    secret: StaticSecret,
    chunk_size: usize,
}

impl SilverServer {
    pub fn new(config: &SilverServerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            secret: config.server_private_key.clone(),
            chunk_size: config.chunk_size,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Read the client's key block and derive the cipher for the connection.
    pub async fn handshake<S>(&self, stream: &mut S) -> Result<SilverCipher>
    where
        S: AsyncRead + Unpin,
    {
        let mut block = vec![0u8; self.chunk_size];
        stream.read_exact(&mut block).await?;

        let client_public_key = &block[..PUBLIC_KEY_SIZE];
        let peer = PublicKey::from_bytes(client_public_key)?;
        let shared = self.secret.diffie_hellman(&peer);
        let key = derive_key(&shared, client_public_key);

        debug!("Silver server handshake received ({} bytes)", block.len());
        SilverCipher::new(&key, self.chunk_size)
    }
}

/// Per-connection chunk cipher.
#[derive(Clone, Debug)]
pub struct SilverCipher {
    aead: Aead,
    chunk_size: usize,
}

impl SilverCipher {
    pub fn new(key: &AeadKey, chunk_size: usize) -> Result<Self> {
        check_chunk_size(chunk_size)?;
        Ok(Self {
            aead: Aead::new(key),
            chunk_size,
        })
    }

    /// Total wire size of one chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Size of the sealed payload (length prefix, data and padding).
    pub fn payload_size(&self) -> usize {
        self.chunk_size - NONCE_SIZE - TAG_SIZE
    }

    /// Most plaintext bytes a single chunk can carry.
    pub fn max_input_size(&self) -> usize {
        self.payload_size() - LENGTH_PREFIX_SIZE
    }

    /// Seal `input` into one or more chunks.
    ///
    /// Empty input still produces one chunk.
    pub fn polish(&self, input: &[u8]) -> Result<Vec<u8>> {
        let max = self.max_input_size();
        let chunks = input.len().div_ceil(max).max(1);
        let mut output = Vec::with_capacity(chunks * self.chunk_size);

        if input.is_empty() {
            self.seal_chunk(input, &mut output)?;
        } else {
            for piece in input.chunks(max) {
                self.seal_chunk(piece, &mut output)?;
            }
        }
        Ok(output)
    }

    fn seal_chunk(&self, piece: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let nonce = Nonce::random();

        let mut payload = Vec::with_capacity(self.payload_size() + TAG_SIZE);
        payload.put_u16_le(piece.len() as u16);
        payload.extend_from_slice(piece);
        payload.resize(self.payload_size(), 0);

        self.aead.encrypt_in_place(&nonce, &mut payload)?;

        output.extend_from_slice(nonce.as_bytes());
        output.extend_from_slice(&payload);
        Ok(())
    }

    /// Open one or more whole chunks and concatenate their plaintext.
    pub fn unpolish(&self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() < self.chunk_size {
            return Err(Error::Buffer {
                expected: self.chunk_size,
                actual: input.len(),
            });
        }
        if input.len() % self.chunk_size != 0 {
            return Err(Error::InvalidMessage(format!(
                "{} bytes is not a whole number of {}-byte chunks",
                input.len(),
                self.chunk_size
            )));
        }

        let mut output = Vec::with_capacity(input.len() / self.chunk_size * self.max_input_size());
        for chunk in input.chunks(self.chunk_size) {
            self.open_chunk(chunk, &mut output)?;
        }
        Ok(output)
    }

    fn open_chunk(&self, chunk: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let nonce = Nonce::from_slice(chunk)?;
        let mut payload = chunk[NONCE_SIZE..].to_vec();
        self.aead.decrypt_in_place(&nonce, &mut payload)?;

        let mut prefix = &payload[..LENGTH_PREFIX_SIZE];
        let len = prefix.get_u16_le() as usize;
        if len > self.max_input_size() {
            return Err(Error::InvalidMessage(format!(
                "chunk length prefix {} exceeds capacity {}",
                len,
                self.max_input_size()
            )));
        }

        output.extend_from_slice(&payload[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + len]);
        Ok(())
    }
}

mod base64_public_key {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::crypto::PublicKey;

    pub fn serialize<S>(key: &PublicKey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(key.to_bytes()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<PublicKey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(&s).map_err(serde::de::Error::custom)?;
        PublicKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

mod base64_secret_key {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};
    use zeroize::Zeroizing;

    use crate::crypto::StaticSecret;

    pub fn serialize<S>(key: &StaticSecret, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = Zeroizing::new(STANDARD.encode(key.to_bytes().as_slice()));
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<StaticSecret, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Zeroizing::new(String::deserialize(deserializer)?);
        let bytes = Zeroizing::new(STANDARD.decode(s.as_str()).map_err(serde::de::Error::custom)?);
        StaticSecret::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher_pair() -> (SilverCipher, SilverCipher, usize) {
        let server_config = SilverServerConfig::generate();
        let client_config = server_config.client_config();
        let chunk_size = server_config.chunk_size;

        let secret = EphemeralSecret::random();
        let client_public = PublicKey::from(&secret).to_bytes();
        let client_key = derive_key(&secret.diffie_hellman(&client_config.server_public_key), &client_public);
        let server_key = derive_key(
            &server_config
                .server_private_key
                .diffie_hellman(&PublicKey::from_bytes(&client_public).unwrap()),
            &client_public,
        );

        (
            SilverCipher::new(&client_key, chunk_size).unwrap(),
            SilverCipher::new(&server_key, chunk_size).unwrap(),
            chunk_size,
        )
    }

    #[test]
    fn test_generated_chunk_size() {
        for _ in 0..16 {
            let config = SilverServerConfig::generate();
            let min = NONCE_SIZE + TAG_SIZE + BASE_PAYLOAD_SIZE;
            assert!(config.chunk_size >= min);
            assert!(config.chunk_size < min + PAYLOAD_SIZE_RANDOMNESS);
            config.validate().unwrap();
        }
    }

    #[test]
    fn test_round_trip_lengths() {
        let (client, server, chunk_size) = cipher_pair();
        let max = client.max_input_size();

        for len in [0, 1, chunk_size - 1, max, max + 1, 3 * max, 3 * max + 17] {
            let message = random_padding(len);
            let polished = client.polish(&message).unwrap();
            assert_eq!(polished.len() % chunk_size, 0, "length {}", len);
            assert_eq!(polished.len() / chunk_size, len.div_ceil(max).max(1));
            assert_eq!(server.unpolish(&polished).unwrap(), message, "length {}", len);
        }
    }

    #[test]
    fn test_polish_unpolish_polish() {
        let (client, server, _) = cipher_pair();
        let message = random_padding(2 * client.max_input_size() + 5);

        let first = client.polish(&message).unwrap();
        let second = client.polish(&server.unpolish(&first).unwrap()).unwrap();

        // Fresh nonces make the bytes differ; shape and content do not
        assert_eq!(first.len(), second.len());
        assert_ne!(first, second);
        assert_eq!(server.unpolish(&second).unwrap(), message);
    }

    #[test]
    fn test_unpolish_short_input() {
        let (client, server, chunk_size) = cipher_pair();
        let polished = client.polish(b"hi").unwrap();
        assert!(matches!(
            server.unpolish(&polished[..chunk_size - 1]),
            Err(Error::Buffer { .. })
        ));
    }

    #[test]
    fn test_unpolish_ragged_input() {
        let (client, server, chunk_size) = cipher_pair();
        let polished = client.polish(&random_padding(2 * client.max_input_size())).unwrap();
        assert!(matches!(
            server.unpolish(&polished[..chunk_size + 1]),
            Err(Error::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_unpolish_tampered() {
        let (client, server, chunk_size) = cipher_pair();
        let mut polished = client.polish(b"attack at dawn").unwrap();
        polished[chunk_size / 2] ^= 0x80;
        assert!(matches!(server.unpolish(&polished), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_length_prefix_overflow() {
        let (client, server, _) = cipher_pair();

        let nonce = Nonce::random();
        let mut payload = Vec::new();
        payload.put_u16_le(u16::MAX);
        payload.resize(client.payload_size(), 0);
        client.aead.encrypt_in_place(&nonce, &mut payload).unwrap();

        let mut chunk = nonce.as_bytes().to_vec();
        chunk.extend_from_slice(&payload);
        assert!(matches!(server.unpolish(&chunk), Err(Error::InvalidMessage(_))));
    }

    #[test]
    fn test_chunk_size_bounds() {
        let key = AeadKey::from_bytes([7u8; 32]);
        assert!(SilverCipher::new(&key, MIN_CHUNK_SIZE - 1).is_err());
        assert!(SilverCipher::new(&key, MAX_CHUNK_SIZE + 1).is_err());
        assert!(SilverCipher::new(&key, MIN_CHUNK_SIZE).is_ok());
        assert!(SilverCipher::new(&key, MAX_CHUNK_SIZE).is_ok());
    }

    #[test]
    fn test_config_serde() {
        let server_config = SilverServerConfig::generate();
        let json = serde_json::to_string(&server_config).unwrap();
        let restored: SilverServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, server_config);

        let client_json = serde_json::to_string(&server_config.client_config()).unwrap();
        let client: SilverClientConfig = serde_json::from_str(&client_json).unwrap();
        assert_eq!(client, server_config.client_config());

        assert!(!format!("{:?}", server_config).contains(&hex::encode(
            server_config.server_private_key.to_bytes().as_slice()
        )));
    }

    #[test]
    fn test_mismatched_server_keys_rejected() {
        let mut config = SilverServerConfig::generate();
        config.server_public_key = SilverServerConfig::generate().server_public_key;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(SilverServer::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_handshake_over_duplex() {
        let server_config = SilverServerConfig::generate();
        let server = SilverServer::new(&server_config).unwrap();
        let client = SilverClient::new(&server_config.client_config()).unwrap();

        let (mut client_io, mut server_io) = tokio::io::duplex(64 * 1024);

        let server_task = tokio::spawn(async move { server.handshake(&mut server_io).await });
        let client_cipher = client.handshake(&mut client_io).await.unwrap();
        let server_cipher = server_task.await.unwrap().unwrap();

        let polished = client_cipher.polish(b"\x0a\x11\xb0\xb1").unwrap();
        assert_eq!(server_cipher.unpolish(&polished).unwrap(), b"\x0a\x11\xb0\xb1");

        let reply = server_cipher.polish(b"pong").unwrap();
        assert_eq!(client_cipher.unpolish(&reply).unwrap(), b"pong");
    }

    #[tokio::test]
    async fn test_handshake_rejects_garbage_key() {
        let server_config = SilverServerConfig::generate();
        let server = SilverServer::new(&server_config).unwrap();

        let (mut client_io, mut server_io) = tokio::io::duplex(64 * 1024);
        client_io
            .write_all(&vec![0u8; server_config.chunk_size])
            .await
            .unwrap();

        let result = server.handshake(&mut server_io).await;
        assert!(matches!(result, Err(Error::KeyExchange(_))));
    }
}
