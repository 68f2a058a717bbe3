//! Monotone: a scripted, alternating send/expect handshake.
//!
//! ```text
//!   speak_first?  --yes-->  write add[0]
//!        |
//!        v
//!   loop until both queues are empty:
//!        read count(remove[i]) bytes, validate  (anything but Valid aborts)
//!        write add[j]
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::monolith::{Buffer, Context, Description, Instance, Message, Part, Validity};

/// What a Monotone handshake sends and what it expects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonotoneConfig {
    /// Messages to send, one per step
    #[serde(default)]
    pub add_sequences: Option<Instance>,

    /// Parts to expect, one per step
    #[serde(default)]
    pub remove_sequences: Option<Description>,

    /// Send the first add message before reading anything
    #[serde(default)]
    pub speak_first: bool,
}

impl MonotoneConfig {
    pub fn new(
        add_sequences: Option<Instance>,
        remove_sequences: Option<Description>,
        speak_first: bool,
    ) -> Self {
        Self {
            add_sequences,
            remove_sequences,
            speak_first,
        }
    }
}

/// One connection's run of the Monotone handshake.
#[derive(Debug)]
pub struct Monotone {
    add_messages: VecDeque<Message>,
    remove_parts: VecDeque<Part>,
    speak_first: bool,
    buffer: Buffer,
    context: Context,
}

impl Monotone {
    /// Materialize the messages to send and the parts to expect.
    ///
    /// Fails without touching any stream if asked to speak first with
    /// nothing to say.
    pub fn new(config: &MonotoneConfig) -> Result<Self> {
        let add_messages: VecDeque<Message> = config
            .add_sequences
            .as_ref()
            .map(Instance::messages)
            .unwrap_or_default()
            .into();
        let remove_parts: VecDeque<Part> = config
            .remove_sequences
            .as_ref()
            .map(|description| description.parts.clone())
            .unwrap_or_default()
            .into();

        if config.speak_first && add_messages.is_empty() {
            return Err(Error::config(
                "cannot speak first when there is nothing to add",
            ));
        }

        Ok(Self {
            add_messages,
            remove_parts,
            speak_first: config.speak_first,
            buffer: Buffer::new(),
            context: Context::new(),
        })
    }

    /// Variables recorded while validating received steps.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Run the handshake to completion over `stream`.
    pub async fn perform<S>(&mut self, stream: &mut S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if self.speak_first {
            if let Some(message) = self.add_messages.pop_front() {
                write_message(stream, &message).await?;
            }
        }

        loop {
            if self.remove_parts.is_empty() && self.add_messages.is_empty() {
                debug!("Monotone handshake complete");
                return Ok(());
            }

            if let Some(part) = self.remove_parts.pop_front() {
                self.remove(stream, &part).await?;
            }

            if let Some(message) = self.add_messages.pop_front() {
                write_message(stream, &message).await?;
            }
        }
    }

    async fn remove<S>(&mut self, stream: &mut S, part: &Part) -> Result<()>
    where
        S: AsyncRead + Unpin,
    {
        part.resolve(&mut self.context);
        let count = part.count(&self.context);

        let mut received = vec![0u8; count];
        stream.read_exact(&mut received).await?;
        self.buffer.push(&received);

        match part.validate(&mut self.buffer, &mut self.context) {
            Validity::Valid => {
                debug!("Monotone step validated ({} bytes)", count);
                Ok(())
            }
            validity => {
                debug!("Monotone step failed: {}", validity);
                Err(Error::Validation(validity))
            }
        }
    }
}

async fn write_message<S>(stream: &mut S, message: &Message) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    if let Some(delay) = message.delay() {
        tokio::time::sleep(delay).await;
    }
    stream.write_all(message.bytes()).await?;
    stream.flush().await?;
    debug!("Monotone step sent ({} bytes)", message.len());
    Ok(())
}
