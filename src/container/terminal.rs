//! Interactive terminal relay.
//!
//! Bridges a client connection to a shell inside a container. Two forwarding
//! loops run concurrently: shell output to the client (decoded as UTF-8 with
//! invalid sequences dropped) and client input to the shell. The first loop
//! to finish ends the session; both sides are then closed exactly once.

use crate::container::runtime::ShellChannel;
use crate::container::{ContainerRuntime, Result};
use crate::env::runtime::{TERMINAL_SHELL, TERMINAL_USER};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace};

/// Why a relay session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEnd {
    /// The shell exited or its output stream ended
    ContainerClosed,
    /// The client stopped sending
    ClientClosed,
    /// Reading from or writing to the shell failed
    ContainerError(String),
    /// Sending to the client failed
    ClientError(String),
}

/// Opens shells and relays them to client connections.
pub struct TerminalRelay {
    runtime: Arc<dyn ContainerRuntime>,
    shell: String,
    user: String,
}

impl TerminalRelay {
    /// Relay running the default shell as the default user.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            shell: TERMINAL_SHELL.to_string(),
            user: TERMINAL_USER.to_string(),
        }
    }

    /// Override the shell binary.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Open a shell in `container_id` and relay it until either side closes.
    ///
    /// # Errors
    ///
    /// Returns error if the shell cannot be started. Errors during the
    /// session are reported through [`RelayEnd`].
    pub async fn attach<R, W>(
        &self,
        container_id: &str,
        client_rx: R,
        client_tx: W,
    ) -> Result<RelayEnd>
    where
        R: Stream<Item = Vec<u8>> + Unpin,
        W: Sink<String> + Unpin,
        W::Error: fmt::Display,
    {
        let channel = self
            .runtime
            .open_shell(container_id, &self.shell, &self.user)
            .await?;
        info!("Terminal session opened for {}", container_id);

        let end = relay(client_rx, client_tx, channel).await;
        info!("Terminal session for {} ended: {:?}", container_id, end);
        Ok(end)
    }
}

/// Relay bytes between a client and a shell channel.
///
/// Returns as soon as either direction finishes. The client sink is closed
/// and the shell input shut down afterwards whichever side ended first.
pub async fn relay<R, W>(mut client_rx: R, mut client_tx: W, channel: ShellChannel) -> RelayEnd
where
    R: Stream<Item = Vec<u8>> + Unpin,
    W: Sink<String> + Unpin,
    W::Error: fmt::Display,
{
    let ShellChannel {
        mut output,
        mut input,
    } = channel;

    let end = {
        let to_client = forward_to_client(&mut output, &mut client_tx);
        let to_container = forward_to_container(&mut client_rx, &mut input);

        tokio::select! {
            end = to_client => end,
            end = to_container => end,
        }
    };

    if let Err(e) = client_tx.close().await {
        debug!("Closing client connection failed: {}", e);
    }
    if let Err(e) = input.shutdown().await {
        debug!("Closing shell input failed: {}", e);
    }
    drop(output);

    end
}

async fn forward_to_client<W>(
    output: &mut BoxStream<'static, Result<Bytes>>,
    client_tx: &mut W,
) -> RelayEnd
where
    W: Sink<String> + Unpin,
    W::Error: fmt::Display,
{
    let mut decoder = LossyUtf8Decoder::default();

    while let Some(chunk) = output.next().await {
        match chunk {
            Ok(bytes) => {
                trace!("shell->client: {} bytes", bytes.len());
                let text = decoder.decode(&bytes);
                if text.is_empty() {
                    continue;
                }
                if let Err(e) = client_tx.send(text).await {
                    return RelayEnd::ClientError(e.to_string());
                }
            }
            Err(e) => return RelayEnd::ContainerError(e.to_string()),
        }
    }

    debug!("Shell output ended");
    RelayEnd::ContainerClosed
}

async fn forward_to_container<R>(
    client_rx: &mut R,
    input: &mut Pin<Box<dyn AsyncWrite + Send>>,
) -> RelayEnd
where
    R: Stream<Item = Vec<u8>> + Unpin,
{
    while let Some(data) = client_rx.next().await {
        if data.is_empty() {
            continue;
        }
        trace!("client->shell: {} bytes", data.len());
        if let Err(e) = input.write_all(&data).await {
            return RelayEnd::ContainerError(e.to_string());
        }
        if let Err(e) = input.flush().await {
            return RelayEnd::ContainerError(e.to_string());
        }
    }

    debug!("Client input ended");
    RelayEnd::ClientClosed
}

/// Incremental UTF-8 decoder that drops invalid sequences.
///
/// A multi-byte character split across chunks is held back until the rest
/// arrives.
#[derive(Debug, Default)]
pub struct LossyUtf8Decoder {
    pending: Vec<u8>,
}

impl LossyUtf8Decoder {
    /// Decode the next chunk.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    out.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    let prefix = &self.pending[consumed..consumed + valid];
                    if let Ok(text) = std::str::from_utf8(prefix) {
                        out.push_str(text);
                    }
                    match e.error_len() {
                        Some(invalid) => consumed += valid + invalid,
                        None => {
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        out
    }
}
