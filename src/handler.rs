//! Per-connection handler
//!
//! Registers the connection with the RelayServer, turns the byte stream into
//! frames, forwards them in order and writes replies back.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;
use tracing::{debug, error, info};

use crate::codec::FrameCodec;
use crate::config::{ServerConfig, DEFAULT_MAX_FRAME_LEN, DEFAULT_READ_BUFFER_SIZE};
use crate::error::AppError;
use crate::server::ServerCommand;

/// Read-side limits for one connection
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Bytes buffered for one frame before it is discarded
    pub max_frame_len: usize,
    /// Initial read buffer capacity; the buffer grows while a frame is
    /// incomplete, up to `max_frame_len`
    pub read_buffer_size: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_frame_len: config.max_frame_len,
            read_buffer_size: config.read_buffer_size,
        }
    }
}

/// Handle one accepted connection until either side closes it
///
/// Generic over the stream so tests can drive it with in-memory pipes.
/// End of stream and read errors both count as the peer going away; the
/// server dropping our reply channel (LEAVE) closes the stream from our side.
pub async fn handle_connection<S>(
    stream: S,
    peer_addr: SocketAddr,
    cmd_tx: mpsc::Sender<ServerCommand>,
    settings: ConnectionSettings,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Create channel for server -> client replies
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    let (id_tx, id_rx) = oneshot::channel();

    // Register with RelayServer
    if cmd_tx
        .send(ServerCommand::Connect {
            peer_addr,
            sender: reply_tx,
            respond_to: id_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register {} - server closed", peer_addr);
        return Err(AppError::ChannelSend);
    }
    let id = id_rx.await.map_err(|_| AppError::ChannelSend)?;
    info!("Connection {} registered from {}", id, peer_addr);

    let framed = Framed::with_capacity(
        stream,
        FrameCodec::new(settings.max_frame_len),
        settings.read_buffer_size,
    );
    let (mut sink, mut frames) = framed.split();

    let result = loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(Ok(frame)) => {
                    if cmd_tx.send(ServerCommand::Frame { id, frame }).await.is_err() {
                        debug!("Server closed, ending connection {}", id);
                        break Err(AppError::ChannelSend);
                    }
                }
                Some(Err(e)) => {
                    debug!("Read error on connection {}: {}", id, e);
                    break Ok(());
                }
                None => {
                    debug!("Connection {} closed by peer", id);
                    break Ok(());
                }
            },
            reply = reply_rx.recv() => match reply {
                Some(reply) => {
                    if let Err(e) = sink.send(reply).await {
                        debug!("Write error on connection {}: {}", id, e);
                        break Ok(());
                    }
                }
                None => {
                    debug!("Connection {} released by server", id);
                    break Ok(());
                }
            },
        }
    };

    // Always unregister; a no-op after LEAVE
    let _ = cmd_tx.send(ServerCommand::Disconnect { id }).await;
    info!("Connection {} disconnected", id);

    result
}
