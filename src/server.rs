//! RelayServer Actor implementation
//!
//! The central actor that owns the mailbox store and the connection registry.
//! Connection handlers talk to it over an mpsc channel, so exactly one command
//! is ever being dispatched and no state needs a lock.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::command::Reply;
use crate::config::ServerConfig;
use crate::dispatcher::{DispatchOptions, Dispatcher};
use crate::error::{AppError, ProtocolError};
use crate::handler::{handle_connection, ConnectionSettings};
use crate::types::ConnectionId;

/// Commands sent from handlers to the RelayServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection accepted; the assigned id goes back on `respond_to`
    Connect {
        peer_addr: SocketAddr,
        sender: mpsc::UnboundedSender<Reply>,
        respond_to: oneshot::Sender<ConnectionId>,
    },
    /// One unit read from a connection, well-formed or not
    Frame {
        id: ConnectionId,
        frame: Result<Vec<String>, ProtocolError>,
    },
    /// Connection closed by the peer, by an error, or after LEAVE
    Disconnect { id: ConnectionId },
}

/// The main RelayServer actor
pub struct RelayServer {
    dispatcher: Dispatcher,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl RelayServer {
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, options: DispatchOptions) -> Self {
        Self {
            dispatcher: Dispatcher::new(options),
            receiver,
        }
    }

    /// Run the RelayServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("RelayServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("RelayServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect {
                peer_addr,
                sender,
                respond_to,
            } => {
                let id = self.dispatcher.registry_mut().register(peer_addr, sender);
                if respond_to.send(id).is_err() {
                    // handler went away before learning its id
                    self.dispatcher.registry_mut().unregister(id);
                    return;
                }
                debug!(
                    "Total connections: {}, groups with mail: {}",
                    self.dispatcher.registry().len(),
                    self.dispatcher.mailboxes().group_count()
                );
            }
            ServerCommand::Frame { id, frame } => match frame {
                Ok(tokens) => {
                    let replies = self.dispatcher.dispatch(id, &tokens);
                    self.deliver(id, replies);
                }
                Err(ProtocolError::OversizedMessage { limit }) => {
                    warn!(
                        "SENDMSG from connection {} cut off at the {}-byte frame limit",
                        id, limit
                    );
                    let reply = self.dispatcher.oversized_reply();
                    self.deliver(id, vec![reply]);
                }
                Err(e) => warn!("Dropping malformed frame from connection {}: {}", id, e),
            },
            ServerCommand::Disconnect { id } => {
                if self.dispatcher.registry_mut().unregister(id).is_some() {
                    info!("Connection {} removed", id);
                }
                debug!(
                    "Total connections: {}, pending messages: {}",
                    self.dispatcher.registry().len(),
                    self.dispatcher.mailboxes().total_pending()
                );
            }
        }
    }

    /// Queue replies on the connection that asked for them
    fn deliver(&self, id: ConnectionId, replies: Vec<Reply>) {
        // After LEAVE the connection is gone and there is nothing to send
        let Some(conn) = self.dispatcher.registry().get(id) else {
            return;
        };
        for reply in replies {
            if conn.send(reply).is_err() {
                debug!("Connection {} stopped reading replies", id);
                break;
            }
        }
    }
}

/// Accept connections on `listener` until accepting fails
///
/// Spawns the RelayServer actor and one handler task per connection. An
/// accept error ends the loop and is returned to the caller.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> Result<(), AppError> {
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    tokio::spawn(RelayServer::new(cmd_rx, DispatchOptions::from(&config)).run());

    let settings = ConnectionSettings::from(&config);

    loop {
        let (stream, addr) = listener.accept().await.map_err(AppError::Accept)?;
        info!("New connection from {}", addr);
        let cmd_tx = cmd_tx.clone();

        // Spawn handler task for each connection
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, cmd_tx, settings).await {
                error!("Connection handler error: {}", e);
            }
        });
    }
}

/// Bind the configured address and serve on it
pub async fn run(config: ServerConfig) -> Result<(), AppError> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| AppError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!("Relay server listening on {}", addr);

    serve(listener, config).await
}
