//! Group Mailbox Relay Server Library
//!
//! A small TCP relay: clients connect, name themselves, post short text
//! messages addressed to a group, and poll for messages addressed to their
//! own group. Messages live in memory until someone retrieves them.
//!
//! # Wire format
//! Every unit in both directions is `SOH <token> (',' <token>)* EOT`
//! (SOH = 0x01, EOT = 0x04). Commands: `CONNECT`, `HELO`, `LEAVE`,
//! `LISTSERVERS`, `SENDMSG`, `GETMSGS`, `KEEPALIVE`.
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RelayServer` is the central actor owning the mailboxes and the registry
//! - Each connection has a `handler` task that frames bytes and forwards them
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use group_relay::{serve, ServerConfig};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:4000").await.unwrap();
//!     serve(listener, ServerConfig::with_port(4000)).await.unwrap();
//! }
//! ```

pub mod codec;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod mailbox;
pub mod registry;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use codec::{FrameCodec, EOT, SOH};
pub use command::{Command, Reply};
pub use config::{ClientConfig, ServerConfig};
pub use dispatcher::{DispatchOptions, Dispatcher};
pub use error::{AppError, FrameError, ProtocolError, RegistryError, SendError};
pub use handler::{handle_connection, ConnectionSettings};
pub use mailbox::{MailboxStore, PendingMessage};
pub use registry::{Connection, ConnectionInfo, ConnectionRegistry};
pub use server::{run, serve, RelayServer, ServerCommand};
pub use types::{ConnectionId, GroupId};
