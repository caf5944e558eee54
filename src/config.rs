//! Command line configuration for the server and client binaries.

use clap::Parser;

/// Largest `SENDMSG,<to>,<from>,<body>` payload accepted for storage
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 5000;

/// Largest unit the codec buffers while waiting for EOT
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024;

/// Initial read buffer capacity per connection
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1025;

/// Relay server configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "group_relay", about = "In-memory group mailbox relay")]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,

    /// Address to bind on.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Maximum size in bytes of an unframed SENDMSG command.
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,

    /// Maximum bytes buffered for one frame before it is discarded.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    pub max_frame_len: usize,

    /// Initial per-connection read buffer capacity in bytes (grows up to --max-frame-len).
    #[arg(long, default_value_t = DEFAULT_READ_BUFFER_SIZE)]
    pub read_buffer_size: usize,

    /// Tag placed in front of this server's own entry in a HELO listing.
    #[arg(long, default_value = "A5")]
    pub server_tag: String,

    /// Reply to oversized SENDMSG with plain text instead of a frame.
    #[arg(long)]
    pub legacy_unframed_errors: bool,

    /// Capacity of the command channel into the server actor.
    #[arg(long, default_value_t = 256)]
    pub command_buffer: usize,
}

impl ServerConfig {
    /// Configuration with every default and the given port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            host: "0.0.0.0".to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            server_tag: "A5".to_string(),
            legacy_unframed_errors: false,
            command_buffer: 256,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Terminal client configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "relay_client", about = "Line-based client for group_relay")]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,

    /// Server port.
    pub port: u16,
}

impl ClientConfig {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
