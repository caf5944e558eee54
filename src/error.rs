//! Error types for the relay server
//!
//! Process-level failures, frame validation failures and registry misses.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::command::Arity;
use crate::types::ConnectionId;

/// Application-level errors
///
/// Everything here is fatal for whatever owns it: a connection task ends on
/// `ChannelSend`, the whole process ends on `Bind`/`Accept`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Could not bind the listening socket
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The listener stopped accepting connections
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,
}

/// Why a unit of client input was rejected
///
/// A frame that fails with any of these is dropped and the connection stays
/// open. Only `OversizedMessage` earns the sender a reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// First byte is not SOH
    #[error("frame does not start with SOH")]
    MissingStart,

    /// Last byte is not EOT
    #[error("frame does not end with EOT")]
    MissingEnd,

    /// Payload is not valid UTF-8
    #[error("frame payload is not valid UTF-8")]
    InvalidUtf8,

    /// No EOT within the frame length ceiling
    #[error("frame exceeds {limit} bytes without EOT")]
    Oversized { limit: usize },

    /// A SENDMSG unit longer than the frame length ceiling
    #[error("SENDMSG frame exceeds {limit} bytes")]
    OversizedMessage { limit: usize },

    /// Frame carried no tokens at all
    #[error("empty frame")]
    Empty,

    /// Token count violates the command's arity
    #[error("wrong number of tokens for {command}: expected {expected}, got {actual}")]
    Arity {
        command: &'static str,
        expected: Arity,
        actual: usize,
    },
}

/// Result of trying to decode a single raw frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Not enough bytes yet for both sentinels
    #[error("incomplete frame")]
    NeedsMoreData,

    #[error("malformed frame: {0}")]
    Malformed(#[from] ProtocolError),
}

/// Error type of the tokio-util codec
///
/// Only transport failures end the stream; malformed frames are items.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The id was never registered or is already gone
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),
}

/// Message send errors
///
/// Occurs when attempting to send replies through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_message() {
        let err = ProtocolError::Arity {
            command: "SENDMSG",
            expected: Arity::AtLeast(4),
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "wrong number of tokens for SENDMSG: expected at least 4, got 2"
        );
    }

    #[test]
    fn test_frame_error_from_protocol_error() {
        let err: FrameError = ProtocolError::MissingStart.into();
        assert_eq!(err, FrameError::Malformed(ProtocolError::MissingStart));
    }
}
