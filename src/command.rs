//! Command protocol definitions
//!
//! Client units are comma-separated tokens whose first token names the
//! command. [`Command::parse`] turns a token list into a typed command and
//! enforces each command's arity; [`Reply`] is what goes back on the wire.

use std::fmt;

use crate::codec::join_fields;
use crate::error::ProtocolError;
use crate::types::GroupId;

/// Client → Server command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set display name, no reply
    Connect { name: String },
    /// Set display name and reply with the connection listing
    Helo { name: String },
    /// Close this connection
    Leave,
    /// Reply with the connection listing
    ListServers,
    /// Queue a message for a group
    SendMsg {
        to: GroupId,
        from: GroupId,
        body: String,
    },
    /// Drain a group's mailbox
    GetMsgs { group: GroupId },
    /// Count a group's pending messages
    KeepAlive { group: GroupId },
    /// Anything we don't recognise
    Unknown { name: String },
}

/// Token count a command accepts, command name included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    fn check(self, command: &'static str, actual: usize) -> Result<(), ProtocolError> {
        let ok = match self {
            Arity::Exactly(n) => actual == n,
            Arity::AtLeast(n) => actual >= n,
        };
        if ok {
            Ok(())
        } else {
            Err(ProtocolError::Arity {
                command,
                expected: self,
                actual,
            })
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

impl Command {
    /// Interpret decoded tokens
    ///
    /// SENDMSG joins every token from the fourth on with single spaces, so
    /// commas inside a body come back as spaces.
    pub fn parse(tokens: &[String]) -> Result<Self, ProtocolError> {
        let Some(name) = tokens.first() else {
            return Err(ProtocolError::Empty);
        };
        let count = tokens.len();

        let command = match name.as_str() {
            "CONNECT" => {
                Arity::Exactly(2).check("CONNECT", count)?;
                Command::Connect {
                    name: tokens[1].clone(),
                }
            }
            "HELO" => {
                Arity::Exactly(2).check("HELO", count)?;
                Command::Helo {
                    name: tokens[1].clone(),
                }
            }
            "LEAVE" => {
                Arity::AtLeast(1).check("LEAVE", count)?;
                Command::Leave
            }
            "LISTSERVERS" => {
                Arity::AtLeast(1).check("LISTSERVERS", count)?;
                Command::ListServers
            }
            "SENDMSG" => {
                Arity::AtLeast(4).check("SENDMSG", count)?;
                Command::SendMsg {
                    to: GroupId::from(tokens[1].as_str()),
                    from: GroupId::from(tokens[2].as_str()),
                    body: tokens[3..].join(" "),
                }
            }
            "GETMSGS" => {
                Arity::Exactly(2).check("GETMSGS", count)?;
                Command::GetMsgs {
                    group: GroupId::from(tokens[1].as_str()),
                }
            }
            "KEEPALIVE" => {
                Arity::Exactly(2).check("KEEPALIVE", count)?;
                Command::KeepAlive {
                    group: GroupId::from(tokens[1].as_str()),
                }
            }
            other => Command::Unknown {
                name: other.to_string(),
            },
        };
        Ok(command)
    }

    /// Wire name of the command, for logging
    pub fn name(&self) -> &str {
        match self {
            Command::Connect { .. } => "CONNECT",
            Command::Helo { .. } => "HELO",
            Command::Leave => "LEAVE",
            Command::ListServers => "LISTSERVERS",
            Command::SendMsg { .. } => "SENDMSG",
            Command::GetMsgs { .. } => "GETMSGS",
            Command::KeepAlive { .. } => "KEEPALIVE",
            Command::Unknown { name } => name,
        }
    }
}

/// Server → Client unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Payload sent between SOH and EOT
    Frame(String),
    /// Bytes sent as-is, no sentinels
    Raw(String),
}

impl Reply {
    /// Framed reply from a command name and arguments
    pub fn command<S: AsRef<str>>(command: &str, args: &[S]) -> Self {
        Reply::Frame(join_fields(command, args))
    }

    /// Text the reply carries, without sentinels
    pub fn text(&self) -> &str {
        match self {
            Reply::Frame(payload) | Reply::Raw(payload) => payload,
        }
    }
}
