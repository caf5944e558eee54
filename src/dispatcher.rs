//! Command dispatcher
//!
//! Executes one decoded unit against the mailbox store and the connection
//! registry and returns the replies for the connection that sent it.
//! Dispatch is synchronous; the caller decides how replies reach the wire.

use tracing::{debug, info, warn};

use crate::command::{Command, Reply};
use crate::config::{ServerConfig, DEFAULT_MAX_MESSAGE_SIZE};
use crate::mailbox::MailboxStore;
use crate::registry::{ConnectionInfo, ConnectionRegistry};
use crate::types::{ConnectionId, GroupId};

/// Settings that change dispatch behaviour
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Limit on the unframed `SENDMSG,<to>,<from>,<body>` length
    pub max_message_size: usize,
    /// Prefix for the caller's own entry in a HELO listing
    pub server_tag: String,
    /// Oversize errors go out as plain text instead of a frame
    pub legacy_unframed_errors: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            server_tag: "A5".to_string(),
            legacy_unframed_errors: false,
        }
    }
}

impl From<&ServerConfig> for DispatchOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_message_size: config.max_message_size,
            server_tag: config.server_tag.clone(),
            legacy_unframed_errors: config.legacy_unframed_errors,
        }
    }
}

/// Owns all relay state and applies commands to it
#[derive(Debug, Default)]
pub struct Dispatcher {
    mailboxes: MailboxStore,
    registry: ConnectionRegistry,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(options: DispatchOptions) -> Self {
        Self {
            mailboxes: MailboxStore::new(),
            registry: ConnectionRegistry::new(),
            options,
        }
    }

    pub fn mailboxes(&self) -> &MailboxStore {
        &self.mailboxes
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ConnectionRegistry {
        &mut self.registry
    }

    /// Parse and execute one unit from `id`
    ///
    /// Malformed units produce no replies and leave all state untouched.
    pub fn dispatch(&mut self, id: ConnectionId, tokens: &[String]) -> Vec<Reply> {
        info!("Connection {}: {}", id, tokens.join(","));

        match Command::parse(tokens) {
            Ok(command) => self.execute(id, command),
            Err(e) => {
                warn!("Dropping frame from connection {}: {}", id, e);
                Vec::new()
            }
        }
    }

    /// Execute an already parsed command
    pub fn execute(&mut self, id: ConnectionId, command: Command) -> Vec<Reply> {
        debug!("Executing {} for connection {}", command.name(), id);

        match command {
            Command::Connect { name } => {
                self.set_name(id, name);
                Vec::new()
            }
            Command::Helo { name } => {
                if !self.set_name(id, name) {
                    return Vec::new();
                }
                self.helo_listing(id).into_iter().collect()
            }
            Command::Leave => {
                if self.registry.unregister(id).is_some() {
                    info!("Connection {} left", id);
                }
                Vec::new()
            }
            Command::ListServers => vec![self.listing()],
            Command::SendMsg { to, from, body } => self.send_msg(to, from, body),
            Command::GetMsgs { group } => self
                .mailboxes
                .drain_all(&group)
                .iter()
                .map(|msg| Reply::Frame(msg.render()))
                .collect(),
            Command::KeepAlive { group } => {
                let count = self.mailboxes.count(&group);
                vec![Reply::command("KEEPALIVE", &[count.to_string()])]
            }
            Command::Unknown { name } => {
                warn!("Unknown command from connection {}: {}", id, name);
                Vec::new()
            }
        }
    }

    fn set_name(&mut self, id: ConnectionId, name: String) -> bool {
        match self.registry.set_name(id, name) {
            Ok(()) => true,
            Err(e) => {
                warn!("Ignoring name change: {}", e);
                false
            }
        }
    }

    fn send_msg(&mut self, to: GroupId, from: GroupId, body: String) -> Vec<Reply> {
        let encoded_len = format!("SENDMSG,{},{},{}", to, from, body).len();
        let limit = self.options.max_message_size;

        if encoded_len > limit {
            warn!(
                "SENDMSG to {} is {} bytes, over the {}-byte limit",
                to, encoded_len, limit
            );
            return vec![self.oversized_reply()];
        }

        debug!("Stored message for group {}: {}", to, body);
        self.mailboxes.enqueue(to, from, body);
        Vec::new()
    }

    /// Reply to a SENDMSG over the size limit, framed or legacy plain text
    ///
    /// Also sent for SENDMSG units the codec cut off at its frame ceiling.
    pub fn oversized_reply(&self) -> Reply {
        let limit = self.options.max_message_size;
        if self.options.legacy_unframed_errors {
            Reply::Raw(format!("Error: Message exceeds the {}-byte limit.", limit))
        } else {
            Reply::command("ERROR", &[format!("Message exceeds the {}-byte limit", limit)])
        }
    }

    /// `SERVERS,<tag> <self>;<other>;...`
    fn helo_listing(&self, id: ConnectionId) -> Option<Reply> {
        let snapshot = self.registry.list_all();
        let Some(me) = snapshot.iter().find(|c| c.id == id) else {
            warn!("Connection {} not found for HELO listing", id);
            return None;
        };

        let mut entries = vec![format!("{} {}", self.options.server_tag, me.listing_entry())];
        entries.extend(
            snapshot
                .iter()
                .filter(|c| c.id != id)
                .map(ConnectionInfo::listing_entry),
        );
        Some(Reply::Frame(format!("SERVERS,{}", entries.join(";"))))
    }

    /// `SERVERS,<conn>;<conn>;...` in accept order
    fn listing(&self) -> Reply {
        let entries: Vec<String> = self
            .registry
            .list_all()
            .iter()
            .map(ConnectionInfo::listing_entry)
            .collect();
        Reply::Frame(format!("SERVERS,{}", entries.join(";")))
    }
}
