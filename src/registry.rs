//! Connection registry
//!
//! Holds one entry per open client connection, from accept until the
//! connection leaves or drops. Ids are handed out in accept order.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use tokio::sync::mpsc;

use crate::command::Reply;
use crate::error::{RegistryError, SendError};
use crate::types::ConnectionId;

/// Connected client information
///
/// The reply sender is the connection's handle: dropping it closes the
/// connection's write side, which ends its task.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Remote address
    pub peer_addr: SocketAddr,
    /// Display name (None before CONNECT/HELO)
    pub name: Option<String>,
    /// Server → Client reply channel
    pub sender: mpsc::UnboundedSender<Reply>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        sender: mpsc::UnboundedSender<Reply>,
    ) -> Self {
        Self {
            id,
            peer_addr,
            name: None,
            sender,
        }
    }

    /// Queue a reply for this connection
    ///
    /// Never blocks. Returns an error if the channel is closed
    /// (connection task gone).
    pub fn send(&self, reply: Reply) -> Result<(), SendError> {
        self.sender
            .send(reply)
            .map_err(|_| SendError::ChannelClosed)
    }
}

/// Snapshot of one registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub name: Option<String>,
}

impl ConnectionInfo {
    /// Listing entry: `<id>,<ip>,<port>`
    pub fn listing_entry(&self) -> String {
        format!("{},{},{}", self.id, self.peer_addr.ip(), self.peer_addr.port())
    }
}

/// All open connections, keyed and ordered by id
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<ConnectionId, Connection>,
    next_id: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new connection with no display name
    pub fn register(
        &mut self,
        peer_addr: SocketAddr,
        sender: mpsc::UnboundedSender<Reply>,
    ) -> ConnectionId {
        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        self.connections
            .insert(id, Connection::new(id, peer_addr, sender));
        id
    }

    pub fn set_name(&mut self, id: ConnectionId, name: String) -> Result<(), RegistryError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(RegistryError::UnknownConnection(id))?;
        conn.name = Some(name);
        Ok(())
    }

    /// Remove a connection
    ///
    /// Absent ids are ignored: a LEAVE and the disconnect that follows it
    /// both end up here.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Iterate connections in accept order
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Snapshot of every connection in accept order
    pub fn list_all(&self) -> Vec<ConnectionInfo> {
        self.iter()
            .map(|c| ConnectionInfo {
                id: c.id,
                peer_addr: c.peer_addr,
                name: c.name.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
