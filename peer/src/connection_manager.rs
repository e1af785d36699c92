//! Registry of open peer connections
//!
//! This module keeps track of every live TCP link a node holds, including:
//! - Connection lifecycle (register on accept or dial, remove on close)
//! - Id allocation so stale events from a closed link can be told apart
//! - Addressed sends and broadcasts of encoded protocol lines
//!
//! A host uses it for all of its clients, a client for its single link to the
//! host. Admission control happens before a connection gets here, so the
//! registry itself never refuses one.

use crate::connection::Connection;
use crate::network::NetEvent;
use crate::session::ConnId;
use log::{debug, info};
use shared::Message;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, OwnedSemaphorePermit};

/// Tracks every open connection of a node
///
/// Connections are keyed by an id that is never reused during the lifetime of
/// the registry. Removing a connection drops it, which stops its tasks and
/// hands back any capacity permit it held.
pub struct ConnectionManager {
    /// Open connections indexed by id
    connections: HashMap<ConnId, Connection>,
    /// Id handed to the next registered connection
    next_id: ConnId,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// Creates an empty registry
    ///
    /// Ids start from 1 and increment for each registered connection.
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            next_id: 1,
        }
    }

    /// Starts the tasks for a freshly opened stream and tracks it
    ///
    /// Returns the id assigned to the connection. Lines read from the stream
    /// and its eventual closing are reported through `events`.
    pub fn register(
        &mut self,
        stream: TcpStream,
        addr: SocketAddr,
        permit: Option<OwnedSemaphorePermit>,
        events: mpsc::UnboundedSender<NetEvent>,
    ) -> ConnId {
        let id = self.next_id;
        self.next_id += 1;

        let connection = Connection::spawn(id, stream, addr, permit, events);
        info!("Connection {} opened with {}", id, addr);
        self.connections.insert(id, connection);
        id
    }

    /// Closes and forgets a connection
    ///
    /// Returns true if the connection was found, false if it was already gone.
    pub fn remove(&mut self, id: ConnId) -> bool {
        if let Some(connection) = self.connections.remove(&id) {
            info!(
                "Connection {} with {} closed after {:.1}s",
                id,
                connection.addr,
                connection.opened_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    /// Queues a message for one connection
    ///
    /// Returns false if there is no such connection or its writer has stopped.
    pub fn send(&self, id: ConnId, message: &Message) -> bool {
        match self.connections.get(&id) {
            Some(connection) => connection.send(message),
            None => {
                debug!("No connection {} for {}", id, message.kind());
                false
            }
        }
    }

    /// Queues a message for every connection except `exclude`
    ///
    /// The message is encoded once. Returns how many connections it was
    /// queued for.
    pub fn broadcast(&self, message: &Message, exclude: Option<ConnId>) -> usize {
        let line = message.encode();
        self.connections
            .values()
            .filter(|connection| Some(connection.id) != exclude)
            .filter(|connection| connection.send_line(line.clone()))
            .count()
    }

    /// Closes every connection
    pub fn close_all(&mut self) {
        let ids = self.ids();
        for id in ids {
            self.remove(id);
        }
    }

    pub fn contains(&self, id: ConnId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn addr(&self, id: ConnId) -> Option<SocketAddr> {
        self.connections.get(&id).map(|connection| connection.addr)
    }

    /// Ids of all open connections in ascending order
    pub fn ids(&self) -> Vec<ConnId> {
        let mut ids: Vec<ConnId> = self.connections.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the number of open connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if no connection is open
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
