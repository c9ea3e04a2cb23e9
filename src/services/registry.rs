//! Connection registry — who is connected and what they call themselves.
//!
//! DESIGN
//! ======
//! One map from connection id to an outbound queue and an optional display
//! name, behind a single `RwLock`. Membership changes (register, rename,
//! unregister) take the write lock and broadcast the resulting roster or
//! count *before* releasing it, so every client observes membership
//! notifications in the same order the mutations happened.
//!
//! Relay traffic (draw/cursor/clear) only takes the read lock. Fan-out is
//! best-effort: a peer whose queue is full or closed misses that one event.
//!
//! A rename that races a disconnect finds the entry gone and fails with
//! `RegistryError::NotConnected`; it never re-creates the entry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::event::Outbound;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection not registered: {0}")]
    NotConnected(Uuid),
}

/// Registry entry for one open socket.
struct Connection {
    name: Option<String>,
    tx: mpsc::Sender<Outbound>,
}

/// Shared handle to the registry. Cloning shares the same map.
#[derive(Clone, Default)]
pub struct Registry {
    connections: Arc<RwLock<HashMap<Uuid, Connection>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unnamed connection and announce the new connection count to
    /// everyone, the newcomer included. Returns the count.
    pub async fn register(&self, client_id: Uuid, tx: mpsc::Sender<Outbound>) -> usize {
        let mut connections = self.connections.write().await;
        connections.insert(client_id, Connection { name: None, tx });
        let count = connections.len();
        fan_out(&connections, &Outbound::UserCount(count), None);
        count
    }

    /// Record or overwrite a connection's display name, then broadcast the
    /// roster to every connection.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotConnected` if the connection has already
    /// been unregistered.
    pub async fn set_name(&self, client_id: Uuid, name: impl Into<String>) -> Result<(), RegistryError> {
        let mut connections = self.connections.write().await;
        let Some(conn) = connections.get_mut(&client_id) else {
            return Err(RegistryError::NotConnected(client_id));
        };
        let name = name.into();
        let previous = conn.name.replace(name.clone());
        info!(%client_id, %name, previous = ?previous, "registry: name set");

        let roster = roster_of(&connections);
        fan_out(&connections, &Outbound::UserList(roster), None);
        Ok(())
    }

    /// Remove a connection and broadcast the updated roster and count to the
    /// remaining connections. Returns `false` if it was not registered.
    pub async fn unregister(&self, client_id: Uuid) -> bool {
        let mut connections = self.connections.write().await;
        let Some(removed) = connections.remove(&client_id) else {
            return false;
        };
        info!(%client_id, name = ?removed.name, remaining = connections.len(), "registry: connection removed");

        let roster = roster_of(&connections);
        fan_out(&connections, &Outbound::UserList(roster), None);
        fan_out(&connections, &Outbound::UserCount(connections.len()), None);
        true
    }

    /// Current `(id, name)` pairs for named connections. Unordered.
    pub async fn snapshot(&self) -> Vec<(Uuid, String)> {
        roster_of(&*self.connections.read().await)
    }

    /// Display name of a connection, if it has set one.
    pub async fn name_of(&self, client_id: Uuid) -> Option<String> {
        self.connections
            .read()
            .await
            .get(&client_id)
            .and_then(|conn| conn.name.clone())
    }

    /// `(open connections, named connections)`.
    pub async fn counts(&self) -> (usize, usize) {
        let connections = self.connections.read().await;
        let named = connections.values().filter(|c| c.name.is_some()).count();
        (connections.len(), named)
    }

    /// Send an event to every connection, optionally skipping one.
    /// Returns how many queues accepted it.
    pub async fn broadcast(&self, event: &Outbound, exclude: Option<Uuid>) -> usize {
        fan_out(&*self.connections.read().await, event, exclude)
    }
}

fn roster_of(connections: &HashMap<Uuid, Connection>) -> Vec<(Uuid, String)> {
    connections
        .iter()
        .filter_map(|(id, conn)| conn.name.clone().map(|name| (*id, name)))
        .collect()
}

fn fan_out(connections: &HashMap<Uuid, Connection>, event: &Outbound, exclude: Option<Uuid>) -> usize {
    let mut delivered = 0;
    for (client_id, conn) in connections {
        if exclude == Some(*client_id) {
            continue;
        }
        match conn.tx.try_send(event.clone()) {
            Ok(()) => delivered += 1,
            Err(TrySendError::Full(_)) => {
                warn!(%client_id, event = event.name(), "registry: outbound queue full; dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%client_id, event = event.name(), "registry: outbound queue closed");
            }
        }
    }
    delivered
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
