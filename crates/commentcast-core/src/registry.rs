//! Room membership bookkeeping.
//!
//! The registry maps each room key to the connections currently subscribed to
//! it. Mutation is reserved to the hub's control loop; reads (stats, counts)
//! can happen from any thread without going through the loop.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::debug;

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::room::RoomKey;

/// Concurrency-safe room membership map.
///
/// A room present in the map always has at least one member.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomKey, HashMap<ConnectionId, ConnectionHandle>>,
}

impl RoomRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to its room, creating the room if absent.
    ///
    /// Returns `false` if the connection was already a member.
    pub fn add(&self, handle: ConnectionHandle) -> bool {
        let room = handle.room().to_string();
        let id = handle.id();
        let mut members = self.rooms.entry(room).or_insert_with(|| {
            debug!(room = %handle.room(), "Creating room");
            HashMap::new()
        });

        if members.contains_key(&id) {
            return false;
        }
        members.insert(id, handle);
        true
    }

    /// Remove a connection from a room.
    ///
    /// Deletes the room in the same step if it becomes empty. Returns the
    /// removed handle; `None` if the room or connection was not present.
    pub fn remove(&self, room: &str, id: ConnectionId) -> Option<ConnectionHandle> {
        match self.rooms.entry(room.to_string()) {
            Entry::Occupied(mut entry) => {
                let removed = entry.get_mut().remove(&id);
                if entry.get().is_empty() {
                    entry.remove();
                    debug!(room = %room, "Deleted empty room");
                }
                removed
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Copy of the current members of a room.
    ///
    /// No lock is held once this returns, so callers may deliver to members
    /// freely while the registry changes underneath.
    #[must_use]
    pub fn snapshot(&self, room: &str) -> Vec<ConnectionHandle> {
        self.rooms
            .get(room)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a room currently exists.
    #[must_use]
    pub fn contains_room(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    /// Whether a connection is a member of a room.
    #[must_use]
    pub fn is_member(&self, room: &str, id: ConnectionId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains_key(&id))
    }

    /// Number of members in a room.
    #[must_use]
    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    /// All room keys.
    #[must_use]
    pub fn room_keys(&self) -> Vec<RoomKey> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }

    /// Remove every room and return the handles that were registered.
    pub fn drain(&self) -> Vec<ConnectionHandle> {
        let keys = self.room_keys();
        keys.iter()
            .filter_map(|key| self.rooms.remove(key))
            .flat_map(|(_, members)| members.into_values())
            .collect()
    }

    /// Registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            room_count: self.rooms.len(),
            connection_count: self.rooms.iter().map(|m| m.len()).sum(),
        }
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RegistryStats {
    /// Number of rooms with at least one member.
    pub room_count: usize,
    /// Number of registered connections.
    pub connection_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;

    #[test]
    fn test_add_remove_deletes_empty_room() {
        let registry = RoomRegistry::new();
        let (handle, _mailbox) = Connection::open("post-42", "u1", 4);
        let id = handle.id();

        assert!(registry.add(handle));
        assert!(registry.contains_room("post-42"));
        assert!(registry.is_member("post-42", id));
        assert_eq!(registry.member_count("post-42"), 1);

        assert!(registry.remove("post-42", id).is_some());
        assert!(!registry.contains_room("post-42"));
        assert_eq!(registry.stats().room_count, 0);
    }

    #[test]
    fn test_add_is_idempotent() {
        let registry = RoomRegistry::new();
        let (handle, _mailbox) = Connection::open("post-42", "u1", 4);

        assert!(registry.add(handle.clone()));
        assert!(!registry.add(handle));
        assert_eq!(registry.member_count("post-42"), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = RoomRegistry::new();
        let (a, _ma) = Connection::open("post-1", "u1", 4);
        let (b, _mb) = Connection::open("post-1", "u2", 4);
        let b_id = b.id();
        registry.add(a);

        assert!(registry.remove("post-404", b_id).is_none());
        assert!(registry.remove("post-1", b_id).is_none());
        assert_eq!(registry.member_count("post-1"), 1);
        assert!(!registry.contains_room("post-404"));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = RoomRegistry::new();
        let (a, _ma) = Connection::open("post-1", "u1", 4);
        let (b, _mb) = Connection::open("post-1", "u2", 4);
        let a_id = a.id();
        registry.add(a);
        registry.add(b);

        let snapshot = registry.snapshot("post-1");
        registry.remove("post-1", a_id);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.member_count("post-1"), 1);
        assert!(registry.snapshot("post-2").is_empty());
    }

    #[test]
    fn test_stats_and_drain() {
        let registry = RoomRegistry::new();
        let (a, _ma) = Connection::open("post-1", "u1", 4);
        let (b, _mb) = Connection::open("post-1", "u2", 4);
        let (c, _mc) = Connection::open("post-2", "u1", 4);
        registry.add(a);
        registry.add(b);
        registry.add(c);

        assert_eq!(
            registry.stats(),
            RegistryStats {
                room_count: 2,
                connection_count: 3
            }
        );

        let mut rooms = registry.room_keys();
        rooms.sort();
        assert_eq!(rooms, vec!["post-1".to_string(), "post-2".to_string()]);

        assert_eq!(registry.drain().len(), 3);
        assert_eq!(registry.stats().connection_count, 0);
    }
}
