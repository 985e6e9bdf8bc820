//! Room Registry
//!
//! Process-wide mapping from room id to room state. Creates rooms on
//! demand and removes them once empty. Guarded by its own lock, separate
//! from any individual room's lock — the two are never held together
//! except in the reconciler's controlled room-deletion step.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::room::Room;

/// Read-only snapshot of process-wide counters, for the stats surface.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RegistryStats {
    pub total_rooms: u64,
    pub total_peers: u64,
}

pub struct Registry {
    rooms: DashMap<String, Arc<Room>>,
    total_rooms: AtomicUsize,
    total_peers: AtomicUsize,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            total_rooms: AtomicUsize::new(0),
            total_peers: AtomicUsize::new(0),
        }
    }

    /// Look up `room_id`, creating it if absent. Returns the room and
    /// whether this call created it.
    pub fn get_or_create(&self, room_id: &str) -> (Arc<Room>, bool) {
        if let Some(room) = self.rooms.get(room_id) {
            return (room.clone(), false);
        }

        let candidate = Arc::new(Room::new(room_id.to_string()));
        let room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| candidate.clone())
            .clone();

        let created = Arc::ptr_eq(&room, &candidate);
        if created {
            self.total_rooms.fetch_add(1, Ordering::SeqCst);
            debug!(room_id, "created room");
        }

        (room, created)
    }

    /// Remove `room_id` if present, decrementing `total_rooms`.
    pub fn remove_if_present(&self, room_id: &str) {
        if self.rooms.remove(room_id).is_some() {
            self.total_rooms.fetch_sub(1, Ordering::SeqCst);
            debug!(room_id, "removed empty room");
        }
    }

    /// Shallow copy of the current rooms, safe to iterate without
    /// holding the registry lock.
    pub fn snapshot(&self) -> Vec<Arc<Room>> {
        self.rooms.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn increment_peers(&self) {
        self.total_peers.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement_peers(&self) {
        self.total_peers.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_rooms: self.total_rooms.load(Ordering::SeqCst) as u64,
            total_peers: self.total_peers.load(Ordering::SeqCst) as u64,
        }
    }

    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_creates_once() {
        let registry = Registry::new();
        let (room_a, created_a) = registry.get_or_create("room-1");
        let (room_b, created_b) = registry.get_or_create("room-1");

        assert!(created_a);
        assert!(!created_b);
        assert!(Arc::ptr_eq(&room_a, &room_b));
        assert_eq!(registry.stats().total_rooms, 1);
    }

    #[test]
    fn remove_if_present_decrements_once() {
        let registry = Registry::new();
        registry.get_or_create("room-1");
        registry.remove_if_present("room-1");
        registry.remove_if_present("room-1");

        assert_eq!(registry.stats().total_rooms, 0);
    }

    #[test]
    fn snapshot_and_room_ids_reflect_membership() {
        let registry = Registry::new();
        registry.get_or_create("room-1");
        registry.get_or_create("room-2");

        assert_eq!(registry.snapshot().len(), 2);
        let mut ids = registry.room_ids();
        ids.sort();
        assert_eq!(ids, vec!["room-1".to_string(), "room-2".to_string()]);
    }

    #[test]
    fn peer_counters_track_increments_and_decrements() {
        let registry = Registry::new();
        registry.increment_peers();
        registry.increment_peers();
        registry.decrement_peers();

        assert_eq!(registry.stats().total_peers, 1);
    }
}
