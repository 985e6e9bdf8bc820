//! Room/Peer Coordinator
//!
//! The server-side SFU core: room registry, per-room track fan-out
//! state, the signaling reconciler that drives renegotiation, and the
//! periodic keyframe dispatcher. See [`reconcile::reconcile`] for the
//! central algorithm.

mod error;
mod keyframe;
mod media;
mod peer;
mod reconcile;
mod registry;
mod room;
#[cfg(test)]
mod test_support;
mod track;

pub use error::SfuError;
pub use keyframe::spawn_keyframe_task;
pub use media::build_media_api;
pub use peer::PeerSession;
pub use reconcile::reconcile;
pub use registry::{Registry, RegistryStats};
pub use room::Room;
pub use track::{add_track, remove_track, spawn_forwarder, ForwardingTrack};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn room_starts_empty() {
        let room = Room::new("room-1".to_string());
        let inner = room.inner.lock().await;
        assert!(inner.peers.is_empty());
        assert!(inner.tracks.is_empty());
    }

    #[test]
    fn registry_get_or_create_is_idempotent() {
        let registry = Registry::new();
        let (a, created_a) = registry.get_or_create("room-1");
        let (b, created_b) = registry.get_or_create("room-1");
        assert!(created_a);
        assert!(!created_b);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
