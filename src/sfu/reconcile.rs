//! Signaling Reconciler
//!
//! The central algorithm: for a room, bring every peer's outbound sender
//! set into agreement with the room's current track set, generating and
//! sending a fresh offer to each peer whose senders changed. Bounded to
//! 25 attempts per pass to absorb bursts of concurrent track mutation
//! without starving the room lock; a pass that still hasn't converged
//! schedules one deferred retry 3 seconds later.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::track::track_local::TrackLocal;

use super::keyframe::request_keyframes_for_room;
use super::registry::Registry;
use super::room::Room;
use super::track::ForwardingTrack;
use crate::ws::protocol::{Envelope, TrackMeta};

const MAX_ATTEMPTS: usize = 25;
const RETRY_DELAY: Duration = Duration::from_secs(3);

enum AttemptOutcome {
    Converged,
    TryAgain,
}

/// Run one reconciliation pass for `room`, retrying internally up to
/// [`MAX_ATTEMPTS`] times. On exit: dispatches keyframes for the room,
/// removes the room from `registry` if it ended up empty, and — if the
/// pass never converged — schedules one deferred retry.
pub async fn reconcile(room: Arc<Room>, registry: Arc<Registry>) {
    let mut converged = false;

    for attempt in 0..MAX_ATTEMPTS {
        match run_attempt(&room).await {
            AttemptOutcome::Converged => {
                converged = true;
                break;
            }
            AttemptOutcome::TryAgain => {
                debug!(room = %room.id, attempt, "reconciliation try-again");
            }
        }
    }

    let delete_room = {
        let inner = room.inner.lock().await;
        inner.peers.is_empty()
    };

    request_keyframes_for_room(&room).await;

    if delete_room {
        registry.remove_if_present(&room.id);
    }

    if !converged {
        warn!(room = %room.id, "reconciliation did not converge within {MAX_ATTEMPTS} attempts, scheduling retry");
        let room = room.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RETRY_DELAY).await;
            Box::pin(reconcile(room, registry)).await;
        });
    }
}

/// One scan over `room.peers`, mutating sender/track state as needed.
/// Returns `Converged` only if every peer was processed without any
/// restart condition being hit.
async fn run_attempt(room: &Arc<Room>) -> AttemptOutcome {
    let mut inner = room.inner.lock().await;

    let mut index = 0;
    while index < inner.peers.len() {
        let peer = inner.peers[index].clone();

        if peer.pc.connection_state() == RTCPeerConnectionState::Closed {
            inner.peers.remove(index);
            debug!(room = %room.id, peer_id = %peer.peer_id, "removed closed peer");
            return AttemptOutcome::TryAgain;
        }

        let present = present_track_ids(&peer).await;

        let senders = peer.pc.get_senders().await;
        for sender in senders {
            let Some(track) = sender.track().await else {
                continue;
            };
            if !inner.tracks.contains_key(&track.id()) {
                if let Err(e) = peer.pc.remove_track(&sender).await {
                    warn!(room = %room.id, peer_id = %peer.peer_id, error = %e, "remove_track failed");
                    return AttemptOutcome::TryAgain;
                }
            }
        }

        let missing: Vec<(String, ForwardingTrack)> = inner
            .tracks
            .iter()
            .filter(|(track_id, forwarding)| {
                !present.contains(track_id.as_str()) && forwarding.origin_peer_id != peer.peer_id
            })
            .map(|(track_id, forwarding)| (track_id.clone(), forwarding.clone()))
            .collect();

        for (_track_id, forwarding) in missing {
            let local: Arc<dyn TrackLocal + Send + Sync> = forwarding.track.clone();
            if let Err(e) = peer.pc.add_track(local).await {
                warn!(room = %room.id, peer_id = %peer.peer_id, error = %e, "add_track failed");
                return AttemptOutcome::TryAgain;
            }

            let meta = TrackMeta {
                id: forwarding.track.stream_id(),
                peer_id: forwarding.origin_peer_id.to_string(),
            };
            let envelope = match Envelope::new("track-meta", &meta) {
                Ok(e) => e,
                Err(e) => {
                    warn!(room = %room.id, peer_id = %peer.peer_id, error = %e, "track-meta encode failed");
                    return AttemptOutcome::TryAgain;
                }
            };
            if let Err(e) = peer.writer.send_envelope(&envelope).await {
                warn!(room = %room.id, peer_id = %peer.peer_id, error = %e, "track-meta write failed");
                return AttemptOutcome::TryAgain;
            }
        }

        if let Err(e) = send_offer(&peer).await {
            warn!(room = %room.id, peer_id = %peer.peer_id, error = %e, "offer send failed");
            return AttemptOutcome::TryAgain;
        }

        index += 1;
    }

    AttemptOutcome::Converged
}

async fn send_offer(peer: &super::peer::PeerSession) -> Result<(), super::error::SfuError> {
    let offer = peer.pc.create_offer(None).await?;
    peer.pc.set_local_description(offer.clone()).await?;
    peer.writer.write_event("offer", &offer).await
}

/// Track ids currently attached to `peer`'s outbound senders or inbound
/// receivers — the set of tracks this peer need not be offered again.
async fn present_track_ids(peer: &super::peer::PeerSession) -> HashSet<String> {
    let mut present = HashSet::new();

    for sender in peer.pc.get_senders().await {
        if let Some(track) = sender.track().await {
            present.insert(track.id());
        }
    }
    for receiver in peer.pc.get_receivers().await {
        let track = receiver.track().await;
        if !track.id().is_empty() {
            present.insert(track.id());
        }
    }

    present
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfu::peer::PeerSession;
    use crate::sfu::test_support::{failing_writer, inert_writer, test_peer_with_writer};
    use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
    use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;

    #[allow(dead_code)]
    fn assert_peer_session_send_sync<T: Send + Sync>() {}

    #[test]
    fn peer_session_is_send_sync() {
        assert_peer_session_send_sync::<PeerSession>();
    }

    fn synthetic_track(id: &str, origin_peer_id: uuid::Uuid) -> ForwardingTrack {
        let track = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: "video/VP8".to_string(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            id.to_string(),
            "stream-1".to_string(),
        ));
        ForwardingTrack {
            track,
            origin_peer_id,
        }
    }

    #[tokio::test]
    async fn run_attempt_converges_with_no_tracks_and_a_working_writer() {
        let room = Arc::new(Room::new("room-1".to_string()));
        let peer = test_peer_with_writer(inert_writer()).await;
        room.add_peer(peer).await;

        let outcome = run_attempt(&room).await;

        assert!(matches!(outcome, AttemptOutcome::Converged));
    }

    #[tokio::test]
    async fn run_attempt_prunes_a_closed_peer_then_converges_on_the_next_pass() {
        let room = Arc::new(Room::new("room-1".to_string()));
        let peer = test_peer_with_writer(inert_writer()).await;
        room.add_peer(peer.clone()).await;
        peer.pc.close().await.unwrap();

        let outcome = run_attempt(&room).await;
        assert!(matches!(outcome, AttemptOutcome::TryAgain));
        assert!(room.inner.lock().await.peers.is_empty());

        let outcome = run_attempt(&room).await;
        assert!(matches!(outcome, AttemptOutcome::Converged));
    }

    #[tokio::test]
    async fn run_attempt_attaches_a_missing_track_and_converges() {
        let room = Arc::new(Room::new("room-1".to_string()));
        let peer = test_peer_with_writer(inert_writer()).await;
        room.add_peer(peer.clone()).await;

        let forwarding = synthetic_track("track-a", uuid::Uuid::now_v7());
        {
            let mut inner = room.inner.lock().await;
            inner.tracks.insert(forwarding.track.id(), forwarding);
        }

        let outcome = run_attempt(&room).await;

        assert!(matches!(outcome, AttemptOutcome::Converged));
        assert_eq!(peer.pc.get_senders().await.len(), 1);
    }

    #[tokio::test]
    async fn run_attempt_never_attaches_a_peers_own_track() {
        let room = Arc::new(Room::new("room-1".to_string()));
        let peer = test_peer_with_writer(inert_writer()).await;
        room.add_peer(peer.clone()).await;

        let forwarding = synthetic_track("track-a", peer.peer_id);
        {
            let mut inner = room.inner.lock().await;
            inner.tracks.insert(forwarding.track.id(), forwarding);
        }

        let outcome = run_attempt(&room).await;

        assert!(matches!(outcome, AttemptOutcome::Converged));
        assert!(peer.pc.get_senders().await.is_empty());
    }

    #[tokio::test]
    async fn run_attempt_treats_a_track_meta_write_failure_as_try_again() {
        let room = Arc::new(Room::new("room-1".to_string()));
        let peer = test_peer_with_writer(failing_writer()).await;
        room.add_peer(peer.clone()).await;

        let forwarding = synthetic_track("track-a", uuid::Uuid::now_v7());
        {
            let mut inner = room.inner.lock().await;
            inner.tracks.insert(forwarding.track.id(), forwarding);
        }

        let outcome = run_attempt(&room).await;

        assert!(matches!(outcome, AttemptOutcome::TryAgain));
    }

    #[tokio::test]
    async fn reconcile_deletes_the_room_once_its_last_peer_closes() {
        let registry = Arc::new(Registry::new());
        let (room, _created) = registry.get_or_create("room-1");
        let peer = test_peer_with_writer(inert_writer()).await;
        room.add_peer(peer.clone()).await;
        peer.pc.close().await.unwrap();

        reconcile(room, registry.clone()).await;

        assert_eq!(registry.stats().total_rooms, 0);
    }
}
