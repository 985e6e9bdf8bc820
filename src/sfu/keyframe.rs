//! Keyframe Dispatcher
//!
//! Periodically asks every inbound track of every peer in every room to
//! emit a fresh keyframe via RTCP Picture Loss Indication, so a track
//! that attaches to a late-joining peer doesn't wait for the next
//! natural keyframe interval from the publisher's encoder. The same
//! routine runs at the end of every reconciliation pass, since that is
//! exactly when a new forwarding track starts being offered.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;

use super::registry::Registry;
use super::room::Room;

const KEYFRAME_INTERVAL: Duration = Duration::from_secs(3);

/// Request a keyframe from every bound inbound receiver of every peer in
/// `room`. Best-effort: a write failure is logged and does not stop the
/// rest of the sweep.
pub async fn request_keyframes_for_room(room: &Arc<Room>) {
    let peers = {
        let inner = room.inner.lock().await;
        inner.peers.clone()
    };

    for peer in peers {
        for receiver in peer.pc.get_receivers().await {
            let track = receiver.track().await;
            if track.id().is_empty() {
                continue;
            }
            let pli = PictureLossIndication {
                sender_ssrc: 0,
                media_ssrc: track.ssrc(),
            };
            if let Err(e) = peer.pc.write_rtcp(&[Box::new(pli)]).await {
                debug!(room = %room.id, peer_id = %peer.peer_id, error = %e, "PLI write failed");
            }
        }
    }
}

/// Spawn the background task that drives [`request_keyframes_for_room`]
/// across every room in `registry` every [`KEYFRAME_INTERVAL`].
pub fn spawn_keyframe_task(registry: Arc<Registry>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(KEYFRAME_INTERVAL);
        loop {
            ticker.tick().await;
            for room in registry.snapshot() {
                request_keyframes_for_room(&room).await;
            }
        }
    });
}
