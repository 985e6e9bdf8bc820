//! Forwarding Tracks
//!
//! A `ForwardingTrack` is the server-side local RTP track republishing
//! packets read from one peer's remote track to every other peer in the
//! room. Track id and stream id are inherited from the remote track so
//! the client can correlate forwarded media back to its origin via the
//! `track-meta` control message.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocalWriter;
use webrtc::track::track_remote::TrackRemote;

use super::room::Room;

/// A local track forwarding one peer's inbound media to the rest of the
/// room, paired with the peer id it originated from.
#[derive(Clone)]
pub struct ForwardingTrack {
    pub track: Arc<TrackLocalStaticRTP>,
    pub origin_peer_id: Uuid,
}

/// Construct a forwarding track mirroring `remote`'s codec, id, and
/// stream id, insert it into `room.tracks` keyed by track id, and
/// trigger reconciliation.
///
/// Returns the inserted [`ForwardingTrack`]; the caller is expected to
/// spawn the RTP read loop that feeds it (see [`spawn_forwarder`]).
pub async fn add_track(
    room: &Arc<Room>,
    remote: &Arc<TrackRemote>,
    origin_peer_id: Uuid,
) -> ForwardingTrack {
    let codec = remote.codec();
    let local = Arc::new(TrackLocalStaticRTP::new(
        RTCRtpCodecCapability {
            mime_type: codec.capability.mime_type,
            clock_rate: codec.capability.clock_rate,
            channels: codec.capability.channels,
            sdp_fmtp_line: codec.capability.sdp_fmtp_line,
            rtcp_feedback: vec![],
        },
        remote.id(),
        remote.stream_id(),
    ));

    let forwarding = ForwardingTrack {
        track: local,
        origin_peer_id,
    };

    {
        let mut inner = room.inner.lock().await;
        inner.tracks.insert(forwarding.track.id(), forwarding.clone());
    }

    debug!(
        room = %room.id,
        origin_peer_id = %origin_peer_id,
        track_id = %forwarding.track.id(),
        "Added forwarding track"
    );

    forwarding
}

/// Remove a forwarding track by id and trigger reconciliation.
pub async fn remove_track(room: &Arc<Room>, forwarding: &ForwardingTrack) {
    let mut inner = room.inner.lock().await;
    inner.tracks.remove(&forwarding.track.id());

    debug!(
        room = %room.id,
        track_id = %forwarding.track.id(),
        "Removed forwarding track"
    );
}

/// Spawn the read loop that copies RTP packets from `remote` onto
/// `forwarding.track` until the remote track's read fails, then removes
/// the forwarding track from the room (triggering reconciliation).
pub fn spawn_forwarder(
    room: Arc<Room>,
    remote: Arc<TrackRemote>,
    forwarding: ForwardingTrack,
    reconcile: impl Fn(Arc<Room>) + Send + Sync + 'static,
) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 1500];

        loop {
            match remote.read(&mut buf).await {
                Ok((packet, _attributes)) => {
                    if let Err(e) = forwarding.track.write_rtp(&packet).await {
                        debug!(track_id = %forwarding.track.id(), error = %e, "Forward write failed");
                    }
                }
                Err(e) => {
                    debug!(track_id = %forwarding.track.id(), error = %e, "Remote track read ended");
                    break;
                }
            }
        }

        remove_track(&room, &forwarding).await;
        reconcile(room);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_forwarding_track(id: &str, origin_peer_id: Uuid) -> ForwardingTrack {
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
    async fn room_tracks_are_keyed_by_track_id() {
        let room = Arc::new(Room::new("room-1".to_string()));
        let origin = Uuid::now_v7();
        let forwarding = synthetic_forwarding_track("track-a", origin);

        {
            let mut inner = room.inner.lock().await;
            inner.tracks.insert(forwarding.track.id(), forwarding.clone());
        }

        assert!(room.inner.lock().await.tracks.contains_key("track-a"));

        remove_track(&room, &forwarding).await;
        assert!(!room.inner.lock().await.tracks.contains_key("track-a"));
    }
}
