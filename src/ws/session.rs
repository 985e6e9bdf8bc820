//! Peer Session Handler
//!
//! Drives one websocket connection end to end: upgrade, authenticate,
//! room join, peer connection setup, command loop, teardown. This is
//! the only place that owns a websocket's read half; everything else
//! that needs to talk back to the client goes through the peer's
//! [`MessageWriter`](super::writer::MessageWriter).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitStream;
use futures::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;
use webrtc::api::API;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

use crate::auth::{validate_token_and_get_room_id, KeyFetcher};
use crate::sfu::{self, PeerSession, Registry, Room, SfuError};

use super::protocol::{ClientEvent, Envelope, LoginReply};
use super::writer::MessageWriter;

/// Run a peer session to completion. Returns once the session has fully
/// torn down (peer connection closed, room membership removed, counters
/// decremented, `peer-gone` broadcast).
pub async fn run(
    socket: WebSocket,
    media_api: Arc<API>,
    registry: Arc<Registry>,
    key_fetcher: Arc<dyn KeyFetcher + Send + Sync>,
) {
    let (sink, mut stream) = socket.split();
    let writer = Arc::new(MessageWriter::new(sink));

    let peer_id = Uuid::now_v7();
    if writer.write_raw("login", peer_id.to_string()).await.is_err() {
        return;
    }

    let Some(room_id) = authenticate(&mut stream, &writer, &key_fetcher).await else {
        return;
    };

    let (room, _created) = registry.get_or_create(&room_id);

    let pc = match build_peer_connection(&media_api).await {
        Ok(pc) => pc,
        Err(e) => {
            warn!(peer_id = %peer_id, error = %e, "peer connection setup failed");
            return;
        }
    };

    let peer = Arc::new(PeerSession::new(peer_id, pc.clone(), writer.clone()));
    register_callbacks(&peer, &room, &registry);

    room.add_peer(peer.clone()).await;
    registry.increment_peers();
    sfu::reconcile(room.clone(), registry.clone()).await;

    info!(peer_id = %peer_id, room_id = %room_id, "peer joined room");

    command_loop(&mut stream, &peer).await;

    teardown(&peer, &room, &registry).await;
}

/// Step 3 of §4.6: read exactly one frame, require `login-reply`,
/// validate the token, and return the authorized room id.
async fn authenticate(
    stream: &mut SplitStream<WebSocket>,
    writer: &Arc<MessageWriter>,
    key_fetcher: &Arc<dyn KeyFetcher + Send + Sync>,
) -> Option<String> {
    let frame = stream.next().await?;
    let Ok(Message::Text(text)) = frame else {
        return None;
    };

    let envelope: Envelope = serde_json::from_str(&text).ok()?;
    if envelope.event != "login-reply" {
        return None;
    }

    let reply: LoginReply = serde_json::from_str(&envelope.data).ok()?;
    match validate_token_and_get_room_id(&reply.token, &reply.token_hint, key_fetcher.as_ref()) {
        Ok(room_id) => Some(room_id),
        Err(e) => {
            warn!(error = %e, "token validation failed");
            writer.close().await;
            None
        }
    }
}

/// Step 5 of §4.6: default configuration, one recvonly video and one
/// recvonly audio transceiver.
async fn build_peer_connection(api: &API) -> Result<Arc<RTCPeerConnection>, SfuError> {
    let pc = api.new_peer_connection(RTCConfiguration::default()).await?;

    pc.add_transceiver_from_kind(
        RTPCodecType::Video,
        Some(RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Recvonly,
            send_encodings: vec![],
        }),
    )
    .await?;
    pc.add_transceiver_from_kind(
        RTPCodecType::Audio,
        Some(RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Recvonly,
            send_encodings: vec![],
        }),
    )
    .await?;

    Ok(Arc::new(pc))
}

/// Step 6 of §4.6: ICE candidate emission, connection state transitions,
/// and inbound track forwarding.
fn register_callbacks(peer: &Arc<PeerSession>, room: &Arc<Room>, registry: &Arc<Registry>) {
    let writer = peer.writer.clone();
    peer.pc.on_ice_candidate(Box::new(move |candidate| {
        let writer = writer.clone();
        Box::pin(async move {
            let Some(candidate) = candidate else {
                return;
            };
            let Ok(init) = candidate.to_json() else {
                return;
            };
            if let Err(e) = writer.write_event("candidate", &init).await {
                debug!(error = %e, "candidate write failed");
            }
        })
    }));

    let room_for_state = room.clone();
    let registry_for_state = registry.clone();
    let pc_for_state = peer.pc.clone();
    peer.pc
        .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let room = room_for_state.clone();
            let registry = registry_for_state.clone();
            let pc = pc_for_state.clone();
            Box::pin(async move {
                match state {
                    RTCPeerConnectionState::Failed => {
                        let _ = pc.close().await;
                    }
                    RTCPeerConnectionState::Closed => {
                        sfu::reconcile(room, registry).await;
                    }
                    _ => {}
                }
            })
        }));

    let room_for_track = room.clone();
    let registry_for_track = registry.clone();
    let origin_peer_id = peer.peer_id;
    peer.pc.on_track(Box::new(move |remote, _receiver, _transceiver| {
        let room = room_for_track.clone();
        let registry = registry_for_track.clone();
        Box::pin(async move {
            let forwarding = sfu::add_track(&room, &remote, origin_peer_id).await;
            sfu::reconcile(room.clone(), registry.clone()).await;
            sfu::spawn_forwarder(room.clone(), remote, forwarding, move |room| {
                let registry = registry.clone();
                tokio::spawn(sfu::reconcile(room, registry));
            });
        })
    }));
}

/// Step 9 of §4.6: dispatch inbound frames by event until the stream
/// ends or a frame fails to parse.
async fn command_loop(stream: &mut SplitStream<WebSocket>, peer: &Arc<PeerSession>) {
    while let Some(frame) = stream.next().await {
        let Ok(Message::Text(text)) = frame else {
            break;
        };

        let Ok(envelope) = serde_json::from_str::<Envelope>(&text) else {
            break;
        };

        match ClientEvent::from_envelope(&envelope) {
            ClientEvent::Candidate(data) => {
                let Ok(init) = serde_json::from_str::<RTCIceCandidateInit>(&data) else {
                    break;
                };
                if peer.pc.add_ice_candidate(init).await.is_err() {
                    break;
                }
            }
            ClientEvent::Answer(data) => {
                let Ok(answer) = serde_json::from_str::<RTCSessionDescription>(&data) else {
                    break;
                };
                if peer.pc.set_remote_description(answer).await.is_err() {
                    break;
                }
            }
            ClientEvent::Other => {}
        }
    }
}

/// Step 1 of §4.6, the exit path: close pc, close ws, decrement the
/// counter, broadcast `peer-gone`.
async fn teardown(peer: &Arc<PeerSession>, room: &Arc<Room>, registry: &Arc<Registry>) {
    let _ = peer.pc.close().await;
    peer.writer.close().await;
    registry.decrement_peers();

    let envelope = Envelope::with_raw_data("peer-gone", peer.peer_id.to_string());
    room.broadcast_except(peer.peer_id, &envelope).await;

    sfu::reconcile(room.clone(), registry.clone()).await;

    info!(peer_id = %peer.peer_id, "peer session ended");
}
