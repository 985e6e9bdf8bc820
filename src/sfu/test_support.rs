//! Test-only constructors for real `RTCPeerConnection`s and inert
//! control-channel writers, so `Room`/reconciler tests exercise real
//! WebRTC state transitions without a live socket or ICE negotiation.

use std::sync::Arc;

use axum::extract::ws::Message;
use futures::sink::unfold;
use uuid::Uuid;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::RTCPeerConnection;

use super::media::build_media_api;
use super::peer::PeerSession;
use crate::ws::writer::MessageWriter;

/// A writer whose sink discards every frame and never fails — enough to
/// let reconciliation reach `Converged`, since it only cares that an
/// offer/`track-meta` write was attempted and succeeded, not where the
/// bytes end up.
pub(crate) fn inert_writer() -> Arc<MessageWriter> {
    let sink = unfold((), |(), _msg: Message| async move { Ok::<(), axum::Error>(()) });
    Arc::new(MessageWriter::new(sink))
}

/// A writer whose every write fails, for exercising the reconciler's
/// try-again-on-write-failure path.
pub(crate) fn failing_writer() -> Arc<MessageWriter> {
    let sink = unfold((), |(), _msg: Message| async move {
        Err::<(), axum::Error>(axum::Error::new(std::io::Error::other("send failed")))
    });
    Arc::new(MessageWriter::new(sink))
}

/// A real, unconnected `RTCPeerConnection`. No ICE/DTLS ever happens in
/// these tests, but `create_offer`/`add_track`/`get_senders`/`close` all
/// operate on local state and don't require a live connection.
pub(crate) async fn test_peer_connection() -> Arc<RTCPeerConnection> {
    let api = build_media_api().expect("media api");
    Arc::new(
        api.new_peer_connection(RTCConfiguration::default())
            .await
            .expect("peer connection"),
    )
}

/// A fully constructed `PeerSession` backed by a real peer connection
/// and the given writer.
pub(crate) async fn test_peer_with_writer(writer: Arc<MessageWriter>) -> Arc<PeerSession> {
    let pc = test_peer_connection().await;
    Arc::new(PeerSession::new(Uuid::now_v7(), pc, writer))
}
