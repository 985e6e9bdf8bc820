//! Peer Session State
//!
//! One `PeerSession` per connected websocket: the peer connection handle
//! and the serialized control-channel writer.

use std::sync::Arc;

use uuid::Uuid;
use webrtc::peer_connection::RTCPeerConnection;

use crate::ws::writer::MessageWriter;

/// A single client's WebRTC association with the server.
pub struct PeerSession {
    /// Server-assigned, time-ordered unique id for this session.
    pub peer_id: Uuid,

    /// The peer's WebRTC peer connection.
    pub pc: Arc<RTCPeerConnection>,

    /// Serialized writer for this peer's control channel.
    pub writer: Arc<MessageWriter>,
}

impl PeerSession {
    /// Create a new peer session wrapper.
    #[must_use]
    pub fn new(peer_id: Uuid, pc: Arc<RTCPeerConnection>, writer: Arc<MessageWriter>) -> Self {
        Self { peer_id, pc, writer }
    }
}
