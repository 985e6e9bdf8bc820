//! SFU Errors

use thiserror::Error;

/// Errors raised by the room/peer coordinator.
///
/// None of these ever cross an HTTP boundary: signaling and media-engine
/// failures are logged and folded into the reconciler's try-again/
/// best-effort control flow (see `reconcile`), never surfaced to a client
/// as a structured response.
#[derive(Debug, Error)]
pub enum SfuError {
    /// The underlying `webrtc` API returned an error.
    #[error("webrtc error: {0}")]
    WebRtc(#[from] webrtc::Error),

    /// A control-channel write failed.
    #[error("control channel write failed: {0}")]
    Io(String),

    /// An inbound control message was malformed or out of protocol order.
    #[error("protocol error: {0}")]
    Protocol(String),
}
