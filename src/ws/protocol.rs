//! Control Channel Wire Protocol
//!
//! Every frame is a text JSON envelope `{event, data}` where `data` is
//! itself a JSON-encoded string whose schema is determined by `event`.
//! This double-encoding (rather than a single internally-tagged enum)
//! is the wire format clients speak, so it is modeled explicitly here
//! instead of leaning on serde's `#[serde(tag = ...)]` sugar.

use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::sfu::SfuError;

/// One control-channel frame as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub data: String,
}

impl Envelope {
    /// Build an envelope whose `data` is `payload` serialized to JSON.
    pub fn new(event: &str, payload: &impl Serialize) -> Result<Self, SfuError> {
        let data = serde_json::to_string(payload)
            .map_err(|e| SfuError::Protocol(format!("failed to encode {event}: {e}")))?;
        Ok(Self {
            event: event.to_string(),
            data,
        })
    }

    /// Build an envelope whose `data` is a bare string (e.g. a peer id).
    pub fn with_raw_data(event: &str, data: impl Into<String>) -> Self {
        Self {
            event: event.to_string(),
            data: data.into(),
        }
    }
}

/// Payload for `track-meta`: lets the client associate forwarded media
/// with the peer it originated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackMeta {
    pub id: String,
    pub peer_id: String,
}

/// Payload carried by the client's `login-reply` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginReply {
    pub token: String,
    #[serde(default)]
    pub token_hint: String,
}

/// Client-to-server events this server understands; anything else in
/// the command loop is parsed into `Other` and ignored.
pub enum ClientEvent {
    Candidate(String),
    Answer(String),
    Other,
}

impl ClientEvent {
    pub fn from_envelope(envelope: &Envelope) -> Self {
        match envelope.event.as_str() {
            "candidate" => ClientEvent::Candidate(envelope.data.clone()),
            "answer" => ClientEvent::Answer(envelope.data.clone()),
            _ => ClientEvent::Other,
        }
    }
}

/// A terse `{"error": code, "message": text}` body for HTTP-facing auth
/// and protocol failures.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl From<&AuthError> for ErrorBody {
    fn from(e: &AuthError) -> Self {
        let code = match e {
            AuthError::UnsupportedAlgorithm => "unsupported_algorithm",
            AuthError::KeyFetch(_) => "key_fetch_failed",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "expired",
            AuthError::MalformedToken => "malformed_token",
        };
        ErrorBody {
            error: code,
            message: e.to_string(),
        }
    }
}
