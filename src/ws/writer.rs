//! Thread-Safe Control Channel Writer
//!
//! Wraps the sink half of an axum websocket with a mutex so concurrent
//! callers (the reconciler, the broadcast helper, the session's own read
//! loop) never interleave partial JSON frames on the wire (I4). Boxed
//! over the `Sink` trait rather than the concrete `SplitSink` so tests
//! can drive a real writer without a live socket.

use std::pin::Pin;

use axum::extract::ws::Message;
use futures::Sink;
use futures::SinkExt;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::sfu::SfuError;

use super::protocol::Envelope;

type BoxedSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

pub struct MessageWriter {
    sink: Mutex<BoxedSink>,
}

impl MessageWriter {
    #[must_use]
    pub fn new<S>(sink: S) -> Self
    where
        S: Sink<Message, Error = axum::Error> + Send + 'static,
    {
        Self {
            sink: Mutex::new(Box::pin(sink)),
        }
    }

    /// Serialize `payload` under `event` and send it as one text frame.
    pub async fn write_event(&self, event: &str, payload: &impl Serialize) -> Result<(), SfuError> {
        let envelope = Envelope::new(event, payload)?;
        self.write_envelope(&envelope).await
    }

    /// Send a raw-string-payload event (`login`, `peer-gone`).
    pub async fn write_raw(&self, event: &str, data: impl Into<String>) -> Result<(), SfuError> {
        self.write_envelope(&Envelope::with_raw_data(event, data)).await
    }

    /// Send an already-built envelope verbatim (used by the broadcast
    /// helper, which forwards one constructed envelope to several peers).
    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<(), SfuError> {
        self.write_envelope(envelope).await
    }

    async fn write_envelope(&self, envelope: &Envelope) -> Result<(), SfuError> {
        let text = serde_json::to_string(envelope)
            .map_err(|e| SfuError::Io(format!("envelope encode failed: {e}")))?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| SfuError::Io(e.to_string()))
    }

    /// Close the underlying socket with a normal (1000) close code.
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
    }
}
