//! Control Channel
//!
//! Websocket upgrade entry point and the wire protocol/session machinery
//! behind it.

pub mod protocol;
mod session;
pub mod writer;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;

use crate::api::AppState;

/// Upgrade an HTTP connection to a websocket and hand it to the peer
/// session handler.
pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        session::run(
            socket,
            state.media_api.clone(),
            state.registry.clone(),
            state.key_fetcher.clone(),
        )
        .await;
    })
}

pub use protocol::Envelope;
pub use writer::MessageWriter;
