//! API Router and Application State
//!
//! Central routing configuration and shared state.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use webrtc::api::API;

use crate::auth::{sign_dev_token, single_key_fetcher, KeyFetcher};
use crate::config::Config;
use crate::sfu::Registry;
use crate::ws;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide room registry and counters.
    pub registry: Arc<Registry>,
    /// Shared `webrtc` media engine/API instance.
    pub media_api: Arc<API>,
    /// Server configuration.
    pub config: Arc<Config>,
    /// Symmetric-key fetcher used by the token validator.
    pub key_fetcher: Arc<dyn KeyFetcher + Send + Sync>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, media_api: API) -> Self {
        let key_fetcher = single_key_fetcher(config.hmac_key.clone());
        Self {
            registry: Arc::new(Registry::new()),
            media_api: Arc::new(media_api),
            config: Arc::new(config),
            key_fetcher: Arc::new(key_fetcher),
        }
    }
}

/// Build the application router: websocket upgrade, stats, and (dev
/// mode only) the token-issuance endpoint.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/websocket", get(ws::handler))
        .route("/get.stats", get(get_stats));

    if state.config.dev {
        router = router.route("/get.token", get(get_token));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    details: bool,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    #[serde(rename = "total-rooms")]
    total_rooms: u64,
    #[serde(rename = "total-peers")]
    total_peers: u64,
    #[serde(rename = "room-ids", skip_serializing_if = "Option::is_none")]
    room_ids: Option<Vec<String>>,
}

/// `GET /get.stats[?details=true]` — room/peer counters, never taking a
/// room lock.
async fn get_stats(State(state): State<AppState>, Query(query): Query<StatsQuery>) -> Json<StatsResponse> {
    let stats = state.registry.stats();
    let room_ids = query.details.then(|| state.registry.room_ids());

    Json(StatsResponse {
        total_rooms: stats.total_rooms,
        total_peers: stats.total_peers,
        room_ids,
    })
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(rename = "roomId")]
    room_id: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
}

/// `GET /get.token?roomId=<id>` — dev mode only. Mounted conditionally
/// by [`create_router`], so this handler is unreachable unless `--dev`
/// was passed at startup.
async fn get_token(State(state): State<AppState>, Query(query): Query<TokenQuery>) -> Response {
    match sign_dev_token(&query.room_id, &state.config.hmac_key) {
        Ok(token) => Json(TokenResponse { token }).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "dev token signing failed");
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfu::build_media_api;

    fn test_state() -> AppState {
        AppState::new(Config::default_for_test(), build_media_api().unwrap())
    }

    #[tokio::test]
    async fn stats_without_details_omits_room_ids() {
        let state = test_state();
        let Json(stats) = get_stats(State(state), Query(StatsQuery { details: false })).await;
        assert_eq!(stats.total_rooms, 0);
        assert_eq!(stats.total_peers, 0);
        assert!(stats.room_ids.is_none());
    }

    #[tokio::test]
    async fn stats_with_details_includes_room_ids() {
        let state = test_state();
        state.registry.get_or_create("room-1");

        let Json(stats) = get_stats(State(state), Query(StatsQuery { details: true })).await;
        assert_eq!(stats.total_rooms, 1);
        assert_eq!(stats.room_ids, Some(vec!["room-1".to_string()]));
    }

    #[tokio::test]
    async fn get_token_issues_a_token_for_the_requested_room() {
        let state = test_state();
        let response = get_token(
            State(state),
            Query(TokenQuery {
                room_id: "room-1".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn router_builds_in_both_dev_and_default_mode() {
        let mut dev_config = Config::default_for_test();
        dev_config.dev = true;
        let _dev_router = create_router(AppState::new(dev_config, build_media_api().unwrap()));
        let _prod_router = create_router(test_state());
    }
}
