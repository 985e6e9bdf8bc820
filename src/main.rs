//! `ag-webrtc-sfu` — Main Entry Point

use anyhow::Result;
use tracing::info;

use ag_webrtc_sfu::{api, config::Config, sfu};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (required for WebRTC)
    let _ =
        rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider());

    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| {
                if config.verbose {
                    "ag_webrtc_sfu=debug,tower_http=debug".into()
                } else {
                    "ag_webrtc_sfu=info,tower_http=info".into()
                }
            },
        ))
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        dev = config.dev,
        "starting ag-webrtc-sfu"
    );

    let media_api = sfu::build_media_api()?;
    let state = api::AppState::new(config, media_api);

    sfu::spawn_keyframe_task(state.registry.clone());

    let app = api::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&state.config.addr).await?;
    info!(address = %state.config.addr, "listening");

    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        info!("shutdown signal received, draining connections");
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await?;

    info!("server shutdown complete");

    Ok(())
}
