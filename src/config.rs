//! Server Configuration
//!
//! Combines CLI flags (parsed with `clap`) and environment variables
//! (loaded with `dotenvy` for local development convenience) into a
//! single immutable [`Config`] used for the lifetime of the process.

use anyhow::{Context, Result};
use clap::Parser;

/// Command-line flags accepted by the server binary.
#[derive(Debug, Parser)]
#[command(name = "ag-webrtc-sfu", version, about = "Many-to-many WebRTC SFU")]
struct Cli {
    /// Address the HTTP/websocket listener binds to.
    #[arg(long, default_value = "0.0.0.0:9000")]
    addr: String,

    /// Enable the dev-mode static/token endpoints (`GET /get.token`).
    #[arg(long, default_value_t = false)]
    dev: bool,

    /// Enable debug-level structured logging.
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

/// Resolved server configuration for this process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address for the HTTP/websocket server.
    pub addr: String,

    /// Whether dev-mode endpoints (`/get.token`) are enabled.
    pub dev: bool,

    /// Whether debug-level logging is enabled.
    pub verbose: bool,

    /// Symmetric HMAC-SHA256 key used to verify (and, in dev mode, sign)
    /// bearer tokens. Loaded from `AG_WEBRTC_SFU_KEY`.
    pub hmac_key: Vec<u8>,
}

impl Config {
    /// Parse CLI flags and load environment variables into a [`Config`].
    ///
    /// Fails if `AG_WEBRTC_SFU_KEY` is unset — the process has no way to
    /// verify bearer tokens without it and must refuse to start.
    pub fn load() -> Result<Self> {
        let cli = Cli::parse();

        let hmac_key = std::env::var("AG_WEBRTC_SFU_KEY")
            .context("AG_WEBRTC_SFU_KEY must be set")?
            .into_bytes();

        if hmac_key.is_empty() {
            anyhow::bail!("AG_WEBRTC_SFU_KEY must not be empty");
        }

        Ok(Self {
            addr: cli.addr,
            dev: cli.dev,
            verbose: cli.verbose,
            hmac_key,
        })
    }

    /// A configuration suitable for unit tests: a fixed in-memory key and
    /// no dev-mode surface.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            addr: "127.0.0.1:0".into(),
            dev: false,
            verbose: false,
            hmac_key: b"test-hmac-key-for-unit-tests".to_vec(),
        }
    }
}
