//! # Companion Configuration
//!
//! This module manages configuration for the network layer, loaded from
//! environment variables (optionally seeded from a `.env` file). All values
//! are validated up front to fail fast if misconfigured.
//!
//! The configuration is a plain value handed to whoever composes the
//! services; there is no global instance.
//!
//! ```rust,no_run
//! use lib_core::config::Config;
//!
//! let config = Config::load()?;
//! println!("API at {}", config.api_base_url);
//! # Ok::<(), lib_core::AppError>(())
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default |
//! |----------|---------|
//! | `COMPANION_API_BASE_URL` | `http://127.0.0.1:3001` |
//! | `COMPANION_WS_URL` | API URL with `ws(s)://` scheme + `/api/ws` |
//! | `COMPANION_REQUEST_TIMEOUT_MS` | `10000` |
//! | `COMPANION_MAX_ATTEMPTS` | `3` |
//! | `COMPANION_RETRY_BASE_DELAY_MS` | `1000` |
//! | `COMPANION_RECONNECT_INTERVAL_MS` | `3000` |
//! | `COMPANION_MAX_RECONNECT_ATTEMPTS` | `5` |
//! | `COMPANION_CACHE_DIR` | unset (in-memory cache) |
//! | `COMPANION_AUTH_TOKEN_KEY` | `auth_token` |
//! | `COMPANION_LOG_DIR` | `logs` |
//! | `COMPANION_LOG_LEVEL` | `companion=info,lib_net=info,warn` |

use std::path::PathBuf;
use std::time::Duration;

use lib_utils::envs::{get_env, get_env_or, get_env_parse_or};

use crate::error::{AppError, Result};

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3001";
const DEFAULT_LOG_LEVEL: &str = "companion=info,lib_net=info,warn";

/// Network layer configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL every request path is joined onto
    pub api_base_url: String,

    /// Live channel endpoint
    pub ws_url: String,

    /// Per-attempt deadline for request calls
    pub request_timeout: Duration,

    /// Total attempts per request, including the first
    ///
    /// Valid range: 1-10
    pub max_attempts: u32,

    /// Delay before the first retry; doubles for each further retry
    pub retry_base_delay: Duration,

    /// Reconnect delay unit; attempt `n` waits `n` times this long
    pub reconnect_interval: Duration,

    /// Consecutive reconnect attempts before the channel gives up
    pub max_reconnect_attempts: u32,

    /// Directory for the file-backed cache; `None` keeps the cache in memory
    pub cache_dir: Option<PathBuf>,

    /// Secure-store name of the bearer credential
    pub auth_token_key: String,

    /// Directory for rolling log files
    pub log_dir: PathBuf,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_url: derive_ws_url(DEFAULT_API_BASE_URL),
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
            reconnect_interval: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
            cache_dir: None,
            auth_token_key: "auth_token".to_string(),
            log_dir: PathBuf::from("logs"),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Load `.env` (if present), read the environment and validate.
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(
                    error = %e,
                    "Failed to read .env file, continuing with process environment"
                );
            }
        }

        let config = Self::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let api_base_url = get_env_or("COMPANION_API_BASE_URL", DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let ws_url = get_env("COMPANION_WS_URL").unwrap_or_else(|_| derive_ws_url(&api_base_url));

        let request_timeout_ms: u64 = get_env_parse_or("COMPANION_REQUEST_TIMEOUT_MS", 10_000)?;
        let retry_base_delay_ms: u64 = get_env_parse_or("COMPANION_RETRY_BASE_DELAY_MS", 1_000)?;
        let reconnect_interval_ms: u64 =
            get_env_parse_or("COMPANION_RECONNECT_INTERVAL_MS", 3_000)?;

        let cache_dir = get_env("COMPANION_CACHE_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            api_base_url,
            ws_url,
            request_timeout: Duration::from_millis(request_timeout_ms),
            max_attempts: get_env_parse_or("COMPANION_MAX_ATTEMPTS", 3)?,
            retry_base_delay: Duration::from_millis(retry_base_delay_ms),
            reconnect_interval: Duration::from_millis(reconnect_interval_ms),
            max_reconnect_attempts: get_env_parse_or("COMPANION_MAX_RECONNECT_ATTEMPTS", 5)?,
            cache_dir,
            auth_token_key: get_env_or("COMPANION_AUTH_TOKEN_KEY", "auth_token"),
            log_dir: PathBuf::from(get_env_or("COMPANION_LOG_DIR", "logs")),
            log_level: get_env_or("COMPANION_LOG_LEVEL", DEFAULT_LOG_LEVEL),
        })
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let url = &self.api_base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::Config(
                "COMPANION_API_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(AppError::Config(
                "COMPANION_WS_URL must start with ws:// or wss://".to_string(),
            ));
        }

        if self.max_attempts < 1 || self.max_attempts > 10 {
            return Err(AppError::Config(
                "COMPANION_MAX_ATTEMPTS must be between 1 and 10".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(AppError::Config(
                "COMPANION_REQUEST_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.reconnect_interval.is_zero() {
            return Err(AppError::Config(
                "COMPANION_RECONNECT_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }

        if self.auth_token_key.trim().is_empty() {
            return Err(AppError::Config(
                "COMPANION_AUTH_TOKEN_KEY cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Derive the live channel URL from the HTTP base URL.
pub fn derive_ws_url(api_base_url: &str) -> String {
    api_base_url
        .trim_end_matches('/')
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1)
        + "/api/ws"
}
