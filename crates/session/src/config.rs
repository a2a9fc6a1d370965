//! Session client configuration, read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::manager::DEFAULT_LOGOUT_TIMEOUT;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL every endpoint path is appended to.
    pub api_url: String,
    /// Directory holding the persisted session records.
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    pub logout_timeout: Duration,
}

impl SessionConfig {
    /// - `PANEL_API_URL` (default `http://localhost:8000/api`)
    /// - `PANEL_DATA_DIR` (default `{app_data_dir}/panel-session`)
    /// - `PANEL_HTTP_TIMEOUT_SECS` (default 30)
    pub fn from_env() -> anyhow::Result<Self> {
        let api_url = std::env::var("PANEL_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let data_dir = match std::env::var_os("PANEL_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let request_timeout = match std::env::var("PANEL_HTTP_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .with_context(|| format!("PANEL_HTTP_TIMEOUT_SECS is not a number of seconds: {raw:?}"))?,
            ),
            Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            api_url,
            data_dir,
            request_timeout,
            logout_timeout: DEFAULT_LOGOUT_TIMEOUT.min(request_timeout),
        })
    }
}

/// `{app_data_dir}/panel-session`.
fn default_data_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    Ok(base.join("panel-session"))
}
