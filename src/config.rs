//! Configuration module for environment variables and client settings

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:5000/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TOKEN_FILE: &str = ".recipe-client/tokens.json";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL including the `/api/v1` prefix
    pub api_base_url: Url,

    /// Per-request timeout for every backend call
    pub request_timeout: Duration,

    /// Where the CLI persists the token pair
    pub token_file: PathBuf,

    /// Mirror the access token into the `access_token` cookie
    pub mirror_cookie: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            mirror_cookie: true,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment (and `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("RECIPE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_base_url = Url::parse(api_base_url.trim())
            .with_context(|| format!("RECIPE_API_URL is not a valid URL: {api_base_url}"))?;
        if !matches!(api_base_url.scheme(), "http" | "https") {
            anyhow::bail!("RECIPE_API_URL must use http or https, got {}", api_base_url.scheme());
        }

        let request_timeout = match lookup("RECIPE_HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("RECIPE_HTTP_TIMEOUT_SECS must be a number of seconds, got {raw:?}"))?;
                Duration::from_secs(secs.max(1))
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            api_base_url,
            request_timeout,
            token_file: lookup("RECIPE_TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE)),
            mirror_cookie: lookup("RECIPE_COOKIE_MIRROR")
                .and_then(|raw| parse_bool(&raw))
                .unwrap_or(true),
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
