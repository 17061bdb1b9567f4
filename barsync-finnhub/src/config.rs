use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection settings for the Finnhub REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinnhubConfig {
    /// API token sent as the `token` query parameter.
    pub api_key: String,
    /// Root of the REST API, e.g. `https://finnhub.io/api/v1/`.
    pub base_url: String,
    /// Largest window requested in one intraday candle call.
    pub intraday_chunk: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for FinnhubConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://finnhub.io/api/v1/".to_string(),
            intraday_chunk: Duration::from_secs(30 * 24 * 60 * 60),
            timeout: Duration::from_secs(30),
        }
    }
}

impl FinnhubConfig {
    /// Default settings with `api_key` filled in.
    #[must_use]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }
}
