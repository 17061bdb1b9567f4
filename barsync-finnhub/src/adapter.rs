use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use barsync_core::SyncError;

use crate::config::FinnhubConfig;

pub(crate) const PROVIDER: &str = "finnhub";

/// Raw `/stock/candle` response.
///
/// Arrays are parallel: index `i` of every array describes the same candle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandlePayload {
    /// Status flag: `ok` or `no_data`.
    pub s: String,
    /// Candle open times, UNIX seconds.
    #[serde(default)]
    pub t: Vec<i64>,
    /// Open prices.
    #[serde(default)]
    pub o: Vec<f64>,
    /// High prices.
    #[serde(default)]
    pub h: Vec<f64>,
    /// Low prices.
    #[serde(default)]
    pub l: Vec<f64>,
    /// Close prices.
    #[serde(default)]
    pub c: Vec<f64>,
    /// Volumes.
    #[serde(default)]
    pub v: Vec<f64>,
}

/// One entry of the `/stock/split` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPayload {
    /// Ticker symbol.
    pub symbol: String,
    /// Effective date.
    pub date: NaiveDate,
    /// Shares before the split.
    #[serde(rename = "fromFactor")]
    pub from_factor: f64,
    /// Shares after the split.
    #[serde(rename = "toFactor")]
    pub to_factor: f64,
}

/// Parameters of a single candle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleRequest {
    /// Ticker symbol.
    pub symbol: String,
    /// Finnhub resolution code (`D` or `1`).
    pub resolution: &'static str,
    /// Window start, UNIX seconds (inclusive).
    pub from: i64,
    /// Window end, UNIX seconds (inclusive).
    pub to: i64,
}

/// Candle endpoint abstraction (so we can inject mocks in tests).
#[async_trait]
pub trait FinnhubCandles: Send + Sync {
    /// Fetch one candle window.
    async fn candles(&self, req: CandleRequest) -> Result<CandlePayload, SyncError>;
}

/// Split endpoint abstraction.
#[async_trait]
pub trait FinnhubSplits: Send + Sync {
    /// Fetch splits for `symbol` effective within `[from, to]`.
    async fn splits(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SplitPayload>, SyncError>;
}

/// Production adapter speaking HTTP to the Finnhub REST API.
#[derive(Clone)]
pub struct RealAdapter {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl RealAdapter {
    /// Build an adapter with its own HTTP client using `cfg.timeout`.
    ///
    /// # Errors
    /// Returns `Config` when the base URL is invalid and `Provider` when the
    /// HTTP client cannot be constructed.
    pub fn new(cfg: &FinnhubConfig) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| SyncError::provider(PROVIDER, e.to_string()))?;
        Self::with_client(http, cfg)
    }

    /// Build an adapter around an existing `reqwest::Client`.
    ///
    /// # Errors
    /// Returns `Config` when the base URL is invalid.
    pub fn with_client(http: reqwest::Client, cfg: &FinnhubConfig) -> Result<Self, SyncError> {
        let mut raw = cfg.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base = Url::parse(&raw)
            .map_err(|e| SyncError::Config(format!("invalid Finnhub base url {raw}: {e}")))?;
        Ok(Self {
            http,
            base,
            token: cfg.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, SyncError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| SyncError::Config(format!("invalid Finnhub endpoint {path}: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("token", &self.token);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SyncError> {
        // Errors are stripped of their URL so the token never reaches logs or alerts.
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::provider(PROVIDER, e.without_url().to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::provider(
                PROVIDER,
                format!("HTTP {status}: {}", body.trim()),
            ));
        }
        resp.json::<T>().await.map_err(|e| {
            SyncError::provider(PROVIDER, format!("malformed response: {}", e.without_url()))
        })
    }
}

#[async_trait]
impl FinnhubCandles for RealAdapter {
    async fn candles(&self, req: CandleRequest) -> Result<CandlePayload, SyncError> {
        let url = self.endpoint(
            "stock/candle",
            &[
                ("symbol", req.symbol),
                ("resolution", req.resolution.to_string()),
                ("from", req.from.to_string()),
                ("to", req.to.to_string()),
            ],
        )?;
        self.get_json(url).await
    }
}

#[async_trait]
impl FinnhubSplits for RealAdapter {
    async fn splits(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SplitPayload>, SyncError> {
        let url = self.endpoint(
            "stock/split",
            &[
                ("symbol", symbol.to_string()),
                ("from", from.format("%Y-%m-%d").to_string()),
                ("to", to.format("%Y-%m-%d").to_string()),
            ],
        )?;
        self.get_json(url).await
    }
}

impl dyn FinnhubCandles {
    /// Build a `FinnhubCandles` from a closure, for tests.
    pub fn from_fn<F>(f: F) -> Arc<dyn FinnhubCandles>
    where
        F: Send + Sync + 'static + Fn(CandleRequest) -> Result<CandlePayload, SyncError>,
    {
        struct FnCandles<F>(F);
        #[async_trait]
        impl<F> FinnhubCandles for FnCandles<F>
        where
            F: Send + Sync + 'static + Fn(CandleRequest) -> Result<CandlePayload, SyncError>,
        {
            async fn candles(&self, req: CandleRequest) -> Result<CandlePayload, SyncError> {
                (self.0)(req)
            }
        }
        Arc::new(FnCandles(f))
    }
}

impl dyn FinnhubSplits {
    /// Build a `FinnhubSplits` from a closure, for tests.
    pub fn from_fn<F>(f: F) -> Arc<dyn FinnhubSplits>
    where
        F: Send
            + Sync
            + 'static
            + Fn(String, NaiveDate, NaiveDate) -> Result<Vec<SplitPayload>, SyncError>,
    {
        struct FnSplits<F>(F);
        #[async_trait]
        impl<F> FinnhubSplits for FnSplits<F>
        where
            F: Send
                + Sync
                + 'static
                + Fn(String, NaiveDate, NaiveDate) -> Result<Vec<SplitPayload>, SyncError>,
        {
            async fn splits(
                &self,
                symbol: &str,
                from: NaiveDate,
                to: NaiveDate,
            ) -> Result<Vec<SplitPayload>, SyncError> {
                (self.0)(symbol.to_string(), from, to)
            }
        }
        Arc::new(FnSplits(f))
    }
}
