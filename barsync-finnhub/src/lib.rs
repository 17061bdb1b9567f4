//! barsync-finnhub
//!
//! [`DataSource`] implementation backed by the Finnhub REST API: daily (`D`)
//! and one-minute (`1`) candles plus stock splits. Intraday requests are cut
//! into windows of at most [`FinnhubConfig::intraday_chunk`] and stitched
//! back together.
//!
//! The source does not space its calls; wrap it with
//! `barsync_middleware::ThrottledSource` to stay under the provider's limits.
#![warn(missing_docs)]

/// Adapter definitions and the production adapter backed by `reqwest`.
pub mod adapter;
mod config;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use adapter::{
    CandlePayload, CandleRequest, FinnhubCandles, FinnhubSplits, PROVIDER, RealAdapter,
    SplitPayload,
};
use barsync_core::{
    Bar, DataSource, Resolution, SplitRecord, SplitSource, SyncError, merge_bars,
};

pub use config::FinnhubConfig;

/// Finnhub-backed market-data source.
pub struct FinnhubSource {
    candles: Arc<dyn FinnhubCandles>,
    splits: Arc<dyn FinnhubSplits>,
    intraday_chunk_secs: i64,
}

impl FinnhubSource {
    /// Build a source talking to the real API.
    ///
    /// # Errors
    /// Returns `Config` when the API key is empty or the base URL is invalid.
    pub fn new(cfg: &FinnhubConfig) -> Result<Self, SyncError> {
        if cfg.api_key.trim().is_empty() {
            return Err(SyncError::Config("Finnhub API key is empty".into()));
        }
        let adapter = Arc::new(RealAdapter::new(cfg)?);
        Ok(Self::from_adapters(
            adapter.clone(),
            adapter,
            cfg.intraday_chunk,
        ))
    }

    /// Build from explicit endpoint adapters (used for injection in tests).
    #[must_use]
    pub fn from_adapters(
        candles: Arc<dyn FinnhubCandles>,
        splits: Arc<dyn FinnhubSplits>,
        intraday_chunk: Duration,
    ) -> Self {
        Self {
            candles,
            splits,
            intraday_chunk_secs: i64::try_from(intraday_chunk.as_secs())
                .unwrap_or(i64::MAX)
                .max(1),
        }
    }

    fn windows(&self, from: i64, to: i64, resolution: Resolution) -> Vec<(i64, i64)> {
        if resolution == Resolution::Daily {
            return vec![(from, to)];
        }
        let mut out = Vec::new();
        let mut start = from;
        while start <= to {
            let end = start.saturating_add(self.intraday_chunk_secs).min(to);
            out.push((start, end));
            if end >= to {
                break;
            }
            start = end + 1;
        }
        out
    }
}

const fn resolution_code(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::Daily => "D",
        Resolution::Intraday => "1",
    }
}

fn price(value: f64, field: &str) -> Result<Decimal, SyncError> {
    Decimal::try_from(value)
        .map_err(|e| SyncError::provider(PROVIDER, format!("invalid {field} price {value}: {e}")))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn whole(value: f64, what: &str) -> Result<u64, SyncError> {
    if !value.is_finite() || value < 0.0 || value > u64::MAX as f64 {
        return Err(SyncError::provider(PROVIDER, format!("invalid {what} {value}")));
    }
    Ok(value.round() as u64)
}

/// Convert a candle payload into bars, ascending and unique by timestamp.
///
/// # Errors
/// Returns `Provider` for a status other than `ok`/`no_data`, for parallel
/// arrays of different lengths and for values that cannot be represented.
pub fn parse_candles(symbol: &str, payload: CandlePayload) -> Result<Vec<Bar>, SyncError> {
    match payload.s.as_str() {
        "no_data" => return Ok(Vec::new()),
        "ok" => {}
        other => {
            return Err(SyncError::provider(
                PROVIDER,
                format!("unexpected candle status {other:?} for {symbol}"),
            ));
        }
    }
    let n = payload.t.len();
    let lens = [
        payload.o.len(),
        payload.h.len(),
        payload.l.len(),
        payload.c.len(),
        payload.v.len(),
    ];
    if lens.iter().any(|l| *l != n) {
        return Err(SyncError::provider(
            PROVIDER,
            format!("candle arrays for {symbol} have mismatched lengths"),
        ));
    }

    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let ts = DateTime::from_timestamp(payload.t[i], 0).ok_or_else(|| {
            SyncError::provider(PROVIDER, format!("invalid timestamp {}", payload.t[i]))
        })?;
        bars.push(Bar {
            symbol: symbol.to_string(),
            ts,
            open: price(payload.o[i], "open")?,
            high: price(payload.h[i], "high")?,
            low: price(payload.l[i], "low")?,
            close: price(payload.c[i], "close")?,
            volume: whole(payload.v[i], "volume")?,
            status: payload.s.clone(),
        });
    }
    Ok(merge_bars([bars]))
}

/// Convert split payload entries into provider split records for `symbol`.
///
/// # Errors
/// Returns `Provider` when a factor is negative, non-finite or too large.
pub fn parse_splits(
    symbol: &str,
    payload: Vec<SplitPayload>,
) -> Result<Vec<SplitRecord>, SyncError> {
    payload
        .into_iter()
        .map(|p| {
            let from_factor = u32::try_from(whole(p.from_factor, "split factor")?)
                .map_err(|e| SyncError::provider(PROVIDER, e.to_string()))?;
            let to_factor = u32::try_from(whole(p.to_factor, "split factor")?)
                .map_err(|e| SyncError::provider(PROVIDER, e.to_string()))?;
            Ok(SplitRecord {
                symbol: symbol.to_string(),
                date: p.date,
                from_factor,
                to_factor,
                source: SplitSource::Provider,
            })
        })
        .collect()
}

#[async_trait]
impl DataSource for FinnhubSource {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "barsync::finnhub::candles",
            skip_all,
            fields(symbol = %symbol, resolution = %resolution),
        )
    )]
    async fn fetch_bars(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        resolution: Resolution,
    ) -> Result<Vec<Bar>, SyncError> {
        if from > to {
            return Err(SyncError::InvalidArg(format!(
                "empty window {from} .. {to} for {symbol}"
            )));
        }
        let windows = self.windows(from.timestamp(), to.timestamp(), resolution);
        let mut chunks = Vec::with_capacity(windows.len());
        for (start, end) in windows {
            let payload = self
                .candles
                .candles(CandleRequest {
                    symbol: symbol.to_string(),
                    resolution: resolution_code(resolution),
                    from: start,
                    to: end,
                })
                .await?;
            chunks.push(parse_candles(symbol, payload)?);
        }
        let mut bars = merge_bars(chunks);
        bars.retain(|b| b.ts >= from && b.ts <= to);
        #[cfg(feature = "tracing")]
        tracing::debug!(rows = bars.len(), "candles fetched");
        Ok(bars)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "barsync::finnhub::splits", skip_all, fields(symbol = %symbol))
    )]
    async fn fetch_splits(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SplitRecord>, SyncError> {
        let (from, to) = (from.date_naive(), to.date_naive());
        let raw = self.splits.splits(symbol, from, to).await?;
        let mut records = parse_splits(symbol, raw)?;
        records.retain(|r| r.date >= from && r.date <= to);
        Ok(records)
    }
}
