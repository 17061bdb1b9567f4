//! Bar and split rows as exchanged with providers and storage.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV observation for a symbol at a given instant.
///
/// Identity is `(symbol, ts)`; storage never holds two bars with the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Ticker symbol.
    pub symbol: String,
    /// Bar open instant (UTC). Day-aligned for daily tables, minute-aligned for intraday.
    pub ts: DateTime<Utc>,
    /// Opening price.
    pub open: Decimal,
    /// Highest traded price.
    pub high: Decimal,
    /// Lowest traded price.
    pub low: Decimal,
    /// Closing price.
    pub close: Decimal,
    /// Traded share count.
    pub volume: u64,
    /// Provider status tag attached to the row (for example `ok`).
    pub status: String,
}

impl Bar {
    /// Identity key of the bar.
    #[must_use]
    pub fn key(&self) -> (&str, DateTime<Utc>) {
        (self.symbol.as_str(), self.ts)
    }
}

/// Origin of a [`SplitRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitSource {
    /// Confirmed by the market-data provider.
    Provider,
    /// Inferred locally from a volume discontinuity; ratio unknown.
    Detected,
}

impl SplitSource {
    /// Stable label used when persisting the record.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Detected => "detected",
        }
    }

    /// Parse a persisted label back into a source.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "provider" => Some(Self::Provider),
            "detected" | "detect" => Some(Self::Detected),
            _ => None,
        }
    }
}

/// A split event for a symbol. Identity is `(symbol, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRecord {
    /// Ticker symbol.
    pub symbol: String,
    /// Effective calendar date of the split.
    pub date: NaiveDate,
    /// Share count before the split; `0` when unknown.
    pub from_factor: u32,
    /// Share count after the split; `0` when unknown.
    pub to_factor: u32,
    /// Where the record came from.
    pub source: SplitSource,
}

impl SplitRecord {
    /// Identity key of the record.
    #[must_use]
    pub fn key(&self) -> (&str, NaiveDate) {
        (self.symbol.as_str(), self.date)
    }

    /// Placeholder for a split inferred locally on `date`, ratio unknown.
    #[must_use]
    pub fn detected(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            from_factor: 0,
            to_factor: 0,
            source: SplitSource::Detected,
        }
    }

    /// True when the ratio is the `0/0` placeholder.
    #[must_use]
    pub const fn ratio_unknown(&self) -> bool {
        self.from_factor == 0 && self.to_factor == 0
    }
}
