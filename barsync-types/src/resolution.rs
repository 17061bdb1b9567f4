use core::fmt;
use serde::{Deserialize, Serialize};

/// Time granularity of a stored bar table.
///
/// Each resolution is synchronized by its own pass and has its own freshness
/// threshold and maximal history window (see [`crate::SyncConfig`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// One bar per trading day.
    Daily,
    /// Minute-level bars.
    Intraday,
}

impl Resolution {
    /// Both resolutions in pass order.
    pub const ALL: [Self; 2] = [Self::Daily, Self::Intraday];

    /// Stable lowercase label used in logs and alert messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Intraday => "intraday",
        }
    }

    /// Whether symbols with no provider coverage are tracked on the skip-list.
    #[must_use]
    pub const fn uses_skip_list(self) -> bool {
        matches!(self, Self::Intraday)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
