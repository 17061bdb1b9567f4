use std::collections::{BTreeMap, btree_map::Entry};

use chrono::{DateTime, Utc};

use crate::Bar;

/// Merge several bar series for one symbol into a single ascending series.
///
/// - Bars are keyed by `ts`; the first appearance wins for duplicates.
/// - The result is sorted by timestamp regardless of input order.
pub fn merge_bars<I>(series: I) -> Vec<Bar>
where
    I: IntoIterator<Item = Vec<Bar>>,
{
    let mut map: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
    for s in series {
        for b in s {
            if let Entry::Vacant(v) = map.entry(b.ts) {
                v.insert(b);
            }
        }
    }
    map.into_values().collect()
}

/// Index of the bar whose timestamp equals `ts` exactly.
#[must_use]
pub fn position_of(bars: &[Bar], ts: DateTime<Utc>) -> Option<usize> {
    bars.iter().position(|b| b.ts == ts)
}

/// Bars strictly after `ts`, in input order.
pub fn strictly_after(bars: Vec<Bar>, ts: DateTime<Utc>) -> Vec<Bar> {
    bars.into_iter().filter(|b| b.ts > ts).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn bar(ts: i64, volume: u64) -> Bar {
        Bar {
            symbol: "AAA".into(),
            ts: Utc.timestamp_opt(ts, 0).unwrap(),
            open: Decimal::ONE,
            high: Decimal::ONE,
            low: Decimal::ONE,
            close: Decimal::ONE,
            volume,
            status: "ok".into(),
        }
    }

    #[test]
    fn merge_keeps_first_duplicate_and_sorts() {
        let merged = merge_bars(vec![vec![bar(120, 1), bar(60, 1)], vec![bar(60, 9), bar(180, 2)]]);
        let ts: Vec<i64> = merged.iter().map(|b| b.ts.timestamp()).collect();
        assert_eq!(ts, vec![60, 120, 180]);
        assert_eq!(merged[0].volume, 1);
    }

    #[test]
    fn strictly_after_drops_boundary() {
        let t = Utc.timestamp_opt(60, 0).unwrap();
        let rest = strictly_after(vec![bar(0, 1), bar(60, 1), bar(120, 1)], t);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].ts.timestamp(), 120);
        assert_eq!(position_of(&[bar(0, 1), bar(60, 1)], t), Some(1));
    }
}
