//! OHLCV resampling onto a coarser, timezone-local calendar.
//!
//! Bars are converted to the target zone, optionally restricted to regular
//! market hours (09:00-16:00 local, Monday to Friday), then grouped by
//! `(symbol, bucket start)` and aggregated:
//! open = first, high = max, low = min, close = last,
//! volume and trade_count = sum, vwap = arithmetic mean.
//! Buckets without input bars are never synthesised.

use crate::domain::bar::Bar;
use crate::domain::frequency::Frequency;
use chrono::{DateTime, Datelike, Timelike, Weekday};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use tracing::debug;

pub const MARKET_OPEN_HOUR: u32 = 9;
pub const MARKET_CLOSE_HOUR: u32 = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct ResampleConfig {
    pub frequency: Frequency,
    pub market_hours_only: bool,
    pub timezone: Tz,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        ResampleConfig {
            frequency: Frequency::daily(),
            market_hours_only: true,
            timezone: chrono_tz::UTC,
        }
    }
}

/// True when `ts` falls on a weekday within `[09:00, 16:00)` of its own zone.
pub fn is_market_hours(ts: &DateTime<Tz>) -> bool {
    let hour = ts.hour();
    let weekend = matches!(ts.weekday(), Weekday::Sat | Weekday::Sun);
    !weekend && (MARKET_OPEN_HOUR..MARKET_CLOSE_HOUR).contains(&hour)
}

struct BucketAccumulator {
    first: Bar,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
    trade_count: i64,
    vwap_sum: f64,
    count: usize,
}

impl BucketAccumulator {
    fn start(bar: Bar) -> Self {
        BucketAccumulator {
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            trade_count: bar.trade_count,
            vwap_sum: bar.vwap,
            count: 1,
            first: bar,
        }
    }

    fn push(&mut self, bar: &Bar) {
        self.high = self.high.max(bar.high);
        self.low = self.low.min(bar.low);
        self.close = bar.close;
        self.volume += bar.volume;
        self.trade_count += bar.trade_count;
        self.vwap_sum += bar.vwap;
        self.count += 1;
    }

    fn finish(self, bucket: DateTime<Tz>) -> Bar {
        Bar {
            timestamp: bucket,
            symbol: self.first.symbol,
            open: self.first.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            trade_count: self.trade_count,
            vwap: self.vwap_sum / self.count as f64,
        }
    }
}

/// Resample a flat multi-symbol bar table. Output is sorted by
/// `(symbol, bucket start)` with timestamps in `config.timezone`.
pub fn resample(bars: &[Bar], config: &ResampleConfig) -> Vec<Bar> {
    let mut local: Vec<Bar> = bars
        .iter()
        .map(|b| b.in_timezone(config.timezone))
        .filter(|b| !config.market_hours_only || is_market_hours(&b.timestamp))
        .collect();

    debug!(
        input = bars.len(),
        kept = local.len(),
        frequency = %config.frequency,
        "filtered bars before bucketing"
    );

    // first/last must be chronological within each group
    local.sort_by(|a, b| {
        a.symbol
            .cmp(&b.symbol)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });

    let mut groups: BTreeMap<(String, DateTime<Tz>), BucketAccumulator> = BTreeMap::new();
    for bar in local {
        let bucket = config.frequency.truncate(&bar.timestamp);
        match groups.get_mut(&(bar.symbol.clone(), bucket)) {
            Some(acc) => acc.push(&bar),
            None => {
                groups.insert((bar.symbol.clone(), bucket), BucketAccumulator::start(bar));
            }
        }
    }

    groups
        .into_iter()
        .map(|((_, bucket), acc)| acc.finish(bucket))
        .collect()
}
