//! OHLCV bar representation.

use chrono::DateTime;
use chrono_tz::Tz;

/// One symbol's observation over one interval. Timestamps always carry a zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Tz>,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub trade_count: i64,
    pub vwap: f64,
}

impl Bar {
    /// Same instant expressed in `tz`.
    pub fn in_timezone(&self, tz: Tz) -> Bar {
        Bar {
            timestamp: self.timestamp.with_timezone(&tz),
            ..self.clone()
        }
    }
}
