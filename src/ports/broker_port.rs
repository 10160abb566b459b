//! Contract between a per-bar strategy and whatever executes its orders.

use crate::domain::bar::Bar;
use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::BTreeMap;

/// Order and ledger access offered to a strategy.
///
/// Orders are requests: the implementation decides when and at what price
/// they fill. A later request for the same symbol replaces an earlier
/// unfilled one.
pub trait BrokerPort {
    fn cash(&self) -> f64;

    /// Cash plus positions marked at the latest known prices.
    fn portfolio_value(&self) -> f64;

    /// Signed size; zero when flat.
    fn position_size(&self, symbol: &str) -> f64;

    fn order_target_size(&mut self, symbol: &str, size: f64);
}

/// A bar together with its position in its symbol's series.
#[derive(Debug, Clone, Copy)]
pub struct BarRef<'a> {
    pub bar: &'a Bar,
    pub index: usize,
}

/// The market at one step of the unified timeline. Only symbols with a bar
/// at `timestamp` are present.
#[derive(Debug, Clone)]
pub struct MarketView<'a> {
    pub timestamp: DateTime<Tz>,
    pub bars: BTreeMap<&'a str, BarRef<'a>>,
}

impl MarketView<'_> {
    pub fn close(&self, symbol: &str) -> Option<f64> {
        self.bars.get(symbol).map(|r| r.bar.close)
    }
}

pub trait BarStrategy {
    fn on_bar(&mut self, view: &MarketView<'_>, broker: &mut dyn BrokerPort);

    fn on_finish(&mut self, _broker: &dyn BrokerPort) {}
}
