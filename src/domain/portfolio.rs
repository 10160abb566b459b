//! Cash, positions and the value series.

use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::BTreeMap;
use tracing::debug;

use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Tz>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: BTreeMap<String, Position>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn position_size(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.size)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Book one fill leg. The leg must not cross zero; a flip is booked as a
    /// closing leg followed by an opening leg. Buying debits cash, selling
    /// (including short sales) credits it.
    pub fn apply_fill(
        &mut self,
        symbol: &str,
        delta: f64,
        price: f64,
        commission: f64,
        at: DateTime<Tz>,
    ) {
        self.cash -= delta * price + commission;

        let Some(position) = self.positions.get_mut(symbol) else {
            self.positions
                .insert(symbol.to_string(), Position::open(symbol, delta, price, commission, at));
            return;
        };

        position.apply(delta, price, commission);
        if position.is_flat() {
            if let Some(position) = self.positions.remove(symbol) {
                let trade = position.close(price, at);
                debug!(%symbol, pnl = trade.pnl, closed_at = %at, "trade closed");
                self.closed_trades.push(trade);
            }
        }
    }

    pub fn record_equity(&mut self, timestamp: DateTime<Tz>, value: f64) {
        self.equity_curve.push(EquityPoint { timestamp, value });
    }

    /// Positions without a price contribute nothing.
    pub fn total_equity(&self, prices: &BTreeMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .filter_map(|pos| prices.get(&pos.symbol).map(|&p| pos.market_value(p)))
            .sum();
        self.cash + position_value
    }
}
