//! Simulated broker: market orders filled at the next bar's open.
//!
//! Orders placed during bar t are queued and executed when the symbol's next
//! bar arrives, at that bar's open. Commission is a fraction of traded
//! notional. Fractional sizes are allowed; short sales credit cash. A fill
//! that would buy with money the account does not have is rejected.

use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::portfolio::Portfolio;
use super::position::SIZE_EPSILON;
use crate::ports::broker_port::{BrokerPort, MarketView};

/// Commission for a trade of the given notional: `|notional| * rate`.
pub fn calculate_commission(notional: f64, rate: f64) -> f64 {
    notional.abs() * rate
}

/// Split a move from `current` to `target` into legs that never cross zero.
pub fn fill_legs(current: f64, target: f64) -> Vec<f64> {
    let crosses = current * target < 0.0;
    if crosses {
        vec![-current, target]
    } else {
        vec![target - current]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    Filled {
        symbol: String,
        delta: f64,
        price: f64,
        commission: f64,
    },
    Rejected {
        symbol: String,
        delta: f64,
        required: f64,
        available: f64,
    },
    /// Target equals the current size.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct SimBroker {
    portfolio: Portfolio,
    commission_rate: f64,
    pending: BTreeMap<String, f64>,
    last_prices: BTreeMap<String, f64>,
    rejected: usize,
}

impl SimBroker {
    pub fn new(initial_capital: f64, commission_rate: f64) -> Self {
        SimBroker {
            portfolio: Portfolio::new(initial_capital),
            commission_rate,
            pending: BTreeMap::new(),
            last_prices: BTreeMap::new(),
            rejected: 0,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn into_portfolio(self) -> Portfolio {
        self.portfolio
    }

    pub fn pending_orders(&self) -> &BTreeMap<String, f64> {
        &self.pending
    }

    pub fn rejected_orders(&self) -> usize {
        self.rejected
    }

    /// Execute every queued order whose symbol has a bar in `view`. Orders for
    /// symbols without a bar stay queued.
    pub fn execute_pending(&mut self, view: &MarketView<'_>) -> Vec<FillOutcome> {
        let ready: Vec<(String, f64, f64)> = self
            .pending
            .iter()
            .filter_map(|(symbol, &target)| {
                view.bars
                    .get(symbol.as_str())
                    .map(|r| (symbol.clone(), target, r.bar.open))
            })
            .collect();

        let mut outcomes = Vec::with_capacity(ready.len());
        for (symbol, target, open) in ready {
            self.pending.remove(&symbol);
            let outcome = self.fill(&symbol, target, open, view.timestamp);
            if let FillOutcome::Rejected {
                ref symbol,
                delta,
                required,
                available,
            } = outcome
            {
                self.rejected += 1;
                warn!(
                    %symbol,
                    delta,
                    required,
                    available,
                    "order rejected: insufficient cash"
                );
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    fn fill(&mut self, symbol: &str, target: f64, price: f64, at: DateTime<Tz>) -> FillOutcome {
        let current = self.portfolio.position_size(symbol);
        let delta = target - current;
        if delta.abs() < SIZE_EPSILON {
            return FillOutcome::Unchanged;
        }

        let commission = calculate_commission(delta * price, self.commission_rate);
        let cash_after = self.portfolio.cash - delta * price - commission;
        if delta > 0.0 && cash_after < 0.0 {
            return FillOutcome::Rejected {
                symbol: symbol.to_string(),
                delta,
                required: delta * price + commission,
                available: self.portfolio.cash,
            };
        }

        for leg in fill_legs(current, target) {
            let leg_commission = calculate_commission(leg * price, self.commission_rate);
            self.portfolio
                .apply_fill(symbol, leg, price, leg_commission, at);
        }

        debug!(%symbol, delta, price, commission, "filled");
        FillOutcome::Filled {
            symbol: symbol.to_string(),
            delta,
            price,
            commission,
        }
    }

    /// Update the latest known close of every symbol in `view`.
    pub fn mark(&mut self, view: &MarketView<'_>) {
        for (symbol, r) in &view.bars {
            self.last_prices.insert(symbol.to_string(), r.bar.close);
        }
    }

    pub fn record_equity(&mut self, timestamp: DateTime<Tz>) {
        let value = self.portfolio_value();
        self.portfolio.record_equity(timestamp, value);
    }
}

impl BrokerPort for SimBroker {
    fn cash(&self) -> f64 {
        self.portfolio.cash
    }

    fn portfolio_value(&self) -> f64 {
        self.portfolio.total_equity(&self.last_prices)
    }

    fn position_size(&self, symbol: &str) -> f64 {
        self.portfolio.position_size(symbol)
    }

    fn order_target_size(&mut self, symbol: &str, size: f64) {
        self.pending.insert(symbol.to_string(), size);
    }
}
