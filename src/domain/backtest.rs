//! Event loop over the unified timeline.
//!
//! Per timestamp: fill orders queued on the previous step at this bar's open,
//! mark positions to the close, run the strategy callback, record equity.

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::domain::dataset::MultiSymbolDataset;
use crate::domain::error::CrossrevError;
use crate::domain::execution::{FillOutcome, SimBroker};
use crate::domain::portfolio::Portfolio;
use crate::ports::broker_port::{BarRef, BarStrategy, MarketView};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Fraction of traded notional, e.g. 0.001 for 10 bps.
    pub commission: f64,
    pub risk_free_rate: f64,
    /// Inclusive, local date of the bar.
    pub start: Option<NaiveDate>,
    /// Exclusive, local date of the bar.
    pub end: Option<NaiveDate>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            commission: 0.001,
            risk_free_rate: 0.01,
            start: None,
            end: None,
        }
    }
}

impl BacktestConfig {
    pub fn in_window(&self, timestamp: &DateTime<Tz>) -> bool {
        let date = timestamp.date_naive();
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date < e)
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    pub bars_processed: usize,
    pub fills: usize,
    pub rejected_orders: usize,
    /// Orders still queued when the data ran out.
    pub unfilled_orders: usize,
}

impl BacktestResult {
    pub fn final_value(&self) -> f64 {
        self.portfolio
            .equity_curve
            .last()
            .map_or(self.portfolio.initial_capital, |p| p.value)
    }
}

/// Run `strategy` over every timestamp of `dataset`.
pub fn run_backtest<S: BarStrategy>(
    dataset: &MultiSymbolDataset,
    strategy: &mut S,
    config: &BacktestConfig,
) -> Result<BacktestResult, CrossrevError> {
    if dataset.is_empty() {
        return Err(CrossrevError::NoData {
            reason: "dataset has no symbols".to_string(),
        });
    }

    let timeline = dataset.timeline();
    info!(
        symbols = dataset.series.len(),
        steps = timeline.len(),
        initial_capital = config.initial_capital,
        commission = config.commission,
        "running backtest"
    );

    let mut broker = SimBroker::new(config.initial_capital, config.commission);
    let mut fills = 0usize;

    for timestamp in &timeline {
        let bars = dataset
            .series
            .iter()
            .filter_map(|(symbol, series)| {
                let index = series.bar_index(timestamp)?;
                Some((
                    symbol.as_str(),
                    BarRef {
                        bar: &series.bars[index],
                        index,
                    },
                ))
            })
            .collect();
        let view = MarketView {
            timestamp: *timestamp,
            bars,
        };

        fills += broker
            .execute_pending(&view)
            .iter()
            .filter(|o| matches!(o, FillOutcome::Filled { .. }))
            .count();
        broker.mark(&view);
        strategy.on_bar(&view, &mut broker);
        broker.record_equity(*timestamp);
    }

    strategy.on_finish(&broker);

    let unfilled_orders = broker.pending_orders().len();
    if unfilled_orders > 0 {
        debug!(unfilled_orders, "orders left in queue at end of data");
    }
    let rejected_orders = broker.rejected_orders();

    Ok(BacktestResult {
        portfolio: broker.into_portfolio(),
        bars_processed: timeline.len(),
        fills,
        rejected_orders,
        unfilled_orders,
    })
}
