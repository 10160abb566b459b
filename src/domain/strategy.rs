//! Cross-sectional mean-reversion strategy driven bar by bar.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::domain::dataset::MultiSymbolDataset;
use crate::domain::indicator::{self, Observation};
use crate::domain::portfolio::EquityPoint;
use crate::domain::rebalance::{self, DEFAULT_NO_TRADE_BAND, Holding, TargetPosition};
use crate::domain::signal::{self, SignalConfig, SignalOutcome, SkipReason};
use crate::ports::broker_port::{BarStrategy, BrokerPort, MarketView};

pub const DEFAULT_REBALANCE_INTERVAL: usize = 1;
pub const DEFAULT_VOL_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    /// Rebalance every N bars.
    pub rebalance_interval: usize,
    /// Look-back of the rolling volatility, in bars.
    pub vol_window: usize,
    pub no_trade_band: f64,
    pub signal: SignalConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            rebalance_interval: DEFAULT_REBALANCE_INTERVAL,
            vol_window: DEFAULT_VOL_WINDOW,
            no_trade_band: DEFAULT_NO_TRADE_BAND,
            signal: SignalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebalanceStats {
    pub events: usize,
    pub skipped: usize,
    pub orders: usize,
}

#[derive(Debug, Clone)]
pub struct CrossSectionalStrategy {
    config: StrategyConfig,
    observations: BTreeMap<String, Vec<Observation>>,
    bar_count: usize,
    values: Vec<EquityPoint>,
    stats: RebalanceStats,
}

impl CrossSectionalStrategy {
    /// Indicators are computed up front for every series in `dataset`.
    pub fn new(config: StrategyConfig, dataset: &MultiSymbolDataset) -> Self {
        let observations = dataset
            .series
            .iter()
            .map(|(symbol, series)| {
                (symbol.clone(), indicator::observations(series, config.vol_window))
            })
            .collect::<BTreeMap<_, _>>();

        info!(
            symbols = observations.len(),
            rebalance_interval = config.rebalance_interval,
            vol_window = config.vol_window,
            z_threshold = config.signal.z_threshold,
            no_trade_band = config.no_trade_band,
            return_transform = %config.signal.return_transform,
            "strategy initialised"
        );

        CrossSectionalStrategy {
            config,
            observations,
            bar_count: 0,
            values: Vec::new(),
            stats: RebalanceStats::default(),
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// One `(timestamp, portfolio value)` point per bar seen, warm-up included.
    pub fn values(&self) -> &[EquityPoint] {
        &self.values
    }

    pub fn into_values(self) -> Vec<EquityPoint> {
        self.values
    }

    pub fn bars_processed(&self) -> usize {
        self.bar_count
    }

    pub fn stats(&self) -> RebalanceStats {
        self.stats
    }

    fn is_rebalance_bar(&self) -> bool {
        self.bar_count % self.config.rebalance_interval.max(1) == 0
    }

    /// Observations of the symbols that have a bar in `view`.
    fn current_observations(&self, view: &MarketView<'_>) -> BTreeMap<String, Observation> {
        view.bars
            .iter()
            .filter_map(|(symbol, r)| {
                let obs = self.observations.get(*symbol)?.get(r.index)?;
                Some((symbol.to_string(), *obs))
            })
            .collect()
    }

    fn rebalance(
        &mut self,
        weights: &BTreeMap<String, f64>,
        view: &MarketView<'_>,
        broker: &mut dyn BrokerPort,
    ) {
        let holdings: BTreeMap<String, Holding> = weights
            .keys()
            .map(|symbol| {
                let holding = Holding {
                    size: broker.position_size(symbol),
                    price: view.close(symbol),
                };
                (symbol.clone(), holding)
            })
            .collect();

        let targets = rebalance::rebalance(
            weights,
            broker.portfolio_value(),
            &holdings,
            self.config.no_trade_band,
        );

        for (symbol, target) in targets {
            if let TargetPosition::Resize { from, to } = target {
                debug!(%symbol, from, to, "order target size");
                broker.order_target_size(&symbol, to);
                self.stats.orders += 1;
            }
        }
    }
}

impl BarStrategy for CrossSectionalStrategy {
    fn on_bar(&mut self, view: &MarketView<'_>, broker: &mut dyn BrokerPort) {
        self.values.push(EquityPoint {
            timestamp: view.timestamp,
            value: broker.portfolio_value(),
        });

        self.bar_count += 1;
        if !self.is_rebalance_bar() {
            return;
        }
        self.stats.events += 1;

        let observations = self.current_observations(view);
        match signal::compute_weights(&observations, &self.config.signal) {
            SignalOutcome::Rebalance(weights) => self.rebalance(&weights, view, broker),
            SignalOutcome::Skip(reason) => {
                self.stats.skipped += 1;
                match reason {
                    SkipReason::NonPositiveReturn { .. } => {
                        warn!(timestamp = %view.timestamp, %reason, "rebalance skipped")
                    }
                    _ => debug!(timestamp = %view.timestamp, %reason, "rebalance skipped"),
                }
            }
        }
    }

    fn on_finish(&mut self, broker: &dyn BrokerPort) {
        info!(
            final_value = %format!("{:.2}", broker.portfolio_value()),
            bars = self.bar_count,
            rebalances = self.stats.events - self.stats.skipped,
            skipped = self.stats.skipped,
            orders = self.stats.orders,
            "strategy finished"
        );
    }
}
