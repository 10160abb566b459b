//! Per-bar indicators feeding the signal engine.
//!
//! - `IndicatorKind`: indicator identity + parameters
//! - `IndicatorSeries`: one optional value per bar; `None` during warmup
//! - `Observation`: the (return, volatility) pair the signal engine consumes

pub mod roc;
pub mod stddev;

use crate::domain::dataset::BarSeries;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Roc(usize),
    Stddev(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub kind: IndicatorKind,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Roc(period) => write!(f, "ROC({})", period),
            IndicatorKind::Stddev(period) => write!(f, "STDDEV({})", period),
        }
    }
}

/// Single-period return and rolling volatility of one symbol at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Observation {
    pub ret: Option<f64>,
    pub vol: Option<f64>,
}

impl Observation {
    pub fn is_complete(&self) -> bool {
        matches!((self.ret, self.vol), (Some(r), Some(v)) if r.is_finite() && v.is_finite())
    }
}

/// Observations aligned with `series.bars`: ROC(1) of close and the population
/// standard deviation of the last `vol_window` returns.
pub fn observations(series: &BarSeries, vol_window: usize) -> Vec<Observation> {
    let returns = roc::calculate_roc(&series.closes(), 1);
    let vols = stddev::calculate_stddev(&returns.values, vol_window);

    returns
        .values
        .iter()
        .zip(vols.values.iter())
        .map(|(&ret, &vol)| Observation { ret, vol })
        .collect()
}
