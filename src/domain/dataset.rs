//! Per-symbol bar series, the multi-symbol dataset and its unified timeline.

use crate::domain::bar::Bar;
use crate::domain::error::CrossrevError;
use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct BarSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
    index: HashMap<DateTime<Tz>, usize>,
}

impl BarSeries {
    /// Build a series; timestamps must be strictly increasing.
    pub fn new(symbol: String, bars: Vec<Bar>) -> Result<Self, CrossrevError> {
        let increasing = bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp);
        if !increasing {
            return Err(CrossrevError::NonChronological { symbol });
        }
        let index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.timestamp, i))
            .collect();
        Ok(Self {
            symbol,
            bars,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bar_index(&self, timestamp: &DateTime<Tz>) -> Option<usize> {
        self.index.get(timestamp).copied()
    }

    pub fn get_bar(&self, timestamp: &DateTime<Tz>) -> Option<&Bar> {
        self.bar_index(timestamp).map(|i| &self.bars[i])
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// Symbol → series, ordered by symbol.
#[derive(Debug, Clone, Default)]
pub struct MultiSymbolDataset {
    pub series: BTreeMap<String, BarSeries>,
}

impl MultiSymbolDataset {
    /// Group a flat bar table by symbol. Within each symbol the input order must
    /// already be chronological.
    pub fn from_bars(bars: Vec<Bar>) -> Result<Self, CrossrevError> {
        let mut grouped: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
        for bar in bars {
            grouped.entry(bar.symbol.clone()).or_default().push(bar);
        }

        let series = grouped
            .into_iter()
            .map(|(symbol, bars)| BarSeries::new(symbol.clone(), bars).map(|s| (symbol, s)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self { series })
    }

    pub fn symbols(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }

    pub fn get(&self, symbol: &str) -> Option<&BarSeries> {
        self.series.get(symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn bar_count(&self) -> usize {
        self.series.values().map(BarSeries::len).sum()
    }

    /// Keep only the series for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.series.retain(|symbol, _| keep(symbol));
    }

    /// Sorted, de-duplicated timestamps across every series.
    pub fn timeline(&self) -> Vec<DateTime<Tz>> {
        let unique: BTreeSet<DateTime<Tz>> = self
            .series
            .values()
            .flat_map(|s| s.bars.iter().map(|bar| bar.timestamp))
            .collect();
        unique.into_iter().collect()
    }
}
