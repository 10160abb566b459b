//! Symbol include / exclude lists.

use crate::domain::dataset::MultiSymbolDataset;
use crate::domain::error::CrossrevError;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Universe {
    /// `None` keeps every symbol in the data.
    pub symbols: Option<Vec<String>>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

impl Universe {
    pub fn includes(&self, symbol: &str) -> bool {
        let listed = self
            .symbols
            .as_ref()
            .is_none_or(|s| s.iter().any(|x| x == symbol));
        listed && !self.exclude.iter().any(|x| x == symbol)
    }

    /// Drop every series outside the universe. Fails when nothing is left.
    pub fn apply(&self, dataset: &mut MultiSymbolDataset) -> Result<(), CrossrevError> {
        if let Some(symbols) = &self.symbols {
            for missing in symbols.iter().filter(|s| dataset.get(s).is_none()) {
                warn!(symbol = %missing, "configured symbol has no data");
            }
        }

        let before = dataset.series.len();
        dataset.retain(|symbol| self.includes(symbol));

        if dataset.is_empty() {
            return Err(CrossrevError::NoData {
                reason: "no symbol left after applying the universe".to_string(),
            });
        }

        info!(
            kept = dataset.series.len(),
            dropped = before - dataset.series.len(),
            symbols = ?dataset.symbols(),
            "universe applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Bar;
    use chrono::TimeZone;

    fn dataset(symbols: &[&str]) -> MultiSymbolDataset {
        let bars = symbols
            .iter()
            .map(|s| Bar {
                timestamp: chrono_tz::UTC.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
                symbol: s.to_string(),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1,
                trade_count: 1,
                vwap: 1.0,
            })
            .collect();
        MultiSymbolDataset::from_bars(bars).unwrap()
    }

    #[test]
    fn parse_symbols_basic() {
        let result = parse_symbols("AAPL,MSFT,XLE").unwrap();
        assert_eq!(result, vec!["AAPL", "MSFT", "XLE"]);
    }

    #[test]
    fn parse_symbols_trims_and_uppercases() {
        let result = parse_symbols("  aapl , Msft ").unwrap();
        assert_eq!(result, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn parse_symbols_empty_token() {
        assert_eq!(parse_symbols("AAPL,,MSFT"), Err(UniverseError::EmptyToken));
        assert_eq!(parse_symbols(""), Err(UniverseError::EmptyToken));
    }

    #[test]
    fn parse_symbols_duplicate() {
        let result = parse_symbols("AAPL,MSFT,aapl");
        assert!(matches!(result, Err(UniverseError::DuplicateSymbol(s)) if s == "AAPL"));
    }

    #[test]
    fn exclude_only() {
        let universe = Universe {
            symbols: None,
            exclude: vec!["EXE".into(), "XLE".into()],
        };
        let mut data = dataset(&["AAPL", "EXE", "MSFT", "XLE"]);
        universe.apply(&mut data).unwrap();
        assert_eq!(data.symbols(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn include_list_minus_exclude() {
        let universe = Universe {
            symbols: Some(vec!["AAPL".into(), "XLE".into(), "NVDA".into()]),
            exclude: vec!["XLE".into()],
        };
        assert!(universe.includes("AAPL"));
        assert!(!universe.includes("XLE"));
        assert!(!universe.includes("MSFT"));

        let mut data = dataset(&["AAPL", "MSFT", "XLE"]);
        universe.apply(&mut data).unwrap();
        assert_eq!(data.symbols(), vec!["AAPL"]);
    }

    #[test]
    fn nothing_left_is_no_data() {
        let universe = Universe {
            symbols: Some(vec!["NVDA".into()]),
            exclude: Vec::new(),
        };
        let mut data = dataset(&["AAPL"]);
        let err = universe.apply(&mut data).unwrap_err();
        assert!(matches!(err, CrossrevError::NoData { .. }));
    }

    #[test]
    fn default_keeps_everything() {
        let mut data = dataset(&["AAPL", "MSFT"]);
        Universe::default().apply(&mut data).unwrap();
        assert_eq!(data.symbols().len(), 2);
    }
}
