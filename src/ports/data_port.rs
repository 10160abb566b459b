//! Bar source port trait.

use crate::domain::bar::Bar;
use crate::domain::error::CrossrevError;
use std::collections::BTreeSet;

pub trait DataPort {
    /// Every bar in the source, in source order.
    fn load_bars(&self) -> Result<Vec<Bar>, CrossrevError>;

    fn list_symbols(&self) -> Result<Vec<String>, CrossrevError> {
        let symbols: BTreeSet<String> = self.load_bars()?.into_iter().map(|b| b.symbol).collect();
        Ok(symbols.into_iter().collect())
    }
}
