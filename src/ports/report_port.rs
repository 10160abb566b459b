//! Report generation port trait.

use crate::domain::error::CrossrevError;
use crate::domain::portfolio::EquityPoint;
use std::path::Path;

/// Port for writing the portfolio value series somewhere a human can read it.
pub trait ReportPort {
    /// `initial_value` is the capital the series started from.
    fn write(
        &self,
        values: &[EquityPoint],
        initial_value: f64,
        output_path: &Path,
    ) -> Result<(), CrossrevError>;
}
