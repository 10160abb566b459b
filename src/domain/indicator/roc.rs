//! Rate of change as a fractional return.
//!
//! ROC(n)[i] = (C[i] - C[i-n]) / C[i-n]
//! Undefined for the first n bars and when C[i-n] == 0.

use crate::domain::indicator::{IndicatorKind, IndicatorSeries};

pub fn calculate_roc(closes: &[f64], period: usize) -> IndicatorSeries {
    let values = (0..closes.len())
        .map(|i| {
            if i < period {
                return None;
            }
            let prev_close = closes[i - period];
            if prev_close == 0.0 {
                None
            } else {
                Some((closes[i] - prev_close) / prev_close)
            }
        })
        .collect();

    IndicatorSeries {
        kind: IndicatorKind::Roc(period),
        values,
    }
}
