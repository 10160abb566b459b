//! Rolling standard deviation indicator.
//!
//! Population standard deviation over the last n inputs:
//! STDDEV(n)[i] = sqrt(sum((x[i-j] - mean)^2 for j in 0..n-1) / n)
//! Undefined while any input in the window is missing.

use crate::domain::indicator::{IndicatorKind, IndicatorSeries};

pub fn calculate_stddev(inputs: &[Option<f64>], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(inputs.len());

    for i in 0..inputs.len() {
        if period == 0 || i + 1 < period {
            values.push(None);
            continue;
        }

        let window = &inputs[i + 1 - period..=i];
        let samples: Option<Vec<f64>> = window.iter().copied().collect();

        let value = samples.map(|xs| {
            let n = period as f64;
            let mean = xs.iter().sum::<f64>() / n;
            let variance = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            variance.sqrt()
        });

        values.push(value);
    }

    IndicatorSeries {
        kind: IndicatorKind::Stddev(period),
        values,
    }
}
