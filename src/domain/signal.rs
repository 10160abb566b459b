//! Cross-sectional mean-reversion weights.
//!
//! Per rebalance event, over the symbols with a complete observation:
//!
//! 1. `x_i = transform(return_i)` (natural log by default)
//! 2. `z_i = (x_i - mean(x)) / std(x)` with population statistics
//! 3. `active_i = |z_i| >= z_threshold`
//! 4. `signal_i = -z_i / max(vol_i, vol_floor)`
//! 5. subtract the mean signal of the active set, zero the inactive set
//! 6. `weight_i = signal_i / sum(|signal|)`
//!
//! Events that cannot produce a meaningful cross-section (nothing observed,
//! no dispersion, return outside the transform's domain) are skipped rather
//! than turned into NaN weights.

use crate::domain::indicator::Observation;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_Z_THRESHOLD: f64 = 0.5;
pub const DEFAULT_VOL_FLOOR: f64 = 1e-6;

/// Dispersion at or below this (relative to the level of the cross-section)
/// is treated as zero.
const DISPERSION_EPSILON: f64 = 1e-12;

/// How a fractional single-period return is mapped before z-scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnTransform {
    /// `ln(r)`: only defined for `r > 0`.
    #[default]
    Log,
    /// `ln(1 + r)`: defined for `r > -1`.
    Log1p,
}

impl ReturnTransform {
    pub fn apply(self, ret: f64) -> Option<f64> {
        let x = match self {
            ReturnTransform::Log if ret > 0.0 => ret.ln(),
            ReturnTransform::Log1p if ret > -1.0 => ret.ln_1p(),
            _ => return None,
        };
        x.is_finite().then_some(x)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown return transform: {0} (expected log or log1p)")]
pub struct UnknownTransform(pub String);

impl FromStr for ReturnTransform {
    type Err = UnknownTransform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(ReturnTransform::Log),
            "log1p" => Ok(ReturnTransform::Log1p),
            other => Err(UnknownTransform(other.to_string())),
        }
    }
}

impl fmt::Display for ReturnTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnTransform::Log => write!(f, "log"),
            ReturnTransform::Log1p => write!(f, "log1p"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub z_threshold: f64,
    pub vol_floor: f64,
    pub return_transform: ReturnTransform,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            z_threshold: DEFAULT_Z_THRESHOLD,
            vol_floor: DEFAULT_VOL_FLOOR,
            return_transform: ReturnTransform::default(),
        }
    }
}

pub type TargetWeights = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoObservations,
    ZeroDispersion,
    NonPositiveReturn { symbol: String, ret: f64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoObservations => write!(f, "no symbol has a complete observation"),
            SkipReason::ZeroDispersion => write!(f, "cross-sectional dispersion is zero"),
            SkipReason::NonPositiveReturn { symbol, ret } => {
                write!(f, "return {ret} of {symbol} is outside the transform domain")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Rebalance(TargetWeights),
    Skip(SkipReason),
}

/// Inclusive at the threshold: `|z| == z_threshold` is active.
pub fn is_active(z: f64, z_threshold: f64) -> bool {
    z.abs() >= z_threshold
}

/// Population z-scores of `values`; `None` when the cross-section has no
/// dispersion (including a single value).
pub fn z_scores(values: &[f64]) -> Option<Vec<f64>> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    if !std.is_finite() || std <= DISPERSION_EPSILON * mean.abs().max(1.0) {
        return None;
    }
    Some(values.iter().map(|x| (x - mean) / std).collect())
}

/// Target weights for one rebalance event. Symbols with a missing return or
/// volatility are left out of both the statistics and the output.
pub fn compute_weights(
    observations: &BTreeMap<String, Observation>,
    config: &SignalConfig,
) -> SignalOutcome {
    let eligible: Vec<(&str, f64, f64)> = observations
        .iter()
        .filter(|(_, obs)| obs.is_complete())
        .filter_map(|(symbol, obs)| Some((symbol.as_str(), obs.ret?, obs.vol?)))
        .collect();

    if eligible.is_empty() {
        return SignalOutcome::Skip(SkipReason::NoObservations);
    }

    let mut transformed = Vec::with_capacity(eligible.len());
    for &(symbol, ret, _) in &eligible {
        match config.return_transform.apply(ret) {
            Some(x) => transformed.push(x),
            None => {
                return SignalOutcome::Skip(SkipReason::NonPositiveReturn {
                    symbol: symbol.to_string(),
                    ret,
                });
            }
        }
    }

    let Some(z) = z_scores(&transformed) else {
        return SignalOutcome::Skip(SkipReason::ZeroDispersion);
    };

    let active: Vec<bool> = z.iter().map(|&zi| is_active(zi, config.z_threshold)).collect();

    let mut signal: Vec<f64> = z
        .iter()
        .zip(&eligible)
        .map(|(zi, &(_, _, vol))| -zi / vol.max(config.vol_floor))
        .collect();

    let active_count = active.iter().filter(|&&a| a).count();
    if active_count > 0 {
        let active_mean = signal
            .iter()
            .zip(&active)
            .filter(|&(_, &a)| a)
            .map(|(s, _)| s)
            .sum::<f64>()
            / active_count as f64;
        for s in &mut signal {
            *s -= active_mean;
        }
    }

    for (s, &a) in signal.iter_mut().zip(&active) {
        if !a {
            *s = 0.0;
        }
    }

    let gross: f64 = signal.iter().map(|s| s.abs()).sum();

    let weights = eligible
        .iter()
        .zip(&signal)
        .map(|(&(symbol, _, _), &s)| {
            let w = if gross > 0.0 { s / gross } else { 0.0 };
            (symbol.to_string(), w)
        })
        .collect();

    SignalOutcome::Rebalance(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn obs(ret: f64, vol: f64) -> Observation {
        Observation {
            ret: Some(ret),
            vol: Some(vol),
        }
    }

    fn book(entries: &[(&str, Observation)]) -> BTreeMap<String, Observation> {
        entries
            .iter()
            .map(|(s, o)| (s.to_string(), *o))
            .collect()
    }

    fn weights(outcome: SignalOutcome) -> TargetWeights {
        match outcome {
            SignalOutcome::Rebalance(w) => w,
            SignalOutcome::Skip(reason) => panic!("expected weights, skipped: {reason}"),
        }
    }

    fn gross(w: &TargetWeights) -> f64 {
        w.values().map(|x| x.abs()).sum()
    }

    #[test]
    fn two_symmetric_symbols_split_half_and_half() {
        let config = SignalConfig {
            return_transform: ReturnTransform::Log1p,
            ..SignalConfig::default()
        };
        let input = book(&[("A", obs(0.01, 0.02)), ("B", obs(-0.01, 0.02))]);
        let w = weights(compute_weights(&input, &config));

        // The outperformer is shorted.
        assert_relative_eq!(w["A"], -0.5, epsilon = 1e-12);
        assert_relative_eq!(w["B"], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn single_symbol_skips_on_zero_dispersion() {
        let input = book(&[("A", obs(0.01, 0.02))]);
        assert_eq!(
            compute_weights(&input, &SignalConfig::default()),
            SignalOutcome::Skip(SkipReason::ZeroDispersion)
        );
    }

    #[test]
    fn identical_returns_skip_on_zero_dispersion() {
        let input = book(&[
            ("A", obs(0.02, 0.1)),
            ("B", obs(0.02, 0.2)),
            ("C", obs(0.02, 0.3)),
        ]);
        assert_eq!(
            compute_weights(&input, &SignalConfig::default()),
            SignalOutcome::Skip(SkipReason::ZeroDispersion)
        );
    }

    #[test]
    fn no_complete_observations_skips() {
        let input = book(&[
            ("A", Observation::default()),
            (
                "B",
                Observation {
                    ret: Some(0.01),
                    vol: None,
                },
            ),
        ]);
        assert_eq!(
            compute_weights(&input, &SignalConfig::default()),
            SignalOutcome::Skip(SkipReason::NoObservations)
        );
        assert_eq!(
            compute_weights(&BTreeMap::new(), &SignalConfig::default()),
            SignalOutcome::Skip(SkipReason::NoObservations)
        );
    }

    #[test]
    fn log_transform_skips_non_positive_return() {
        let input = book(&[("A", obs(0.01, 0.02)), ("B", obs(-0.01, 0.02))]);
        let outcome = compute_weights(&input, &SignalConfig::default());
        assert!(matches!(
            outcome,
            SignalOutcome::Skip(SkipReason::NonPositiveReturn { ref symbol, .. }) if symbol == "B"
        ));
    }

    #[test]
    fn missing_symbols_are_excluded() {
        let input = book(&[
            ("A", obs(0.03, 0.02)),
            ("B", Observation::default()),
            ("C", obs(0.01, 0.02)),
        ]);
        let w = weights(compute_weights(&input, &SignalConfig::default()));
        assert_eq!(w.len(), 2);
        assert!(!w.contains_key("B"));
        assert_relative_eq!(gross(&w), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn recentering_uses_active_mean_and_zeroes_inactive() {
        // logs are 1, 0, -1: z = +1.22, 0, -1.22, middle is inactive
        let e = std::f64::consts::E;
        let input = book(&[
            ("A", obs(e, 0.1)),
            ("B", obs(1.0, 0.2)),
            ("C", obs(1.0 / e, 0.2)),
        ]);
        let w = weights(compute_weights(&input, &SignalConfig::default()));

        // Without recentering the inverse-vol split would be -2/3, +1/3.
        assert_relative_eq!(w["A"], -0.5, epsilon = 1e-9);
        assert_eq!(w["B"], 0.0);
        assert_relative_eq!(w["C"], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn threshold_above_every_z_gives_zero_weights() {
        let config = SignalConfig {
            z_threshold: 10.0,
            ..SignalConfig::default()
        };
        let input = book(&[
            ("A", obs(0.03, 0.02)),
            ("B", obs(0.02, 0.02)),
            ("C", obs(0.01, 0.02)),
        ]);
        let w = weights(compute_weights(&input, &config));
        assert_eq!(w.len(), 3);
        assert!(w.values().all(|&x| x == 0.0));
    }

    #[test]
    fn threshold_tie_is_active() {
        assert!(is_active(0.5, 0.5));
        assert!(is_active(-0.5, 0.5));
        assert!(!is_active(0.4999, 0.5));
    }

    #[test]
    fn zero_volatility_is_floored() {
        let input = book(&[("A", obs(0.03, 0.0)), ("B", obs(0.01, 0.02))]);
        let w = weights(compute_weights(&input, &SignalConfig::default()));
        assert!(w.values().all(|x| x.is_finite()));
        assert_relative_eq!(gross(&w), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn z_scores_known_values() {
        let z = z_scores(&[1.0, 2.0, 3.0]).unwrap();
        let s = (2.0_f64 / 3.0).sqrt();
        assert_relative_eq!(z[0], -1.0 / s, epsilon = 1e-12);
        assert_relative_eq!(z[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(z[2], 1.0 / s, epsilon = 1e-12);
        assert!(z_scores(&[]).is_none());
        assert!(z_scores(&[4.2]).is_none());
    }

    #[test]
    fn transform_parsing() {
        assert_eq!("log".parse(), Ok(ReturnTransform::Log));
        assert_eq!(" LOG1P ".parse(), Ok(ReturnTransform::Log1p));
        assert!("sqrt".parse::<ReturnTransform>().is_err());
        assert_eq!(ReturnTransform::Log1p.to_string(), "log1p");
    }

    #[test]
    fn transform_domains() {
        assert_eq!(ReturnTransform::Log.apply(0.0), None);
        assert_eq!(ReturnTransform::Log.apply(-0.1), None);
        assert_eq!(ReturnTransform::Log1p.apply(-1.0), None);
        assert_relative_eq!(ReturnTransform::Log1p.apply(-0.5).unwrap(), 0.5_f64.ln());
    }

    fn cross_section() -> impl Strategy<Value = Vec<(f64, f64)>> {
        prop::collection::vec((0.001f64..0.2, 0.001f64..0.5), 2..8)
    }

    fn to_book(rows: &[(f64, f64)], vol_scale: f64) -> BTreeMap<String, Observation> {
        rows.iter()
            .enumerate()
            .map(|(i, &(r, v))| (format!("S{i}"), obs(r, v * vol_scale)))
            .collect()
    }

    proptest! {
        #[test]
        fn gross_exposure_is_zero_or_one(rows in cross_section(), threshold in 0.0f64..2.0) {
            let config = SignalConfig { z_threshold: threshold, ..SignalConfig::default() };
            match compute_weights(&to_book(&rows, 1.0), &config) {
                SignalOutcome::Rebalance(w) => {
                    let g = gross(&w);
                    prop_assert!(g == 0.0 || (g - 1.0).abs() < 1e-9, "gross = {}", g);
                }
                SignalOutcome::Skip(reason) => prop_assert_eq!(reason, SkipReason::ZeroDispersion),
            }
        }

        #[test]
        fn below_threshold_weight_is_zero(rows in cross_section(), threshold in 0.0f64..2.0) {
            let config = SignalConfig { z_threshold: threshold, ..SignalConfig::default() };
            let logs: Vec<f64> = rows.iter().map(|&(r, _)| r.ln()).collect();
            if let (Some(z), SignalOutcome::Rebalance(w)) =
                (z_scores(&logs), compute_weights(&to_book(&rows, 1.0), &config))
            {
                for (i, zi) in z.iter().enumerate() {
                    if zi.abs() < threshold {
                        prop_assert_eq!(w[&format!("S{i}")], 0.0);
                    }
                }
            }
        }

        #[test]
        fn volatility_scale_invariance(rows in cross_section(), scale in 0.1f64..10.0) {
            let config = SignalConfig::default();
            let base = compute_weights(&to_book(&rows, 1.0), &config);
            let scaled = compute_weights(&to_book(&rows, scale), &config);
            match (base, scaled) {
                (SignalOutcome::Rebalance(a), SignalOutcome::Rebalance(b)) => {
                    for (symbol, wa) in &a {
                        prop_assert!((wa - b[symbol]).abs() < 1e-9);
                    }
                }
                (SignalOutcome::Skip(x), SignalOutcome::Skip(y)) => prop_assert_eq!(x, y),
                (a, b) => prop_assert!(false, "outcomes diverged: {:?} vs {:?}", a, b),
            }
        }
    }
}
