//! No-trade-band target sizing.

use std::collections::BTreeMap;

pub const DEFAULT_NO_TRADE_BAND: f64 = 0.02;

/// Current size and last price of one symbol, as seen by the strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Holding {
    pub size: f64,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetPosition {
    /// Deviation inside the band; no order.
    Hold { size: f64 },
    Resize { from: f64, to: f64 },
}

impl TargetPosition {
    pub fn target_size(&self) -> f64 {
        match *self {
            TargetPosition::Hold { size } => size,
            TargetPosition::Resize { to, .. } => to,
        }
    }

    pub fn is_resize(&self) -> bool {
        matches!(self, TargetPosition::Resize { .. })
    }
}

/// Convert target weights into target sizes.
///
/// A symbol is resized only when the notional gap between target and current
/// exposure exceeds `portfolio_value * band`. Symbols with no usable price
/// are absent from the result and their positions are left as they are.
pub fn rebalance(
    weights: &BTreeMap<String, f64>,
    portfolio_value: f64,
    holdings: &BTreeMap<String, Holding>,
    band: f64,
) -> BTreeMap<String, TargetPosition> {
    let threshold = portfolio_value.abs() * band;

    weights
        .iter()
        .filter_map(|(symbol, &weight)| {
            let holding = holdings.get(symbol)?;
            let price = holding.price.filter(|p| p.is_finite() && *p > 0.0)?;

            let target_notional = portfolio_value * weight;
            let current_notional = holding.size * price;
            let gap = target_notional - current_notional;

            let target = if gap.abs() > threshold {
                TargetPosition::Resize {
                    from: holding.size,
                    to: holding.size + gap / price,
                }
            } else {
                TargetPosition::Hold { size: holding.size }
            };
            Some((symbol.clone(), target))
        })
        .collect()
}
