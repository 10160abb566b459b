//! Open positions and round-trip trades.

use chrono::DateTime;
use chrono_tz::Tz;

/// Sizes closer to zero than this count as flat.
pub const SIZE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub size: f64,
    pub avg_price: f64,
    pub opened_at: DateTime<Tz>,
    /// Largest absolute size reached, signed by direction.
    pub peak_size: f64,
    pub realized_pnl: f64,
    pub commission_paid: f64,
}

impl Position {
    pub fn open(symbol: &str, size: f64, price: f64, commission: f64, at: DateTime<Tz>) -> Self {
        Position {
            symbol: symbol.to_string(),
            size,
            avg_price: price,
            opened_at: at,
            peak_size: size,
            realized_pnl: 0.0,
            commission_paid: commission,
        }
    }

    pub fn is_long(&self) -> bool {
        self.size > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.size < 0.0
    }

    pub fn is_flat(&self) -> bool {
        self.size.abs() < SIZE_EPSILON
    }

    /// Signed: negative for shorts.
    pub fn market_value(&self, price: f64) -> f64 {
        self.size * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.size * (price - self.avg_price)
    }

    /// Apply a fill that does not cross zero. Adding to the position moves the
    /// average price; reducing it realises PnL against the average price.
    pub fn apply(&mut self, delta: f64, price: f64, commission: f64) {
        self.commission_paid += commission;

        if self.size * delta > 0.0 {
            let new_size = self.size + delta;
            self.avg_price = (self.size * self.avg_price + delta * price) / new_size;
            self.size = new_size;
            if new_size.abs() > self.peak_size.abs() {
                self.peak_size = new_size;
            }
        } else {
            self.realized_pnl += -delta * (price - self.avg_price);
            self.size += delta;
        }
    }

    pub fn close(self, exit_price: f64, at: DateTime<Tz>) -> ClosedTrade {
        ClosedTrade {
            symbol: self.symbol,
            size: self.peak_size,
            entry_price: self.avg_price,
            exit_price,
            opened_at: self.opened_at,
            closed_at: at,
            pnl: self.realized_pnl - self.commission_paid,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub symbol: String,
    pub size: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub opened_at: DateTime<Tz>,
    pub closed_at: DateTime<Tz>,
    /// Net of every commission paid while the trade was open.
    pub pnl: f64,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }
}
