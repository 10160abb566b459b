#![allow(dead_code)]

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Weekday};
use chrono_tz::Tz;
use crossrev::adapters::file_config_adapter::FileConfigAdapter;
use crossrev::domain::bar::Bar;
use crossrev::domain::config_validation::{RunConfig, load_run_config};
use crossrev::domain::error::CrossrevError;
use crossrev::ports::data_port::DataPort;
use std::path::{Path, PathBuf};

pub const HOURS_PER_SESSION: u32 = 6;

/// Symbols with their base price and swing direction. `A` and `C` move
/// together, `B` against them, so every cross-section has dispersion.
pub const SYMBOLS: [(&str, f64, f64); 3] = [("A", 100.0, 0.02), ("B", 50.0, -0.02), ("C", 20.0, 0.01)];

pub struct MockDataPort {
    pub bars: Vec<Bar>,
}

impl MockDataPort {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars }
    }
}

impl DataPort for MockDataPort {
    fn load_bars(&self) -> Result<Vec<Bar>, CrossrevError> {
        Ok(self.bars.clone())
    }
}

/// The first `n` weekdays from 2024-01-02 (a Tuesday).
pub fn trading_days(n: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(n);
    let mut day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    while days.len() < n {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        day += Duration::days(1);
    }
    days
}

/// Hourly UTC bars between 10:00 and 16:00 New York time, one session per
/// trading day. Each symbol's level alternates around its base from day to day.
pub fn mean_reverting_bars(days: usize) -> Vec<Bar> {
    let mut bars = Vec::new();
    for (symbol, base, swing) in SYMBOLS {
        for (d, day) in trading_days(days).into_iter().enumerate() {
            let sign = if d % 2 == 0 { 1.0 } else { -1.0 };
            let level = base * (1.0 + swing * sign);
            for h in 0..HOURS_PER_SESSION {
                // January: New York is UTC-5
                let ts: DateTime<Tz> = chrono_tz::UTC
                    .from_utc_datetime(&day.and_hms_opt(15 + h, 0, 0).unwrap());
                let price = level * (1.0 + 0.0005 * f64::from(h));
                bars.push(Bar {
                    timestamp: ts,
                    symbol: symbol.to_string(),
                    open: price,
                    high: price * 1.001,
                    low: price * 0.999,
                    close: price,
                    volume: 1_000,
                    trade_count: 10,
                    vwap: price,
                });
            }
        }
    }
    bars
}

pub fn bars_to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,symbol,open,high,low,close,volume,trade_count,vwap\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{}\n",
            b.timestamp.to_rfc3339(),
            b.symbol,
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume,
            b.trade_count,
            b.vwap
        ));
    }
    out
}

pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// An INI document for the synthetic data; `extra` is appended verbatim.
pub fn ini(data_path: &Path, strategy: &str, extra: &str) -> String {
    format!(
        "[data]\n\
         path = {}\n\
         frequency = 1d\n\
         market_hours_only = true\n\
         timezone = America/New_York\n\
         \n\
         [backtest]\n\
         initial_capital = 100000\n\
         commission = 0.001\n\
         \n\
         [strategy]\n\
         vol_window = 3\n\
         z_threshold = 0.5\n\
         {}\n\
         {}\n",
        data_path.display(),
        strategy,
        extra
    )
}

pub fn run_config(content: &str) -> RunConfig {
    let adapter = FileConfigAdapter::from_string(content).unwrap();
    load_run_config(&adapter).unwrap()
}
