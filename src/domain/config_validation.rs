//! Typed run configuration built from, and validated against, a `ConfigPort`.
//!
//! Every section is checked before any data is read so that a bad value
//! fails fast with the section and key that caused it.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::CrossrevError;
use crate::domain::frequency::Frequency;
use crate::domain::rebalance::DEFAULT_NO_TRADE_BAND;
use crate::domain::resample::ResampleConfig;
use crate::domain::signal::{
    DEFAULT_VOL_FLOOR, DEFAULT_Z_THRESHOLD, ReturnTransform, SignalConfig,
};
use crate::domain::strategy::{DEFAULT_REBALANCE_INTERVAL, DEFAULT_VOL_WINDOW, StrategyConfig};
use crate::domain::universe::{Universe, parse_symbols};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

pub const DEFAULT_TIMESTAMP_COLUMN: &str = "timestamp";
pub const DEFAULT_SYMBOL_COLUMN: &str = "symbol";
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

const KNOWN_KEYS: &[(&str, &[&str])] = &[
    (
        "data",
        &[
            "path",
            "timestamp_column",
            "symbol_column",
            "frequency",
            "market_hours_only",
            "timezone",
            "start",
            "end",
            "symbols",
            "exclude",
        ],
    ),
    ("backtest", &["initial_capital", "commission", "risk_free_rate"]),
    (
        "strategy",
        &[
            "rebalance_interval",
            "z_threshold",
            "no_trade_band",
            "vol_window",
            "vol_window_days",
            "vol_floor",
            "return_transform",
        ],
    ),
    ("report", &["chart_path", "values_path"]),
    ("logging", &["level"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub path: PathBuf,
    pub timestamp_column: String,
    pub symbol_column: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportConfig {
    pub chart_path: Option<PathBuf>,
    pub values_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub data: DataConfig,
    pub resample: ResampleConfig,
    pub universe: Universe,
    pub backtest: BacktestConfig,
    pub strategy: StrategyConfig,
    pub report: ReportConfig,
    /// Default verbosity; `RUST_LOG` takes precedence when set.
    pub log_level: LevelFilter,
}

pub fn load_run_config(config: &dyn ConfigPort) -> Result<RunConfig, CrossrevError> {
    let resample = load_resample_config(config)?;
    let strategy = load_strategy_config(config, &resample.frequency)?;
    Ok(RunConfig {
        data: load_data_config(config)?,
        universe: load_universe(config)?,
        backtest: load_backtest_config(config)?,
        report: load_report_config(config),
        log_level: load_log_level(config)?,
        resample,
        strategy,
    })
}

pub fn load_data_config(config: &dyn ConfigPort) -> Result<DataConfig, CrossrevError> {
    let path = required_string(config, "data", "path")?;
    Ok(DataConfig {
        path: PathBuf::from(path),
        timestamp_column: optional_string(config, "data", "timestamp_column")
            .unwrap_or_else(|| DEFAULT_TIMESTAMP_COLUMN.to_string()),
        symbol_column: optional_string(config, "data", "symbol_column")
            .unwrap_or_else(|| DEFAULT_SYMBOL_COLUMN.to_string()),
    })
}

pub fn load_resample_config(config: &dyn ConfigPort) -> Result<ResampleConfig, CrossrevError> {
    let defaults = ResampleConfig::default();

    let frequency = match optional_string(config, "data", "frequency") {
        Some(raw) => raw
            .parse::<Frequency>()
            .map_err(|e| CrossrevError::invalid("data", "frequency", e.to_string()))?,
        None => defaults.frequency,
    };

    let timezone = match optional_string(config, "data", "timezone") {
        Some(raw) => raw.parse::<Tz>().map_err(|_| {
            CrossrevError::invalid("data", "timezone", format!("unknown IANA timezone {raw:?}"))
        })?,
        None => defaults.timezone,
    };

    Ok(ResampleConfig {
        frequency,
        market_hours_only: boolean(
            config,
            "data",
            "market_hours_only",
            defaults.market_hours_only,
        )?,
        timezone,
    })
}

pub fn load_universe(config: &dyn ConfigPort) -> Result<Universe, CrossrevError> {
    let list = |key: &str| -> Result<Option<Vec<String>>, CrossrevError> {
        optional_string(config, "data", key)
            .map(|raw| {
                parse_symbols(&raw).map_err(|e| CrossrevError::invalid("data", key, e.to_string()))
            })
            .transpose()
    };
    Ok(Universe {
        symbols: list("symbols")?,
        exclude: list("exclude")?.unwrap_or_default(),
    })
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, CrossrevError> {
    let defaults = BacktestConfig::default();

    let initial_capital = number(config, "backtest", "initial_capital", defaults.initial_capital)?;
    if initial_capital <= 0.0 {
        return Err(CrossrevError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }

    let commission = number(config, "backtest", "commission", defaults.commission)?;
    if !(0.0..1.0).contains(&commission) {
        return Err(CrossrevError::invalid(
            "backtest",
            "commission",
            "commission must be a fraction between 0 and 1",
        ));
    }

    let risk_free_rate = number(config, "backtest", "risk_free_rate", defaults.risk_free_rate)?;
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(CrossrevError::invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }

    let start = date(config, "start")?;
    let end = date(config, "end")?;
    if let (Some(s), Some(e)) = (start, end) {
        if s >= e {
            return Err(CrossrevError::invalid("data", "start", "start must be before end"));
        }
    }

    Ok(BacktestConfig {
        initial_capital,
        commission,
        risk_free_rate,
        start,
        end,
    })
}

pub fn load_strategy_config(
    config: &dyn ConfigPort,
    frequency: &Frequency,
) -> Result<StrategyConfig, CrossrevError> {
    let rebalance_interval = count(
        config,
        "strategy",
        "rebalance_interval",
        DEFAULT_REBALANCE_INTERVAL,
    )?;

    let z_threshold = number(config, "strategy", "z_threshold", DEFAULT_Z_THRESHOLD)?;
    if z_threshold < 0.0 {
        return Err(CrossrevError::invalid(
            "strategy",
            "z_threshold",
            "z_threshold must be non-negative",
        ));
    }

    let no_trade_band = number(config, "strategy", "no_trade_band", DEFAULT_NO_TRADE_BAND)?;
    if !(0.0..1.0).contains(&no_trade_band) {
        return Err(CrossrevError::invalid(
            "strategy",
            "no_trade_band",
            "no_trade_band must be a fraction between 0 and 1",
        ));
    }

    let vol_floor = number(config, "strategy", "vol_floor", DEFAULT_VOL_FLOOR)?;
    if vol_floor <= 0.0 {
        return Err(CrossrevError::invalid(
            "strategy",
            "vol_floor",
            "vol_floor must be positive",
        ));
    }

    let vol_window = match (
        optional_string(config, "strategy", "vol_window"),
        optional_string(config, "strategy", "vol_window_days"),
    ) {
        (Some(_), Some(_)) => {
            return Err(CrossrevError::invalid(
                "strategy",
                "vol_window_days",
                "set either vol_window or vol_window_days, not both",
            ));
        }
        (None, Some(_)) => {
            let days = count(config, "strategy", "vol_window_days", 1)?;
            let days = u32::try_from(days).map_err(|_| {
                CrossrevError::invalid("strategy", "vol_window_days", "value is too large")
            })?;
            frequency.volatility_window(days)
        }
        _ => count(config, "strategy", "vol_window", DEFAULT_VOL_WINDOW)?,
    };

    let return_transform = match optional_string(config, "strategy", "return_transform") {
        Some(raw) => raw
            .parse::<ReturnTransform>()
            .map_err(|e| CrossrevError::invalid("strategy", "return_transform", e.to_string()))?,
        None => ReturnTransform::default(),
    };

    Ok(StrategyConfig {
        rebalance_interval,
        vol_window,
        no_trade_band,
        signal: SignalConfig {
            z_threshold,
            vol_floor,
            return_transform,
        },
    })
}

pub fn load_log_level(config: &dyn ConfigPort) -> Result<LevelFilter, CrossrevError> {
    match optional_string(config, "logging", "level") {
        Some(raw) => raw.parse::<LevelFilter>().map_err(|_| {
            CrossrevError::invalid(
                "logging",
                "level",
                format!("expected off, error, warn, info, debug or trace, got {raw:?}"),
            )
        }),
        None => Ok(DEFAULT_LOG_LEVEL),
    }
}

pub fn load_report_config(config: &dyn ConfigPort) -> ReportConfig {
    ReportConfig {
        chart_path: optional_string(config, "report", "chart_path").map(PathBuf::from),
        values_path: optional_string(config, "report", "values_path").map(PathBuf::from),
    }
}

/// Keys present in the file that no loader reads, usually typos.
pub fn unknown_keys(config: &dyn ConfigPort) -> Vec<(String, String)> {
    config
        .entries()
        .into_iter()
        .filter(|(section, key)| {
            !KNOWN_KEYS
                .iter()
                .any(|(s, keys)| s == section && keys.contains(&key.as_str()))
        })
        .collect()
}

fn optional_string(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, CrossrevError> {
    optional_string(config, section, key).ok_or_else(|| CrossrevError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    })
}

fn number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, CrossrevError> {
    match optional_string(config, section, key) {
        Some(raw) if !raw.parse::<f64>().is_ok_and(f64::is_finite) => Err(CrossrevError::invalid(
            section,
            key,
            format!("expected a number, got {raw:?}"),
        )),
        _ => Ok(config.get_double(section, key, default)),
    }
}

/// A positive whole number.
fn count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, CrossrevError> {
    let value = match optional_string(config, section, key) {
        Some(raw) if raw.parse::<i64>().is_err() => {
            return Err(CrossrevError::invalid(
                section,
                key,
                format!("expected a whole number, got {raw:?}"),
            ));
        }
        _ => config.get_int(section, key, default as i64),
    };
    match usize::try_from(value) {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(CrossrevError::invalid(section, key, format!("{key} must be at least 1"))),
    }
}

fn boolean(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, CrossrevError> {
    let recognised = |raw: &str| {
        matches!(
            raw.to_lowercase().as_str(),
            "true" | "yes" | "1" | "false" | "no" | "0"
        )
    };
    match optional_string(config, section, key) {
        Some(raw) if !recognised(&raw) => Err(CrossrevError::invalid(
            section,
            key,
            format!("expected true or false, got {raw:?}"),
        )),
        _ => Ok(config.get_bool(section, key, default)),
    }
}

fn date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, CrossrevError> {
    optional_string(config, "data", key)
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                let reason = format!("invalid {key} format, expected YYYY-MM-DD");
                CrossrevError::invalid("data", key, reason)
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use approx::assert_relative_eq;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const FULL: &str = r#"
[data]
path = data/bars.csv
timestamp_column = ts
frequency = 6h
market_hours_only = false
timezone = America/New_York
start = 2019-01-07
end = 2023-01-01
symbols = aapl, msft
exclude = EXE, XLE

[backtest]
initial_capital = 1000
commission = 0.002
risk_free_rate = 0.02

[strategy]
rebalance_interval = 4
z_threshold = 0.75
no_trade_band = 0.05
vol_window = 20
vol_floor = 0.0001
return_transform = log1p

[report]
chart_path = out/value.svg
values_path = out/value.csv

[logging]
level = debug
"#;

    fn expect_invalid(content: &str, expected_key: &str) {
        match load_run_config(&make_config(content)) {
            Err(CrossrevError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected invalid {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn full_config_loads() {
        let run = load_run_config(&make_config(FULL)).unwrap();

        assert_eq!(run.data.path, PathBuf::from("data/bars.csv"));
        assert_eq!(run.data.timestamp_column, "ts");
        assert_eq!(run.data.symbol_column, "symbol");

        assert_eq!(run.resample.frequency.to_string(), "6h");
        assert!(!run.resample.market_hours_only);
        assert_eq!(run.resample.timezone, chrono_tz::America::New_York);

        assert_eq!(
            run.universe.symbols,
            Some(vec!["AAPL".to_string(), "MSFT".to_string()])
        );
        assert_eq!(run.universe.exclude, vec!["EXE", "XLE"]);

        assert_relative_eq!(run.backtest.initial_capital, 1000.0);
        assert_relative_eq!(run.backtest.commission, 0.002);
        assert_relative_eq!(run.backtest.risk_free_rate, 0.02);
        assert_eq!(run.backtest.start, NaiveDate::from_ymd_opt(2019, 1, 7));
        assert_eq!(run.backtest.end, NaiveDate::from_ymd_opt(2023, 1, 1));

        assert_eq!(run.strategy.rebalance_interval, 4);
        assert_eq!(run.strategy.vol_window, 20);
        assert_relative_eq!(run.strategy.no_trade_band, 0.05);
        assert_relative_eq!(run.strategy.signal.z_threshold, 0.75);
        assert_relative_eq!(run.strategy.signal.vol_floor, 0.0001);
        assert_eq!(run.strategy.signal.return_transform, ReturnTransform::Log1p);

        assert_eq!(run.report.chart_path, Some(PathBuf::from("out/value.svg")));
        assert_eq!(run.report.values_path, Some(PathBuf::from("out/value.csv")));
        assert_eq!(run.log_level, LevelFilter::DEBUG);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let run = load_run_config(&make_config("[data]\npath = bars.csv\n")).unwrap();

        assert_eq!(run.data.timestamp_column, "timestamp");
        assert_eq!(run.resample, ResampleConfig::default());
        assert_eq!(run.universe, Universe::default());
        assert_eq!(run.backtest, BacktestConfig::default());
        assert_eq!(run.strategy, StrategyConfig::default());
        assert_eq!(run.report, ReportConfig::default());
        assert_eq!(run.log_level, LevelFilter::INFO);
    }

    #[test]
    fn missing_path_fails() {
        let err = load_run_config(&make_config("[backtest]\ninitial_capital = 1000\n")).unwrap_err();
        assert!(matches!(
            err,
            CrossrevError::ConfigMissing { ref section, ref key } if section == "data" && key == "path"
        ));
    }

    #[test]
    fn bad_frequency_fails() {
        expect_invalid("[data]\npath = x\nfrequency = 3y\n", "frequency");
    }

    #[test]
    fn bad_timezone_fails() {
        expect_invalid("[data]\npath = x\ntimezone = Mars/Olympus\n", "timezone");
    }

    #[test]
    fn bad_market_hours_flag_fails() {
        expect_invalid("[data]\npath = x\nmarket_hours_only = sometimes\n", "market_hours_only");
    }

    #[test]
    fn duplicate_symbol_fails() {
        expect_invalid("[data]\npath = x\nsymbols = AAPL, aapl\n", "symbols");
    }

    #[test]
    fn start_after_end_fails() {
        expect_invalid("[data]\npath = x\nstart = 2023-01-01\nend = 2022-01-01\n", "start");
    }

    #[test]
    fn bad_date_format_fails() {
        expect_invalid("[data]\npath = x\nend = 01/01/2023\n", "end");
    }

    #[test]
    fn initial_capital_must_be_positive() {
        expect_invalid("[data]\npath = x\n[backtest]\ninitial_capital = 0\n", "initial_capital");
    }

    #[test]
    fn non_numeric_commission_fails() {
        expect_invalid("[data]\npath = x\n[backtest]\ncommission = lots\n", "commission");
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        expect_invalid("[data]\npath = x\n[backtest]\nrisk_free_rate = 1.5\n", "risk_free_rate");
    }

    #[test]
    fn zero_rebalance_interval_fails() {
        expect_invalid("[data]\npath = x\n[strategy]\nrebalance_interval = 0\n", "rebalance_interval");
    }

    #[test]
    fn negative_threshold_fails() {
        expect_invalid("[data]\npath = x\n[strategy]\nz_threshold = -0.1\n", "z_threshold");
    }

    #[test]
    fn unknown_transform_fails() {
        expect_invalid("[data]\npath = x\n[strategy]\nreturn_transform = sqrt\n", "return_transform");
    }

    #[test]
    fn vol_window_days_converts_through_frequency() {
        let run = load_run_config(&make_config(
            "[data]\npath = x\nfrequency = 1h\n[strategy]\nvol_window_days = 2\n",
        ))
        .unwrap();
        assert_eq!(run.strategy.vol_window, 13);
    }

    #[test]
    fn bad_log_level_fails() {
        expect_invalid("[data]\npath = x\n[logging]\nlevel = loud\n", "level");
    }

    #[test]
    fn unknown_keys_are_reported() {
        assert!(unknown_keys(&make_config(FULL)).is_empty());

        let config = make_config("[data]\npath = x\nz_treshold = 1\n[extras]\nfoo = 1\n");
        assert_eq!(
            unknown_keys(&config),
            vec![
                ("data".to_string(), "z_treshold".to_string()),
                ("extras".to_string(), "foo".to_string()),
            ]
        );
    }

    #[test]
    fn vol_window_and_days_conflict() {
        expect_invalid(
            "[data]\npath = x\n[strategy]\nvol_window = 10\nvol_window_days = 2\n",
            "vol_window_days",
        );
    }
}
