//! CSV bar table reader and writers.
//!
//! The input table needs a header row with the configured timestamp and symbol
//! columns plus `open, high, low, close, volume, trade_count, vwap`. Column
//! order does not matter and extra columns are ignored. Timestamps must carry
//! an offset; they are loaded as UTC instants.

use crate::domain::bar::Bar;
use crate::domain::config_validation::DataConfig;
use crate::domain::error::CrossrevError;
use crate::domain::portfolio::EquityPoint;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use csv::StringRecord;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

const BAR_HEADER: [&str; 9] = [
    "timestamp",
    "symbol",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "trade_count",
    "vwap",
];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub struct CsvAdapter {
    config: DataConfig,
}

struct Columns {
    timestamp: usize,
    symbol: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    trade_count: usize,
    vwap: usize,
}

impl Columns {
    fn locate(headers: &StringRecord, config: &DataConfig) -> Result<Self, CrossrevError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| CrossrevError::MissingColumn {
                    column: name.to_string(),
                })
        };
        Ok(Columns {
            timestamp: find(&config.timestamp_column)?,
            symbol: find(&config.symbol_column)?,
            open: find("open")?,
            high: find("high")?,
            low: find("low")?,
            close: find("close")?,
            volume: find("volume")?,
            trade_count: find("trade_count")?,
            vwap: find("vwap")?,
        })
    }
}

#[derive(Debug, PartialEq)]
enum TimestampError {
    Naive,
    Unparsable,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Tz>, TimestampError> {
    let parsed = DateTime::parse_from_rfc3339(raw).or_else(|_| {
        OFFSET_FORMATS
            .iter()
            .find_map(|f| DateTime::parse_from_str(raw, f).ok())
            .ok_or(TimestampError::Unparsable)
    });
    if let Ok(dt) = parsed {
        return Ok(dt.with_timezone(&chrono_tz::UTC));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .any(|f| NaiveDateTime::parse_from_str(raw, f).is_ok())
        || NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok();
    if naive {
        Err(TimestampError::Naive)
    } else {
        Err(TimestampError::Unparsable)
    }
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

fn cell<'r>(record: &'r StringRecord, index: usize, name: &str) -> Result<&'r str, CrossrevError> {
    record
        .get(index)
        .ok_or_else(|| CrossrevError::InvalidRecord {
            line: record_line(record),
            reason: format!("missing {name} value"),
        })
}

fn parse_float(record: &StringRecord, index: usize, name: &str) -> Result<f64, CrossrevError> {
    let raw = cell(record, index, name)?;
    raw.parse::<f64>()
        .map_err(|e| CrossrevError::InvalidRecord {
            line: record_line(record),
            reason: format!("invalid {name} value {raw:?}: {e}"),
        })
}

/// Whole numbers written as floats (`1200.0`) are accepted.
fn parse_count(record: &StringRecord, index: usize, name: &str) -> Result<i64, CrossrevError> {
    let raw = cell(record, index, name)?;
    raw.parse::<i64>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && v.fract() == 0.0)
                .map(|v| v as i64)
        })
        .ok_or_else(|| CrossrevError::InvalidRecord {
            line: record_line(record),
            reason: format!("invalid {name} value {raw:?}"),
        })
}

fn from_csv(err: csv::Error) -> CrossrevError {
    let line = err.position().map_or(0, |p| p.line());
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) => CrossrevError::Io(e),
        _ => CrossrevError::InvalidRecord { line, reason },
    }
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

impl CsvAdapter {
    pub fn new(config: DataConfig) -> Self {
        Self { config }
    }

    /// Parse a bar table from any reader; `load_bars` uses this on the
    /// configured file.
    pub fn read_bars<R: io::Read>(&self, reader: R) -> Result<Vec<Bar>, CrossrevError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers().map_err(from_csv)?.clone();
        let columns = Columns::locate(&headers, &self.config)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(from_csv)?;
            let raw_ts = cell(&record, columns.timestamp, "timestamp")?;
            let timestamp = parse_timestamp(raw_ts).map_err(|e| match e {
                TimestampError::Naive => CrossrevError::NaiveTimestamp {
                    value: raw_ts.to_string(),
                },
                TimestampError::Unparsable => CrossrevError::InvalidRecord {
                    line: record_line(&record),
                    reason: format!("invalid timestamp {raw_ts:?}"),
                },
            })?;

            let symbol = cell(&record, columns.symbol, "symbol")?;
            if symbol.is_empty() {
                return Err(CrossrevError::InvalidRecord {
                    line: record_line(&record),
                    reason: "empty symbol".to_string(),
                });
            }

            bars.push(Bar {
                timestamp,
                symbol: symbol.to_string(),
                open: parse_float(&record, columns.open, "open")?,
                high: parse_float(&record, columns.high, "high")?,
                low: parse_float(&record, columns.low, "low")?,
                close: parse_float(&record, columns.close, "close")?,
                volume: parse_count(&record, columns.volume, "volume")?,
                trade_count: parse_count(&record, columns.trade_count, "trade_count")?,
                vwap: parse_float(&record, columns.vwap, "vwap")?,
            });
        }

        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn load_bars(&self) -> Result<Vec<Bar>, CrossrevError> {
        let file = fs::File::open(&self.config.path)?;
        let bars = self.read_bars(io::BufReader::new(file))?;
        info!(path = %self.config.path.display(), bars = bars.len(), "loaded bars");
        Ok(bars)
    }
}

/// Write bars with the standard column names, timestamps in RFC 3339.
pub fn write_bars(path: &Path, bars: &[Bar]) -> Result<(), CrossrevError> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path).map_err(from_csv)?;
    wtr.write_record(BAR_HEADER).map_err(from_csv)?;
    for bar in bars {
        wtr.write_record([
            bar.timestamp.to_rfc3339(),
            bar.symbol.clone(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
            bar.trade_count.to_string(),
            bar.vwap.to_string(),
        ])
        .map_err(from_csv)?;
    }
    wtr.flush()?;
    debug!(path = %path.display(), rows = bars.len(), "wrote bars");
    Ok(())
}

/// `timestamp,portfolio_value` table of the value series.
#[derive(Debug, Default)]
pub struct ValuesCsvReport;

impl ReportPort for ValuesCsvReport {
    fn write(
        &self,
        values: &[EquityPoint],
        _initial_value: f64,
        output_path: &Path,
    ) -> Result<(), CrossrevError> {
        ensure_parent(output_path)?;
        let mut wtr = csv::Writer::from_path(output_path).map_err(from_csv)?;
        wtr.write_record(["timestamp", "portfolio_value"])
            .map_err(from_csv)?;
        for point in values {
            wtr.write_record([point.timestamp.to_rfc3339(), point.value.to_string()])
                .map_err(from_csv)?;
        }
        wtr.flush()?;
        info!(path = %output_path.display(), points = values.len(), "wrote value series");
        Ok(())
    }
}
