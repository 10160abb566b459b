//! Domain error types.

/// Top-level error type for crossrev.
#[derive(Debug, thiserror::Error)]
pub enum CrossrevError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("missing required column: {column}")]
    MissingColumn { column: String },

    #[error("invalid record at line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    #[error("timestamp is not timezone-aware: {value}")]
    NaiveTimestamp { value: String },

    #[error("bars for {symbol} are not in strictly increasing timestamp order")]
    NonChronological { symbol: String },

    #[error("no data: {reason}")]
    NoData { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CrossrevError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        CrossrevError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&CrossrevError> for std::process::ExitCode {
    fn from(err: &CrossrevError) -> Self {
        let code: u8 = match err {
            CrossrevError::Io(_) => 1,
            CrossrevError::ConfigParse { .. }
            | CrossrevError::ConfigMissing { .. }
            | CrossrevError::ConfigInvalid { .. } => 2,
            CrossrevError::MissingColumn { .. }
            | CrossrevError::InvalidRecord { .. }
            | CrossrevError::NaiveTimestamp { .. }
            | CrossrevError::NonChronological { .. } => 3,
            CrossrevError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
