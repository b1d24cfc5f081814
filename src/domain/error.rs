//! Domain error types.
//!
//! [`NavtraderError`] aborts whatever produced it. [`BarSkip`] is the
//! non-fatal per-bar counterpart: the engine records it and keeps going.

use chrono::NaiveDate;

/// Top-level error type for navtrader.
#[derive(Debug, thiserror::Error)]
pub enum NavtraderError {
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

    #[error("no bar series supplied for {asset}")]
    MissingSeries { asset: String },

    #[error("bars for {asset} are not strictly increasing at {date}")]
    UnsortedSeries { asset: String, date: NaiveDate },

    #[error("feed universe does not match engine universe: {reason}")]
    UniverseMismatch { reason: String },

    #[error("invalid parameter {name} for {provider}: {reason}")]
    InvalidParameter {
        provider: String,
        name: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("export error: {reason}")]
    Export { reason: String },

    #[error("no data for {asset}")]
    NoData { asset: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NavtraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        NavtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        NavtraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&NavtraderError> for std::process::ExitCode {
    fn from(err: &NavtraderError) -> Self {
        let code: u8 = match err {
            NavtraderError::Io(_) | NavtraderError::Export { .. } => 1,
            NavtraderError::ConfigParse { .. }
            | NavtraderError::ConfigMissing { .. }
            | NavtraderError::ConfigInvalid { .. }
            | NavtraderError::UniverseMismatch { .. } => 2,
            NavtraderError::Data { .. }
            | NavtraderError::Database { .. }
            | NavtraderError::MissingSeries { .. }
            | NavtraderError::UnsortedSeries { .. } => 3,
            NavtraderError::InvalidParameter { .. } => 4,
            NavtraderError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

/// A bar the engine declined to trade on. Never fatal to the run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BarSkip {
    #[error("{asset} has no bar on {date}")]
    DataGap { asset: String, date: NaiveDate },

    #[error("{asset} has non-positive price {price} on {date}")]
    DegeneratePrice {
        asset: String,
        date: NaiveDate,
        price: f64,
    },
}

impl BarSkip {
    pub fn asset(&self) -> &str {
        match self {
            BarSkip::DataGap { asset, .. } | BarSkip::DegeneratePrice { asset, .. } => asset,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            BarSkip::DataGap { date, .. } | BarSkip::DegeneratePrice { date, .. } => *date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitCode;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn config_invalid_message() {
        let err = NavtraderError::invalid("backtest", "size_pct", "must be in (0, 1]");
        assert_eq!(
            err.to_string(),
            "invalid config value [backtest] size_pct: must be in (0, 1]"
        );
    }

    #[test]
    fn exit_codes_group_by_kind() {
        let config = NavtraderError::missing("backtest", "assets");
        let param = NavtraderError::InvalidParameter {
            provider: "trend_intensity".into(),
            name: "window_1".into(),
            reason: "must be positive".into(),
        };
        assert_eq!(
            format!("{:?}", ExitCode::from(&config)),
            format!("{:?}", ExitCode::from(2))
        );
        assert_eq!(
            format!("{:?}", ExitCode::from(&param)),
            format!("{:?}", ExitCode::from(4))
        );
    }

    #[test]
    fn bar_skip_accessors() {
        let gap = BarSkip::DataGap {
            asset: "000300.SH".into(),
            date: day(),
        };
        assert_eq!(gap.asset(), "000300.SH");
        assert_eq!(gap.date(), day());
        assert_eq!(gap.to_string(), "000300.SH has no bar on 2024-03-01");

        let degenerate = BarSkip::DegeneratePrice {
            asset: "399006.SZ".into(),
            date: day(),
            price: 0.0,
        };
        assert_eq!(degenerate.asset(), "399006.SZ");
    }
}
