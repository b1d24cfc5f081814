//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::NavtraderError;
use std::path::Path;

/// Port for persisting a finished run.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), NavtraderError>;
}
