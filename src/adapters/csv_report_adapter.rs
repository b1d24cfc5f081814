//! CSV report adapter: writes `nav.csv`, `audit.csv` and `trades.csv` into an
//! output directory.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::NavtraderError;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const NAV_FILE: &str = "nav.csv";
pub const AUDIT_FILE: &str = "audit.csv";
pub const TRADES_FILE: &str = "trades.csv";

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct NavRow {
    date: String,
    equity: f64,
}

#[derive(Serialize)]
struct AuditRow<'a> {
    date: String,
    asset: &'a str,
    position: u64,
    signal: i8,
    size: u64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    cash: f64,
    value: f64,
    trades: u32,
    action: String,
    position_after: u64,
}

#[derive(Serialize)]
struct TradeRow<'a> {
    asset: &'a str,
    quantity: u64,
    entry_date: String,
    exit_date: String,
    entry_price: f64,
    exit_price: f64,
    pnl: f64,
}

fn export_err(path: &Path, e: impl std::fmt::Display) -> NavtraderError {
    NavtraderError::Export {
        reason: format!("{}: {}", path.display(), e),
    }
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), NavtraderError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| export_err(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| export_err(path, e))?;
    }
    writer.flush().map_err(|e| export_err(path, e))?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), NavtraderError> {
        fs::create_dir_all(output_dir).map_err(|e| export_err(output_dir, e))?;
        let log = &result.log;

        write_rows(
            &output_dir.join(NAV_FILE),
            log.nav().iter().map(|p| NavRow {
                date: p.date.to_string(),
                equity: p.equity,
            }),
        )?;

        write_rows(
            &output_dir.join(AUDIT_FILE),
            log.records().iter().map(|r| AuditRow {
                date: r.date.to_string(),
                asset: &r.asset,
                position: r.position,
                signal: r.signal.value(),
                size: r.target_size,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                volume: r.volume,
                cash: r.cash,
                value: r.equity,
                trades: r.trades,
                action: r.action.to_string(),
                position_after: r.position_after,
            }),
        )?;

        write_rows(
            &output_dir.join(TRADES_FILE),
            log.closed_trades().iter().map(|t| TradeRow {
                asset: &t.asset,
                quantity: t.quantity,
                entry_date: t.entry_date.to_string(),
                exit_date: t.exit_date.to_string(),
                entry_price: t.entry_price,
                exit_price: t.exit_price,
                pnl: t.pnl,
            }),
        )?;

        log::info!("Report written to {}", output_dir.display());
        Ok(())
    }
}
