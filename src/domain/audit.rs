//! Append-only record of a run: NAV series, per-bar audit rows, fills,
//! round trips, skipped bars, and per-asset trade counts.

use chrono::NaiveDate;
use std::fmt;

use super::bar::Signal;
use super::error::BarSkip;
use super::execution::Order;
use super::portfolio::EquityPoint;
use super::position::ClosedTrade;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    None,
    Buy,
    Close,
    Rejected,
    Skipped,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuditAction::None => "",
            AuditAction::Buy => "BUY",
            AuditAction::Close => "CLOSE",
            AuditAction::Rejected => "REJECTED",
            AuditAction::Skipped => "SKIPPED",
        };
        f.write_str(label)
    }
}

/// One row per (date, asset). Cash and equity are read after that asset's
/// order, if any, has settled.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub date: NaiveDate,
    pub asset: String,
    pub position: u64,
    pub signal: Signal,
    pub target_size: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub cash: f64,
    pub equity: f64,
    pub trades: u32,
    pub action: AuditAction,
    pub position_after: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditLog {
    assets: Vec<String>,
    trade_counts: Vec<u32>,
    nav: Vec<EquityPoint>,
    records: Vec<AuditRecord>,
    fills: Vec<Order>,
    closed_trades: Vec<ClosedTrade>,
    skipped: Vec<BarSkip>,
}

impl AuditLog {
    pub fn new(assets: Vec<String>) -> Self {
        let trade_counts = vec![0; assets.len()];
        AuditLog {
            assets,
            trade_counts,
            nav: Vec::new(),
            records: Vec::new(),
            fills: Vec::new(),
            closed_trades: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Stores the fill and bumps that asset's trade counter.
    pub fn record_fill(&mut self, index: usize, order: Order) {
        if let Some(count) = self.trade_counts.get_mut(index) {
            *count += 1;
        }
        self.fills.push(order);
    }

    pub fn record_closed_trade(&mut self, trade: ClosedTrade) {
        self.closed_trades.push(trade);
    }

    pub fn record_skip(&mut self, skip: BarSkip) {
        self.skipped.push(skip);
    }

    pub fn record_bar(&mut self, record: AuditRecord) {
        self.records.push(record);
    }

    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) {
        self.nav.push(EquityPoint { date, equity });
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn nav(&self) -> &[EquityPoint] {
        &self.nav
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn fills(&self) -> &[Order] {
        &self.fills
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    pub fn skipped(&self) -> &[BarSkip] {
        &self.skipped
    }

    pub fn trade_count_at(&self, index: usize) -> u32 {
        self.trade_counts.get(index).copied().unwrap_or(0)
    }

    pub fn trade_count(&self, asset: &str) -> Option<u32> {
        self.assets
            .iter()
            .position(|a| a == asset)
            .map(|i| self.trade_counts[i])
    }

    /// `(asset, count)` in universe order.
    pub fn trade_counts(&self) -> impl Iterator<Item = (&str, u32)> {
        self.assets
            .iter()
            .map(String::as_str)
            .zip(self.trade_counts.iter().copied())
    }

    pub fn total_trades(&self) -> u32 {
        self.trade_counts.iter().sum()
    }

    pub fn final_equity(&self) -> Option<f64> {
        self.nav.last().map(|p| p.equity)
    }
}
