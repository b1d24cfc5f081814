//! Shared cash and mark-to-market equity.

use chrono::NaiveDate;

use super::position::PositionBook;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Cash plus the latest valuation price of every asset in the universe.
///
/// A mark is the most recent tradable close seen for that asset. Assets with a
/// gap keep their previous mark; equity never carries a price into trading.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioLedger {
    cash: f64,
    initial_cash: f64,
    marks: Vec<Option<f64>>,
}

impl PortfolioLedger {
    pub fn new(initial_cash: f64, asset_count: usize) -> Self {
        PortfolioLedger {
            cash: initial_cash,
            initial_cash,
            marks: vec![None; asset_count],
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn mark(&mut self, index: usize, price: f64) {
        if let Some(slot) = self.marks.get_mut(index) {
            *slot = Some(price);
        }
    }

    pub fn mark_price(&self, index: usize) -> Option<f64> {
        self.marks.get(index).copied().flatten()
    }

    pub(crate) fn debit(&mut self, amount: f64) {
        self.cash -= amount;
    }

    pub(crate) fn credit(&mut self, amount: f64) {
        self.cash += amount;
    }

    /// cash + Σ size × mark, summed in universe order.
    pub fn total_equity(&self, book: &PositionBook) -> f64 {
        let position_value: f64 = book
            .sizes()
            .filter(|&(_, size)| size > 0)
            .map(|(i, size)| size as f64 * self.mark_price(i).unwrap_or(0.0))
            .sum();
        self.cash + position_value
    }
}
