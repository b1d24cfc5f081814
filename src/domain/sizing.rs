//! Equity-fraction position sizing.
//!
//! Each asset is sized against total equity at the moment it is evaluated, not
//! against cash left over by assets processed earlier in the same date. Several
//! simultaneous entries can therefore authorise more notional than the cash on
//! hand; [`CashGuard`](super::execution::CashGuard) decides what happens then.

use crate::domain::error::NavtraderError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingPolicy {
    size_pct: f64,
}

impl SizingPolicy {
    /// `size_pct` must lie in (0, 1].
    pub fn new(size_pct: f64) -> Result<Self, NavtraderError> {
        if !(size_pct > 0.0 && size_pct <= 1.0) {
            return Err(NavtraderError::invalid(
                "backtest",
                "size_pct",
                "size_pct must be in (0, 1]",
            ));
        }
        Ok(SizingPolicy { size_pct })
    }

    pub fn size_pct(&self) -> f64 {
        self.size_pct
    }

    /// floor(equity × size_pct / price); zero for a non-positive price or equity.
    pub fn target_size(&self, equity: f64, price: f64) -> u64 {
        if !(price > 0.0 && price.is_finite()) || !(equity > 0.0 && equity.is_finite()) {
            return 0;
        }
        (equity * self.size_pct / price).floor() as u64
    }
}

/// Largest whole quantity whose debit `q × fill_price × (1 + commission_rate)`
/// fits in `cash`.
pub fn affordable_size(cash: f64, fill_price: f64, commission_rate: f64) -> u64 {
    let unit_cost = fill_price * (1.0 + commission_rate);
    if !(unit_cost > 0.0 && unit_cost.is_finite()) || !(cash > 0.0) {
        return 0;
    }
    let mut quantity = (cash / unit_cost).floor() as u64;
    // floor on the quotient can still overshoot by one ulp-driven unit
    while quantity > 0 && quantity as f64 * fill_price * (1.0 + commission_rate) > cash {
        quantity -= 1;
    }
    quantity
}
