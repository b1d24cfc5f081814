//! Data access port trait.

use crate::domain::bar::OhlcvBar;
use crate::domain::error::NavtraderError;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `asset` in ascending date order, limited to `[start, end]` when
    /// bounds are given.
    fn fetch_ohlcv(
        &self,
        asset: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, NavtraderError>;

    fn list_assets(&self) -> Result<Vec<String>, NavtraderError>;
}
