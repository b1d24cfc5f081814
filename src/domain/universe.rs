//! The ordered asset universe: parsing it from configuration and loading one
//! history per asset through a [`DataPort`].

use crate::domain::bar::OhlcvBar;
use crate::domain::error::NavtraderError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use log::info;
use std::collections::HashSet;

/// Splits a comma list into asset identifiers, kept exactly as written
/// (trimmed) and in the given order.
pub fn parse_assets(input: &str) -> Result<Vec<String>, NavtraderError> {
    let mut assets = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(NavtraderError::invalid(
                "backtest",
                "assets",
                "empty token in asset list",
            ));
        }
        let asset = trimmed.to_string();
        if !seen.insert(asset.clone()) {
            return Err(NavtraderError::invalid(
                "backtest",
                "assets",
                format!("duplicate asset: {asset}"),
            ));
        }
        assets.push(asset);
    }

    Ok(assets)
}

/// Fetches every asset's bars, in universe order. An asset the source does not
/// carry, or one with no bars in the requested window, fails the load.
pub fn load_histories(
    data_port: &dyn DataPort,
    assets: &[String],
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<Vec<(String, Vec<OhlcvBar>)>, NavtraderError> {
    let available: HashSet<String> = data_port.list_assets()?.into_iter().collect();
    if let Some(asset) = assets.iter().find(|a| !available.contains(*a)) {
        return Err(NavtraderError::MissingSeries {
            asset: asset.clone(),
        });
    }

    let mut histories = Vec::with_capacity(assets.len());
    for asset in assets {
        let bars = data_port.fetch_ohlcv(asset, start_date, end_date)?;
        if bars.is_empty() {
            return Err(NavtraderError::NoData {
                asset: asset.clone(),
            });
        }
        info!("  {}: {} bars", asset, bars.len());
        histories.push((asset.clone(), bars));
    }
    Ok(histories)
}
