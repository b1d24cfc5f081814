#![allow(dead_code)]

use chrono::NaiveDate;
use navtrader::domain::backtest::BacktestConfig;
use navtrader::domain::bar::{Bar, Signal};
pub use navtrader::domain::bar::OhlcvBar;
use navtrader::domain::error::NavtraderError;
use navtrader::domain::execution::{CashGuard, Slippage};
use navtrader::domain::feed::{AssetSeries, BarFeed};
use navtrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, asset: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(asset.to_string(), bars);
        self
    }

    pub fn with_error(mut self, asset: &str, reason: &str) -> Self {
        self.errors.insert(asset.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        asset: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, NavtraderError> {
        if let Some(reason) = self.errors.get(asset) {
            return Err(NavtraderError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(asset)
            .map(|bars| {
                bars.iter()
                    .filter(|b| start_date.is_none_or(|s| b.date >= s))
                    .filter(|b| end_date.is_none_or(|e| b.date <= e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_assets(&self) -> Result<Vec<String>, NavtraderError> {
        let mut assets: Vec<String> = self
            .data
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        assets.sort();
        assets.dedup();
        Ok(assets)
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// `n` consecutive calendar days from 2024-01-01.
pub fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n as i64)
}

pub fn make_ohlcv(asset: &str, date: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        asset: asset.to_string(),
        date,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 10_000.0,
    }
}

pub fn ohlcv_series(asset: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_ohlcv(asset, day(i as u32), c))
        .collect()
}

pub fn make_bar(date: NaiveDate, close: f64, signal: i8) -> Bar {
    Bar {
        date,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000.0,
        signal: Signal::from_value(signal).unwrap(),
    }
}

/// Bars on consecutive days from `day(0)`.
pub fn make_bars(closes: &[f64], signals: &[i8]) -> Vec<Bar> {
    assert_eq!(closes.len(), signals.len());
    closes
        .iter()
        .zip(signals)
        .enumerate()
        .map(|(i, (&c, &s))| make_bar(day(i as u32), c, s))
        .collect()
}

/// Bars on the given day offsets only, for building gaps.
pub fn bars_on_days(days: &[u32], closes: &[f64], signals: &[i8]) -> Vec<Bar> {
    days.iter()
        .zip(closes.iter().zip(signals))
        .map(|(&d, (&c, &s))| make_bar(day(d), c, s))
        .collect()
}

pub fn feed(series: Vec<(&str, Vec<Bar>)>) -> BarFeed {
    BarFeed::new(
        series
            .into_iter()
            .map(|(asset, bars)| AssetSeries::new(asset, bars).unwrap())
            .collect(),
    )
}

pub fn make_config(universe: &[&str]) -> BacktestConfig {
    BacktestConfig {
        initial_cash: 100_000.0,
        commission_rate: 0.0,
        slippage: Slippage::Percent(0.0),
        size_pct: 1.0,
        cash_guard: CashGuard::Reject,
        universe: universe.iter().map(|s| s.to_string()).collect(),
    }
}
