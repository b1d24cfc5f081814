//! Signal providers turn raw OHLCV history into the per-bar [`Signal`] level the
//! engine trades on.
//!
//! A provider emits *triggers*: `Some(Buy)`/`Some(Sell)` on the bars where its
//! crossing condition fires, `None` elsewhere. [`annotate`] forward-fills those
//! triggers into levels and drops the warm-up bars before the first trigger.

pub mod adx_river;
pub mod bull_bear;
pub mod smoothing;
pub mod trend_intensity;

use std::collections::HashMap;

use super::bar::{Bar, OhlcvBar, Signal};
use super::error::NavtraderError;

pub use adx_river::AdxRiver;
pub use bull_bear::BullBearPower;
pub use trend_intensity::TrendIntensity;

pub trait SignalProvider: Send + Sync {
    fn name(&self) -> &str;

    /// One entry per input bar.
    fn triggers(&self, bars: &[OhlcvBar]) -> Vec<Option<Signal>>;
}

/// Forward-fills the provider's triggers and returns the bars from the first
/// trigger onwards.
pub fn annotate(bars: &[OhlcvBar], provider: &dyn SignalProvider) -> Vec<Bar> {
    let triggers = provider.triggers(bars);
    let mut level: Option<Signal> = None;
    bars.iter()
        .zip(triggers)
        .filter_map(|(bar, trigger)| {
            if trigger.is_some() {
                level = trigger;
            }
            level.map(|signal| Bar::from_ohlcv(bar, signal))
        })
        .collect()
}

/// Annotates every asset's history with the same provider.
pub fn annotate_all(
    histories: &[(String, Vec<OhlcvBar>)],
    provider: &dyn SignalProvider,
) -> HashMap<String, Vec<Bar>> {
    histories
        .iter()
        .map(|(asset, bars)| (asset.clone(), annotate(bars, provider)))
        .collect()
}

/// `a` moved from at-or-below `b` to strictly above it between `t-1` and `t`.
pub fn crossed_above(a: &[Option<f64>], b: &[Option<f64>], t: usize) -> bool {
    match pair_at(a, b, t) {
        Some(((pa, pb), (na, nb))) => pa <= pb && na > nb,
        None => false,
    }
}

/// `a` moved from strictly above `b` to at-or-below it between `t-1` and `t`.
pub fn crossed_to_or_below(a: &[Option<f64>], b: &[Option<f64>], t: usize) -> bool {
    match pair_at(a, b, t) {
        Some(((pa, pb), (na, nb))) => pa > pb && na <= nb,
        None => false,
    }
}

fn pair_at(a: &[Option<f64>], b: &[Option<f64>], t: usize) -> Option<((f64, f64), (f64, f64))> {
    if t == 0 {
        return None;
    }
    let prev = (a.get(t - 1).copied()??, b.get(t - 1).copied()??);
    let now = (a.get(t).copied()??, b.get(t).copied()??);
    Some((prev, now))
}

/// Named numeric parameters, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    values: Vec<(String, f64)>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces an existing value of the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Display for ParamSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (name, value) in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// Reads a window length: required, integral, at least 1.
pub(crate) fn window_param(
    provider: &str,
    params: &ParamSet,
    name: &str,
) -> Result<usize, NavtraderError> {
    let invalid = |reason: &str| NavtraderError::InvalidParameter {
        provider: provider.to_string(),
        name: name.to_string(),
        reason: reason.to_string(),
    };
    let value = params.get(name).ok_or_else(|| invalid("missing"))?;
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(invalid(&format!("{value} is not a whole number")));
    }
    if value < 1.0 {
        return Err(invalid(&format!("{value} must be at least 1")));
    }
    Ok(value as usize)
}

/// Names accepted by [`build_provider`].
pub const PROVIDER_NAMES: [&str; 3] = [TrendIntensity::NAME, BullBearPower::NAME, AdxRiver::NAME];

pub fn build_provider(
    name: &str,
    params: &ParamSet,
) -> Result<Box<dyn SignalProvider>, NavtraderError> {
    match name {
        TrendIntensity::NAME => Ok(Box::new(TrendIntensity::from_params(params)?)),
        BullBearPower::NAME => Ok(Box::new(BullBearPower::from_params(params)?)),
        AdxRiver::NAME => Ok(Box::new(AdxRiver::from_params(params)?)),
        other => Err(NavtraderError::invalid(
            "strategy",
            "name",
            format!("unknown provider '{other}' (expected one of {})", PROVIDER_NAMES.join(", ")),
        )),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::NaiveDate;

    pub fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                asset: "TEST".to_string(),
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0,
            })
            .collect()
    }
}
