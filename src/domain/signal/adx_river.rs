//! "River" candle filter combined with the Wilder directional index.
//!
//! Prices are rounded to whole numbers before anything is computed. The filter
//! votes +1 after ten calm bars with at least seven closing above their open,
//! -1 otherwise; the DI votes +1 when +DI leads. Only a double -1 is a sell
//! level, so a level is produced on every bar.

use super::smoothing::{ewm_recursive, rolling_sum};
use super::{ParamSet, SignalProvider, window_param};
use crate::domain::bar::{OhlcvBar, Signal};
use crate::domain::error::NavtraderError;

const FILTER_WINDOW: usize = 10;
const MIN_RED_BARS: f64 = 7.0;
const BAND_LOW: f64 = -0.02;
const BAND_HIGH: f64 = 0.03;

/// Whole-number OHLC, rounded half to even.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundedBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl From<&OhlcvBar> for RoundedBar {
    fn from(bar: &OhlcvBar) -> Self {
        RoundedBar {
            open: bar.open.round_ties_even(),
            high: bar.high.round_ties_even(),
            low: bar.low.round_ties_even(),
            close: bar.close.round_ties_even(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdxRiver {
    window_1: usize,
}

impl AdxRiver {
    pub const NAME: &'static str = "adx_river";
    pub const DEFAULT_WINDOW: usize = 28;

    pub fn new(window_1: usize) -> Result<Self, NavtraderError> {
        if window_1 == 0 {
            return Err(NavtraderError::InvalidParameter {
                provider: Self::NAME.to_string(),
                name: "window_1".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(AdxRiver { window_1 })
    }

    /// `window_1` is the DI smoothing length, 28 when not given.
    pub fn from_params(params: &ParamSet) -> Result<Self, NavtraderError> {
        match params.get("window_1") {
            None => Self::new(Self::DEFAULT_WINDOW),
            Some(_) => Self::new(window_param(Self::NAME, params, "window_1")?),
        }
    }

    pub fn window(&self) -> usize {
        self.window_1
    }

    /// +1 where the trailing ten bars all moved within [-2%, +3%] open to close
    /// and at least seven closed above their open; -1 elsewhere.
    pub fn river_filter(bars: &[RoundedBar]) -> Vec<i8> {
        let in_band: Vec<Option<f64>> = bars
            .iter()
            .map(|b| {
                let change = (b.close - b.open) / b.open;
                Some(if (BAND_LOW..=BAND_HIGH).contains(&change) { 1.0 } else { 0.0 })
            })
            .collect();
        let red: Vec<Option<f64>> = bars
            .iter()
            .map(|b| Some(if b.close > b.open { 1.0 } else { 0.0 }))
            .collect();

        rolling_sum(&in_band, FILTER_WINDOW)
            .into_iter()
            .zip(rolling_sum(&red, FILTER_WINDOW))
            .map(|(band, red)| match (band, red) {
                (Some(band), Some(red)) if band == FILTER_WINDOW as f64 && red >= MIN_RED_BARS => 1,
                _ => -1,
            })
            .collect()
    }

    /// `(+DI, -DI)`; undefined where the smoothed true range is zero.
    pub fn directional_index(&self, bars: &[RoundedBar]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
        let mut true_range = Vec::with_capacity(bars.len());
        let mut plus_dm = Vec::with_capacity(bars.len());
        let mut minus_dm = Vec::with_capacity(bars.len());

        for (i, bar) in bars.iter().enumerate() {
            let hl = bar.high - bar.low;
            let Some(prev) = i.checked_sub(1).map(|p| bars[p]) else {
                true_range.push(Some(hl));
                plus_dm.push(Some(0.0));
                minus_dm.push(Some(0.0));
                continue;
            };
            let tr = hl
                .max((bar.high - prev.close).abs())
                .max((bar.low - prev.close).abs());
            let up = bar.high - prev.high;
            let down = prev.low - bar.low;
            true_range.push(Some(tr));
            plus_dm.push(Some(if up > 0.0 && up > down { up } else { 0.0 }));
            minus_dm.push(Some(if down > 0.0 && down > up { down } else { 0.0 }));
        }

        let alpha = 1.0 / self.window_1 as f64;
        let smoothed_tr = ewm_recursive(&true_range, alpha);
        let di = |dm: &[Option<f64>]| -> Vec<Option<f64>> {
            ewm_recursive(dm, alpha)
                .iter()
                .zip(&smoothed_tr)
                .map(|(dm, tr)| match (dm, tr) {
                    (Some(dm), Some(tr)) if *tr > 0.0 => Some(100.0 * dm / tr),
                    _ => None,
                })
                .collect()
        };
        (di(&plus_dm), di(&minus_dm))
    }

    /// Per-bar level before forward-filling.
    pub fn levels(&self, bars: &[OhlcvBar]) -> Vec<Signal> {
        let rounded: Vec<RoundedBar> = bars.iter().map(RoundedBar::from).collect();
        let filter = Self::river_filter(&rounded);
        let (plus_di, minus_di) = self.directional_index(&rounded);

        filter
            .iter()
            .zip(plus_di.iter().zip(&minus_di))
            .map(|(&river, (plus, minus))| {
                let trend: i8 = match (plus, minus) {
                    (Some(p), Some(m)) if p > m => 1,
                    (Some(_), Some(_)) => -1,
                    _ => 0,
                };
                if river + trend > -2 {
                    Signal::Buy
                } else {
                    Signal::Sell
                }
            })
            .collect()
    }
}

impl SignalProvider for AdxRiver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn triggers(&self, bars: &[OhlcvBar]) -> Vec<Option<Signal>> {
        self.levels(bars).into_iter().map(Some).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::test_support::bars_from_closes;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn ohlc(day: u32, open: f64, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            asset: "000300.SH".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    fn rounded(bars: &[OhlcvBar]) -> Vec<RoundedBar> {
        bars.iter().map(RoundedBar::from).collect()
    }

    fn three_bars() -> Vec<OhlcvBar> {
        vec![
            ohlc(1, 10.0, 12.0, 9.0, 11.0),
            ohlc(2, 11.0, 14.0, 10.0, 13.0),
            ohlc(3, 13.0, 13.0, 8.0, 9.0),
        ]
    }

    /// Ten bars opening at 100: `red` close at 101, the rest at 100.
    fn calm(red: usize) -> Vec<OhlcvBar> {
        (0..10)
            .map(|i| {
                let close = if i < red { 101.0 } else { 100.0 };
                ohlc(i as u32 + 1, 100.0, 102.0, 99.0, close)
            })
            .collect()
    }

    #[test]
    fn window_defaults_and_validation() {
        assert_eq!(AdxRiver::from_params(&ParamSet::new()).unwrap().window(), 28);
        let params = ParamSet::new().with("window_1", 14.0);
        assert_eq!(AdxRiver::from_params(&params).unwrap().window(), 14);
        let zero = ParamSet::new().with("window_1", 0.0);
        assert!(matches!(
            AdxRiver::from_params(&zero),
            Err(NavtraderError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn prices_round_half_to_even() {
        let bar = RoundedBar::from(&ohlc(1, 10.5, 11.5, 2.4, 3.6));
        assert_eq!(
            bar,
            RoundedBar {
                open: 10.0,
                high: 12.0,
                low: 2.0,
                close: 4.0
            }
        );
    }

    #[test]
    fn directional_index_values() {
        let provider = AdxRiver::new(2).unwrap();
        let (plus, minus) = provider.directional_index(&rounded(&three_bars()));

        // TR 3, 4, 5; +DM 0, 2, 0; -DM 0, 0, 2; alpha = 0.5
        assert_relative_eq!(plus[0].unwrap(), 0.0);
        assert_relative_eq!(minus[0].unwrap(), 0.0);
        assert_relative_eq!(plus[1].unwrap(), 100.0 / 3.5, max_relative = 1e-12);
        assert_relative_eq!(minus[1].unwrap(), 0.0);
        assert_relative_eq!(plus[2].unwrap(), 50.0 / 4.25, max_relative = 1e-12);
        assert_relative_eq!(minus[2].unwrap(), 100.0 / 4.25, max_relative = 1e-12);
    }

    #[test]
    fn levels_sell_only_when_both_votes_are_bearish() {
        let provider = AdxRiver::new(2).unwrap();
        // filter is -1 throughout (fewer than ten bars); DI ties, leads, lags
        assert_eq!(
            provider.levels(&three_bars()),
            vec![Signal::Sell, Signal::Buy, Signal::Sell]
        );
    }

    #[test]
    fn river_filter_needs_seven_red_bars() {
        assert_eq!(AdxRiver::river_filter(&rounded(&calm(7)))[9], 1);
        assert_eq!(AdxRiver::river_filter(&rounded(&calm(6)))[9], -1);
        assert!(AdxRiver::river_filter(&rounded(&calm(10)))[..9]
            .iter()
            .all(|&v| v == -1));
    }

    #[test]
    fn river_filter_drops_on_wide_bar() {
        let mut bars = calm(10);
        bars.push(ohlc(11, 100.0, 102.0, 94.0, 95.0));
        bars.push(ohlc(12, 100.0, 102.0, 99.0, 101.0));
        let filter = AdxRiver::river_filter(&rounded(&bars));
        assert_eq!(&filter[9..], &[1, -1, -1]);
    }

    #[test]
    fn emits_a_level_on_every_bar() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64 / 4.0).sin() * 5.0).collect();
        let triggers = AdxRiver::new(5).unwrap().triggers(&bars_from_closes(&closes));
        assert_eq!(triggers.len(), 40);
        assert!(triggers.iter().all(Option::is_some));
    }
}
