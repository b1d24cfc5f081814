//! Trend Intensity Index crossing its own smoothed signal line.

use super::smoothing::{alpha_from_com, ewm_recursive, rolling_mean, rolling_sum};
use super::{ParamSet, SignalProvider, crossed_above, crossed_to_or_below, window_param};
use crate::domain::bar::{OhlcvBar, Signal};
use crate::domain::error::NavtraderError;

/// `window_1` is the moving-average length; deviations are summed over
/// `window_1 / 2 + 1` bars. `window_2` is the signal line's centre of mass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendIntensity {
    window_1: usize,
    window_2: usize,
}

impl TrendIntensity {
    pub const NAME: &'static str = "trend_intensity";

    pub fn new(window_1: usize, window_2: usize) -> Result<Self, NavtraderError> {
        for (name, value) in [("window_1", window_1), ("window_2", window_2)] {
            if value == 0 {
                return Err(NavtraderError::InvalidParameter {
                    provider: Self::NAME.to_string(),
                    name: name.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(TrendIntensity { window_1, window_2 })
    }

    pub fn from_params(params: &ParamSet) -> Result<Self, NavtraderError> {
        Self::new(
            window_param(Self::NAME, params, "window_1")?,
            window_param(Self::NAME, params, "window_2")?,
        )
    }

    /// `(tii, signal_line)`, both undefined through warm-up.
    pub fn compute(&self, bars: &[OhlcvBar]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
        let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
        let ma = rolling_mean(&closes, self.window_1);

        // deviations before the average exists count as zero
        let deviation: Vec<f64> = bars
            .iter()
            .zip(&ma)
            .map(|(bar, avg)| avg.map_or(0.0, |m| bar.close - m))
            .collect();
        let positive: Vec<Option<f64>> = deviation.iter().map(|d| Some(d.max(0.0))).collect();
        let negative: Vec<Option<f64>> = deviation.iter().map(|d| Some((-d).max(0.0))).collect();

        let span = self.window_1 / 2 + 1;
        let pos_sum = rolling_sum(&positive, span);
        let neg_sum = rolling_sum(&negative, span);

        let tii: Vec<Option<f64>> = pos_sum
            .iter()
            .zip(&neg_sum)
            .map(|(p, n)| match (p, n) {
                (Some(p), Some(n)) if p + n > 0.0 => Some(100.0 * p / (p + n)),
                _ => None,
            })
            .collect();
        let signal_line = ewm_recursive(&tii, alpha_from_com(self.window_2 as f64));
        (tii, signal_line)
    }
}

impl SignalProvider for TrendIntensity {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn triggers(&self, bars: &[OhlcvBar]) -> Vec<Option<Signal>> {
        let (tii, line) = self.compute(bars);
        (0..bars.len())
            .map(|t| {
                if crossed_above(&tii, &line, t) {
                    Some(Signal::Buy)
                } else if crossed_to_or_below(&tii, &line, t) {
                    Some(Signal::Sell)
                } else {
                    None
                }
            })
            .collect()
    }
}
