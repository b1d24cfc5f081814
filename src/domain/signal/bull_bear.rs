//! Elder-ray bull and bear power around an exponential average of close.

use super::smoothing::{alpha_from_com, ewm_adjusted};
use super::{ParamSet, SignalProvider, window_param};
use crate::domain::bar::{OhlcvBar, Signal};
use crate::domain::error::NavtraderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BullBearPower {
    window: usize,
}

impl BullBearPower {
    pub const NAME: &'static str = "bull_bear_power";

    pub fn new(window: usize) -> Result<Self, NavtraderError> {
        if window == 0 {
            return Err(NavtraderError::InvalidParameter {
                provider: Self::NAME.to_string(),
                name: "window_1".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(BullBearPower { window })
    }

    /// Reads `window_1`.
    pub fn from_params(params: &ParamSet) -> Result<Self, NavtraderError> {
        Self::new(window_param(Self::NAME, params, "window_1")?)
    }

    /// `(bull, bear)` power per bar.
    pub fn compute(&self, bars: &[OhlcvBar]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
        let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
        let ema = ewm_adjusted(&closes, alpha_from_com(self.window as f64));
        let bull = bars
            .iter()
            .zip(&ema)
            .map(|(bar, e)| e.map(|e| bar.high - e))
            .collect();
        let bear = bars
            .iter()
            .zip(&ema)
            .map(|(bar, e)| e.map(|e| bar.low - e))
            .collect();
        (bull, bear)
    }
}

impl SignalProvider for BullBearPower {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn triggers(&self, bars: &[OhlcvBar]) -> Vec<Option<Signal>> {
        let (bull, bear) = self.compute(bars);
        let zero = vec![Some(0.0); bars.len()];
        (0..bars.len())
            .map(|t| {
                // sell takes precedence when both fire
                if super::crossed_to_or_below(&bull, &zero, t) {
                    Some(Signal::Sell)
                } else if super::crossed_above(&bear, &zero, t) {
                    Some(Signal::Buy)
                } else {
                    None
                }
            })
            .collect()
    }
}
