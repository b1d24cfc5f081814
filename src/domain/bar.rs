//! Price bars and trading signals.
//!
//! [`OhlcvBar`] is what a data source yields. [`Bar`] is the same record after a
//! signal provider has annotated it with a forward-filled [`Signal`] level; it is
//! the only input the execution engine reads.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub asset: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Directional stance for one asset on one date.
///
/// A level, not an event: it holds until the provider emits a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Sell,
    Neutral,
    Buy,
}

impl Signal {
    pub fn value(self) -> i8 {
        match self {
            Signal::Sell => -1,
            Signal::Neutral => 0,
            Signal::Buy => 1,
        }
    }

    pub fn from_value(value: i8) -> Option<Signal> {
        match value {
            -1 => Some(Signal::Sell),
            0 => Some(Signal::Neutral),
            1 => Some(Signal::Buy),
            _ => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// One dated OHLCV record plus the signal level in force on that date.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub signal: Signal,
}

impl Bar {
    pub fn from_ohlcv(bar: &OhlcvBar, signal: Signal) -> Self {
        Bar {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            signal,
        }
    }

    /// A close that can be sized and filled against.
    pub fn has_tradable_close(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}
