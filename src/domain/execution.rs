//! Order simulation: the Flat/Long state machine, slippage, and commission.
//!
//! Orders fill at the bar's close adjusted by slippage. Commission is a fraction
//! of fill notional and is always paid in cash: added to the debit on a buy,
//! taken out of the proceeds on a close.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use crate::domain::bar::Signal;
use crate::domain::error::NavtraderError;
use crate::domain::sizing::affordable_size;

/// Execution price penalty relative to the reference close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slippage {
    /// `price × (1 ± perc)`
    Percent(f64),
    /// `price ± offset`
    Fixed(f64),
}

impl Slippage {
    /// Picks the slippage mode from the two optional settings.
    ///
    /// A configured percentage always wins, whether or not a fixed offset is
    /// also present. Only when no percentage is configured is the fixed offset
    /// used. Having neither is a configuration error.
    pub fn resolve(percent: Option<f64>, fixed: Option<f64>) -> Result<Self, NavtraderError> {
        let slippage = match (percent, fixed) {
            (Some(perc), Some(offset)) => {
                log::warn!(
                    "both slippage_percent ({perc}) and slippage_fixed ({offset}) configured; using slippage_percent"
                );
                Slippage::Percent(perc)
            }
            (Some(perc), None) => Slippage::Percent(perc),
            (None, Some(offset)) => Slippage::Fixed(offset),
            (None, None) => return Err(NavtraderError::missing("backtest", "slippage_percent")),
        };
        slippage.validate()?;
        Ok(slippage)
    }

    pub fn validate(&self) -> Result<(), NavtraderError> {
        match *self {
            Slippage::Percent(perc) if !(0.0..1.0).contains(&perc) => Err(NavtraderError::invalid(
                "backtest",
                "slippage_percent",
                "slippage_percent must be in [0, 1)",
            )),
            Slippage::Fixed(offset) if !(offset >= 0.0 && offset.is_finite()) => {
                Err(NavtraderError::invalid(
                    "backtest",
                    "slippage_fixed",
                    "slippage_fixed must be non-negative",
                ))
            }
            _ => Ok(()),
        }
    }

    /// Buys fill above the reference price.
    pub fn buy_price(&self, price: f64) -> f64 {
        match *self {
            Slippage::Percent(perc) => price * (1.0 + perc),
            Slippage::Fixed(offset) => price + offset,
        }
    }

    /// Sells fill below the reference price, never below zero.
    pub fn sell_price(&self, price: f64) -> f64 {
        match *self {
            Slippage::Percent(perc) => price * (1.0 - perc),
            Slippage::Fixed(offset) => (price - offset).max(0.0),
        }
    }
}

/// What to do with a buy whose debit exceeds available cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CashGuard {
    /// Refuse the order outright.
    #[default]
    Reject,
    /// Shrink the order to what cash can pay for.
    Clamp,
    /// Fill the full equity-sized order; cash may go negative.
    Allow,
}

impl FromStr for CashGuard {
    type Err = NavtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(CashGuard::Reject),
            "clamp" => Ok(CashGuard::Clamp),
            "allow" => Ok(CashGuard::Allow),
            other => Err(NavtraderError::invalid(
                "backtest",
                "cash_guard",
                format!("unknown cash_guard '{other}', expected reject, clamp or allow"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub commission_rate: f64,
    pub slippage: Slippage,
    pub cash_guard: CashGuard,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_rate: 0.0,
            slippage: Slippage::Percent(0.0),
            cash_guard: CashGuard::Reject,
        }
    }
}

pub fn calculate_commission(notional: f64, commission_rate: f64) -> f64 {
    notional * commission_rate
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Buy,
    Close,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Close => write!(f, "CLOSE"),
        }
    }
}

/// A filled order. Lives for one bar, then is kept only as a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub date: NaiveDate,
    pub asset: String,
    pub direction: Direction,
    pub requested_size: u64,
    pub reference_price: f64,
    pub fill_price: f64,
    pub commission_cost: f64,
    pub slippage_cost: f64,
}

impl Order {
    pub fn notional(&self) -> f64 {
        self.requested_size as f64 * self.fill_price
    }

    /// Signed change to cash when this order settles.
    pub fn cash_delta(&self) -> f64 {
        match self.direction {
            Direction::Buy => -(self.notional() + self.commission_cost),
            Direction::Close => self.notional() - self.commission_cost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

impl PositionState {
    pub fn from_size(size: u64) -> Self {
        if size > 0 {
            PositionState::Long
        } else {
            PositionState::Flat
        }
    }
}

/// Outcome of evaluating one asset on one date.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderDecision {
    Fill(Order),
    /// Nothing to do: no transition, or a zero-size entry.
    Hold,
    /// An entry the cash guard refused.
    Rejected {
        requested_size: u64,
        required_cash: f64,
        available_cash: f64,
    },
}

/// Inputs for one asset's evaluation on one date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderRequest<'a> {
    pub asset: &'a str,
    pub date: NaiveDate,
    pub held: u64,
    pub signal: Signal,
    pub close: f64,
    pub target_size: u64,
    pub cash: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderSimulator {
    config: ExecutionConfig,
}

impl OrderSimulator {
    pub fn new(config: ExecutionConfig) -> Self {
        OrderSimulator { config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Flat + Buy opens, Long + Sell closes; everything else holds.
    pub fn transition(state: PositionState, signal: Signal) -> Option<Direction> {
        match (state, signal) {
            (PositionState::Flat, Signal::Buy) => Some(Direction::Buy),
            (PositionState::Long, Signal::Sell) => Some(Direction::Close),
            _ => None,
        }
    }

    pub fn simulate(&self, request: &OrderRequest<'_>) -> OrderDecision {
        if !(request.close > 0.0 && request.close.is_finite()) {
            return OrderDecision::Hold;
        }

        match Self::transition(PositionState::from_size(request.held), request.signal) {
            Some(Direction::Buy) => self.simulate_buy(request),
            Some(Direction::Close) => self.simulate_close(request),
            None => OrderDecision::Hold,
        }
    }

    fn simulate_buy(&self, request: &OrderRequest<'_>) -> OrderDecision {
        if request.target_size == 0 {
            return OrderDecision::Hold;
        }

        let rate = self.config.commission_rate;
        let fill_price = self.config.slippage.buy_price(request.close);
        let required_cash = debit_for(request.target_size, fill_price, rate);

        let quantity = if required_cash <= request.cash {
            request.target_size
        } else {
            match self.config.cash_guard {
                CashGuard::Reject => 0,
                CashGuard::Clamp => {
                    affordable_size(request.cash, fill_price, rate).min(request.target_size)
                }
                CashGuard::Allow => request.target_size,
            }
        };

        if quantity == 0 {
            return OrderDecision::Rejected {
                requested_size: request.target_size,
                required_cash,
                available_cash: request.cash,
            };
        }

        OrderDecision::Fill(self.build_order(request, Direction::Buy, quantity, fill_price))
    }

    fn simulate_close(&self, request: &OrderRequest<'_>) -> OrderDecision {
        let fill_price = self.config.slippage.sell_price(request.close);
        OrderDecision::Fill(self.build_order(
            request,
            Direction::Close,
            request.held,
            fill_price,
        ))
    }

    fn build_order(
        &self,
        request: &OrderRequest<'_>,
        direction: Direction,
        quantity: u64,
        fill_price: f64,
    ) -> Order {
        let notional = quantity as f64 * fill_price;
        Order {
            date: request.date,
            asset: request.asset.to_string(),
            direction,
            requested_size: quantity,
            reference_price: request.close,
            fill_price,
            commission_cost: calculate_commission(notional, self.config.commission_rate),
            slippage_cost: quantity as f64 * (fill_price - request.close).abs(),
        }
    }
}

fn debit_for(quantity: u64, fill_price: f64, commission_rate: f64) -> f64 {
    let notional = quantity as f64 * fill_price;
    notional + calculate_commission(notional, commission_rate)
}
