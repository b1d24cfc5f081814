//! Backtest engine and event loop.
//!
//! For each date in the feed, assets are evaluated one at a time in universe
//! order:
//!
//! 1. every asset with a bar that date is re-marked at its close;
//! 2. each present asset is sized against total equity *as left by the assets
//!    before it on the same date*, its signal is run through the order
//!    simulator, and any fill settles into the position book and ledger before
//!    the next asset is looked at;
//! 3. after the last asset, total equity is appended to the NAV series.
//!
//! Universe order is therefore part of the result, not an implementation detail.
//! The engine holds no run state between calls to [`Engine::run`]; each run starts
//! from a fresh book and ledger.

use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::HashSet;

use super::audit::{AuditAction, AuditLog, AuditRecord};
use super::error::{BarSkip, NavtraderError};
use super::execution::{
    CashGuard, Direction, ExecutionConfig, Order, OrderDecision, OrderRequest, OrderSimulator,
    Slippage,
};
use super::feed::{AssetBar, BarFeed};
use super::portfolio::PortfolioLedger;
use super::position::{ClosedTrade, Position, PositionBook};
use super::sizing::SizingPolicy;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    pub commission_rate: f64,
    pub slippage: Slippage,
    pub size_pct: f64,
    pub cash_guard: CashGuard,
    /// Asset iteration order for every date.
    pub universe: Vec<String>,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), NavtraderError> {
        if !(self.initial_cash > 0.0 && self.initial_cash.is_finite()) {
            return Err(NavtraderError::invalid(
                "backtest",
                "initial_cash",
                "initial_cash must be positive",
            ));
        }
        if !(self.commission_rate >= 0.0 && self.commission_rate.is_finite()) {
            return Err(NavtraderError::invalid(
                "backtest",
                "commission_rate",
                "commission_rate must be non-negative",
            ));
        }
        self.slippage.validate()?;
        SizingPolicy::new(self.size_pct)?;

        if self.universe.is_empty() {
            return Err(NavtraderError::missing("backtest", "assets"));
        }
        let mut seen = HashSet::new();
        for asset in &self.universe {
            if asset.trim().is_empty() {
                return Err(NavtraderError::invalid(
                    "backtest",
                    "assets",
                    "asset names must not be empty",
                ));
            }
            if !seen.insert(asset.as_str()) {
                return Err(NavtraderError::invalid(
                    "backtest",
                    "assets",
                    format!("duplicate asset: {asset}"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub log: AuditLog,
    pub initial_cash: f64,
    pub final_cash: f64,
    pub final_equity: f64,
}

impl BacktestResult {
    pub fn total_return(&self) -> f64 {
        (self.final_equity - self.initial_cash) / self.initial_cash
    }
}

/// Mutable state for one run. Exclusive access means no asset can observe
/// another asset's order half-applied.
struct EngineState {
    book: PositionBook,
    ledger: PortfolioLedger,
    log: AuditLog,
}

impl EngineState {
    fn new(initial_cash: f64, universe: &[String]) -> Self {
        EngineState {
            book: PositionBook::new(universe.len()),
            ledger: PortfolioLedger::new(initial_cash, universe.len()),
            log: AuditLog::new(universe.to_vec()),
        }
    }

    fn equity(&self) -> f64 {
        self.ledger.total_equity(&self.book)
    }

    /// Applies a fill to book, ledger, and log together. Returns `false`
    /// without touching anything if the book cannot take the order.
    fn settle(&mut self, index: usize, order: Order) -> bool {
        match order.direction {
            Direction::Buy => {
                let position = Position {
                    asset: order.asset.clone(),
                    size: order.requested_size,
                    entry_price: order.fill_price,
                    entry_date: order.date,
                    entry_commission: order.commission_cost,
                };
                if !self.book.open(index, position) {
                    return false;
                }
                self.ledger.debit(-order.cash_delta());
            }
            Direction::Close => {
                let Some(position) = self.book.close(index) else {
                    return false;
                };
                self.ledger.credit(order.cash_delta());
                let pnl = position.size as f64 * (order.fill_price - position.entry_price)
                    - position.entry_commission
                    - order.commission_cost;
                self.log.record_closed_trade(ClosedTrade {
                    asset: position.asset,
                    quantity: position.size,
                    entry_price: position.entry_price,
                    exit_price: order.fill_price,
                    entry_date: position.entry_date,
                    exit_date: order.date,
                    pnl,
                });
            }
        }
        self.log.record_fill(index, order);
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Engine {
    universe: Vec<String>,
    initial_cash: f64,
    sizing: SizingPolicy,
    simulator: OrderSimulator,
}

impl Engine {
    /// Validates `config`; nothing is run until [`Engine::run`].
    pub fn new(config: BacktestConfig) -> Result<Self, NavtraderError> {
        config.validate()?;
        Ok(Engine {
            sizing: SizingPolicy::new(config.size_pct)?,
            simulator: OrderSimulator::new(ExecutionConfig {
                commission_rate: config.commission_rate,
                slippage: config.slippage,
                cash_guard: config.cash_guard,
            }),
            initial_cash: config.initial_cash,
            universe: config.universe,
        })
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    pub fn run(&self, feed: &BarFeed) -> Result<BacktestResult, NavtraderError> {
        let feed_assets: Vec<&str> = feed.assets().collect();
        if feed_assets != self.universe.iter().map(String::as_str).collect::<Vec<_>>() {
            return Err(NavtraderError::UniverseMismatch {
                reason: format!("feed has {:?}, engine has {:?}", feed_assets, self.universe),
            });
        }

        info!(
            "running backtest: {} assets, {} dates, initial cash {:.2}",
            self.universe.len(),
            feed.timeline().len(),
            self.initial_cash
        );

        let mut state = EngineState::new(self.initial_cash, &self.universe);

        for batch in feed.batches() {
            for &index in &batch.missing {
                let skip = BarSkip::DataGap {
                    asset: self.universe[index].clone(),
                    date: batch.date,
                };
                debug!("{skip}");
                state.log.record_skip(skip);
            }

            for entry in &batch.present {
                if entry.bar.has_tradable_close() {
                    state.ledger.mark(entry.index, entry.bar.close);
                }
            }

            for entry in &batch.present {
                self.process(&mut state, batch.date, entry);
            }

            let equity = state.equity();
            state.log.record_equity(batch.date, equity);
        }

        let final_equity = state.equity();
        let final_cash = state.ledger.cash();
        info!(
            "backtest complete: final equity {:.2}, {} fills, {} skipped bars",
            final_equity,
            state.log.total_trades(),
            state.log.skipped().len()
        );

        Ok(BacktestResult {
            log: state.log,
            initial_cash: self.initial_cash,
            final_cash,
            final_equity,
        })
    }

    fn process(&self, state: &mut EngineState, date: NaiveDate, entry: &AssetBar<'_>) {
        let bar = entry.bar;
        let held = state.book.size(entry.index);

        let (target_size, action) = if bar.has_tradable_close() {
            let target_size = self.sizing.target_size(state.equity(), bar.close);
            let decision = self.simulator.simulate(&OrderRequest {
                asset: entry.asset,
                date,
                held,
                signal: bar.signal,
                close: bar.close,
                target_size,
                cash: state.ledger.cash(),
            });
            (target_size, self.apply(state, entry, date, decision))
        } else {
            let skip = BarSkip::DegeneratePrice {
                asset: entry.asset.to_string(),
                date,
                price: bar.close,
            };
            debug!("{skip}");
            state.log.record_skip(skip);
            (0, AuditAction::Skipped)
        };

        let record = AuditRecord {
            date,
            asset: entry.asset.to_string(),
            position: held,
            signal: bar.signal,
            target_size,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            cash: state.ledger.cash(),
            equity: state.equity(),
            trades: state.log.trade_count_at(entry.index),
            action,
            position_after: state.book.size(entry.index),
        };
        state.log.record_bar(record);
    }

    fn apply(
        &self,
        state: &mut EngineState,
        entry: &AssetBar<'_>,
        date: NaiveDate,
        decision: OrderDecision,
    ) -> AuditAction {
        match decision {
            OrderDecision::Fill(order) => {
                let action = match order.direction {
                    Direction::Buy => AuditAction::Buy,
                    Direction::Close => AuditAction::Close,
                };
                debug!(
                    "{date} {} {} x{} @ {:.4}",
                    order.direction, order.asset, order.requested_size, order.fill_price
                );
                if state.settle(entry.index, order) {
                    action
                } else {
                    AuditAction::None
                }
            }
            OrderDecision::Hold => AuditAction::None,
            OrderDecision::Rejected {
                requested_size,
                required_cash,
                available_cash,
            } => {
                warn!(
                    "{date} {}: buy of {requested_size} rejected, needs {required_cash:.2} cash but {available_cash:.2} available",
                    entry.asset
                );
                AuditAction::Rejected
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::{Bar, Signal};
    use crate::domain::feed::AssetSeries;
    use approx::assert_relative_eq;

    fn sample_config() -> BacktestConfig {
        BacktestConfig {
            initial_cash: 100_000.0,
            commission_rate: 0.0,
            slippage: Slippage::Percent(0.0),
            size_pct: 1.0,
            cash_guard: CashGuard::Reject,
            universe: vec!["A".to_string()],
        }
    }

    fn make_bars(closes: &[f64], signals: &[i8]) -> Vec<Bar> {
        closes
            .iter()
            .zip(signals)
            .enumerate()
            .map(|(i, (&close, &signal))| Bar {
                date: NaiveDate::from_ymd_opt(2024, 1, 1 + i as u32).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
                signal: Signal::from_value(signal).unwrap(),
            })
            .collect()
    }

    fn single_feed(closes: &[f64], signals: &[i8]) -> BarFeed {
        BarFeed::new(vec![AssetSeries::new("A", make_bars(closes, signals)).unwrap()])
    }

    #[test]
    fn config_validation() {
        assert!(sample_config().validate().is_ok());

        let bad_cash = BacktestConfig {
            initial_cash: 0.0,
            ..sample_config()
        };
        assert!(matches!(
            bad_cash.validate(),
            Err(NavtraderError::ConfigInvalid { key, .. }) if key == "initial_cash"
        ));

        let bad_commission = BacktestConfig {
            commission_rate: -0.001,
            ..sample_config()
        };
        assert!(bad_commission.validate().is_err());

        let bad_size = BacktestConfig {
            size_pct: 1.5,
            ..sample_config()
        };
        assert!(bad_size.validate().is_err());

        let empty = BacktestConfig {
            universe: vec![],
            ..sample_config()
        };
        assert!(matches!(
            empty.validate(),
            Err(NavtraderError::ConfigMissing { key, .. }) if key == "assets"
        ));

        let dup = BacktestConfig {
            universe: vec!["A".into(), "A".into()],
            ..sample_config()
        };
        assert!(dup.validate().is_err());
    }

    #[test]
    fn engine_new_fails_fast() {
        let err = Engine::new(BacktestConfig {
            initial_cash: -5.0,
            ..sample_config()
        })
        .unwrap_err();
        assert!(matches!(err, NavtraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn end_to_end_single_asset() {
        let engine = Engine::new(sample_config()).unwrap();
        let feed = single_feed(&[10.0, 11.0, 12.0, 9.0, 8.0], &[1, 1, -1, 1, 1]);
        let result = engine.run(&feed).unwrap();
        let log = &result.log;

        let nav: Vec<f64> = log.nav().iter().map(|p| p.equity).collect();
        assert_relative_eq!(nav[0], 100_000.0);
        assert_relative_eq!(nav[1], 110_000.0);
        assert_relative_eq!(nav[2], 120_000.0);
        assert_relative_eq!(nav[3], 120_000.0);
        assert_relative_eq!(nav[4], 3.0 + 13_333.0 * 8.0);

        assert_eq!(log.records()[0].position_after, 10_000);
        assert_eq!(log.records()[3].target_size, 13_333);
        assert_eq!(log.records()[3].position_after, 13_333);
        assert_relative_eq!(result.final_cash, 3.0);
        assert_eq!(log.trade_count("A"), Some(3));
        assert_eq!(log.closed_trades().len(), 1);
        assert_relative_eq!(log.closed_trades()[0].pnl, 20_000.0);
    }

    #[test]
    fn trade_counting() {
        let engine = Engine::new(BacktestConfig {
            size_pct: 0.5,
            ..sample_config()
        })
        .unwrap();
        let feed = single_feed(&[10.0, 10.0, 10.0, 10.0, 10.0], &[1, 1, -1, 1, -1]);
        let result = engine.run(&feed).unwrap();

        let actions: Vec<AuditAction> = result.log.records().iter().map(|r| r.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::Buy,
                AuditAction::None,
                AuditAction::Close,
                AuditAction::Buy,
                AuditAction::Close
            ]
        );
        assert_eq!(result.log.trade_count("A"), Some(4));
        assert_eq!(result.log.fills().len(), 4);
    }

    #[test]
    fn close_while_flat_is_noop() {
        let engine = Engine::new(sample_config()).unwrap();
        let feed = single_feed(&[10.0, 10.0], &[-1, 0]);
        let result = engine.run(&feed).unwrap();

        assert_eq!(result.log.total_trades(), 0);
        assert!(result.log.records().iter().all(|r| r.position_after == 0));
        assert_relative_eq!(result.final_equity, 100_000.0);
    }

    #[test]
    fn degenerate_price_is_skipped_not_fatal() {
        let engine = Engine::new(sample_config()).unwrap();
        let feed = single_feed(&[0.0, 10.0], &[1, 1]);
        let result = engine.run(&feed).unwrap();

        let records = result.log.records();
        assert_eq!(records[0].action, AuditAction::Skipped);
        assert_eq!(records[0].target_size, 0);
        assert_eq!(records[1].action, AuditAction::Buy);
        assert!(matches!(
            result.log.skipped(),
            [BarSkip::DegeneratePrice { price, .. }] if *price == 0.0
        ));
    }

    #[test]
    fn universe_mismatch_is_rejected() {
        let engine = Engine::new(BacktestConfig {
            universe: vec!["B".into()],
            ..sample_config()
        })
        .unwrap();
        let feed = single_feed(&[10.0], &[1]);
        assert!(matches!(
            engine.run(&feed),
            Err(NavtraderError::UniverseMismatch { .. })
        ));
    }

    #[test]
    fn runs_are_independent() {
        let engine = Engine::new(sample_config()).unwrap();
        let feed = single_feed(&[10.0, 12.0, 9.0], &[1, -1, 1]);
        let first = engine.run(&feed).unwrap();
        let second = engine.run(&feed).unwrap();
        assert_eq!(first, second);
    }
}
