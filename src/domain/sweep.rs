//! Parameter sweeps: one independent backtest per point of a parameter grid.

use log::{info, warn};
use rayon::prelude::*;

use super::backtest::{BacktestConfig, BacktestResult, Engine};
use super::bar::OhlcvBar;
use super::error::NavtraderError;
use super::feed::BarFeed;
use super::signal::{ParamSet, SignalProvider, annotate_all};

/// Parameter names mapped to candidate values, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamGrid {
    axes: Vec<(String, Vec<f64>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.axes.push((name.into(), values));
        self
    }

    /// Adds an axis from its textual form: `start:stop:step` (stop exclusive)
    /// or a comma-separated list.
    pub fn parse_axis(mut self, name: &str, text: &str) -> Result<Self, NavtraderError> {
        let values = parse_values(name, text)?;
        self.axes.push((name.to_string(), values));
        Ok(self)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|(n, _)| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Number of combinations; an axis with no values makes the grid empty.
    pub fn size(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|(_, v)| v.len()).product()
    }

    /// Cartesian product with the first axis varying slowest.
    pub fn combinations(&self) -> Vec<ParamSet> {
        if self.axes.is_empty() {
            return Vec::new();
        }
        let mut out = vec![ParamSet::new()];
        for (name, values) in &self.axes {
            out = out
                .iter()
                .flat_map(|base| {
                    values
                        .iter()
                        .map(move |&v| base.clone().with(name.clone(), v))
                })
                .collect();
        }
        out
    }
}

fn parse_values(name: &str, text: &str) -> Result<Vec<f64>, NavtraderError> {
    let number = |token: &str| -> Result<f64, NavtraderError> {
        token
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| NavtraderError::invalid("sweep", name, format!("'{token}' is not a number")))
    };

    let values = if text.contains(':') {
        let parts: Vec<&str> = text.split(':').collect();
        let [start, stop, step] = parts.as_slice() else {
            return Err(NavtraderError::invalid(
                "sweep",
                name,
                "range must be start:stop:step",
            ));
        };
        let (start, stop, step) = (number(start)?, number(stop)?, number(step)?);
        if step <= 0.0 {
            return Err(NavtraderError::invalid("sweep", name, "step must be positive"));
        }
        let count = ((stop - start) / step).ceil().max(0.0) as usize;
        (0..count).map(|i| start + i as f64 * step).collect()
    } else {
        text.split(',')
            .filter(|t| !t.trim().is_empty())
            .map(number)
            .collect::<Result<Vec<_>, _>>()?
    };

    if values.is_empty() {
        return Err(NavtraderError::invalid("sweep", name, "no values"));
    }
    Ok(values)
}

/// What a sweep keeps from each successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub final_equity: f64,
    pub total_return: f64,
    pub total_fills: u32,
    pub trade_counts: Vec<(String, u32)>,
}

impl From<&BacktestResult> for RunSummary {
    fn from(result: &BacktestResult) -> Self {
        RunSummary {
            final_equity: result.final_equity,
            total_return: result.total_return(),
            total_fills: result.log.total_trades(),
            trade_counts: result
                .log
                .trade_counts()
                .map(|(asset, count)| (asset.to_string(), count))
                .collect(),
        }
    }
}

#[derive(Debug)]
pub struct SweepOutcome {
    pub params: ParamSet,
    pub result: Result<RunSummary, NavtraderError>,
}

/// Runs every grid combination on its own engine. Outcomes come back in grid
/// order; a failing combination is reported in place and does not stop the rest.
pub fn run_sweep<F>(
    grid: &ParamGrid,
    histories: &[(String, Vec<OhlcvBar>)],
    config: &BacktestConfig,
    factory: F,
) -> Vec<SweepOutcome>
where
    F: Fn(&ParamSet) -> Result<Box<dyn SignalProvider>, NavtraderError> + Sync,
{
    let combinations = grid.combinations();
    info!("Sweeping {} parameter combinations", combinations.len());

    combinations
        .into_par_iter()
        .map(|params| {
            let result = run_one(&params, histories, config, &factory);
            if let Err(err) = &result {
                warn!("Combination [{params}] failed: {err}");
            }
            SweepOutcome { params, result }
        })
        .collect()
}

fn run_one<F>(
    params: &ParamSet,
    histories: &[(String, Vec<OhlcvBar>)],
    config: &BacktestConfig,
    factory: &F,
) -> Result<RunSummary, NavtraderError>
where
    F: Fn(&ParamSet) -> Result<Box<dyn SignalProvider>, NavtraderError>,
{
    let provider = factory(params)?;
    let annotated = annotate_all(histories, provider.as_ref());
    let feed = BarFeed::from_map(&config.universe, annotated)?;
    let engine = Engine::new(config.clone())?;
    let result = engine.run(&feed)?;
    Ok(RunSummary::from(&result))
}
