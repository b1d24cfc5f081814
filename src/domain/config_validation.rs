//! Configuration loading and validation.
//!
//! Everything is checked here, before any data is read, and turned into typed
//! settings for the engine, the signal provider, and the sweep grid.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::NavtraderError;
use crate::domain::execution::{CashGuard, Slippage};
use crate::domain::signal::{ParamSet, build_provider};
use crate::domain::sweep::ParamGrid;
use crate::domain::universe::parse_assets;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::path::PathBuf;

/// Where bar histories are read from. Relative paths are relative to the
/// config file and are resolved by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// One `<ASSET>.csv` per asset under `dir`.
    Csv { dir: PathBuf },
    /// A SQLite database with an `ohlcv` table.
    Sqlite { path: PathBuf, pool_size: u32 },
}

const DEFAULT_POOL_SIZE: i64 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub backtest: BacktestConfig,
    pub data_source: DataSource,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategySettings {
    pub name: String,
    pub params: ParamSet,
}

pub fn load_run_settings(config: &dyn ConfigPort) -> Result<RunSettings, NavtraderError> {
    let initial_cash = config
        .get_double("backtest", "initial_cash")?
        .ok_or_else(|| NavtraderError::missing("backtest", "initial_cash"))?;
    let commission_rate = config
        .get_double("backtest", "commission_rate")?
        .ok_or_else(|| NavtraderError::missing("backtest", "commission_rate"))?;
    let slippage = Slippage::resolve(
        config.get_double("backtest", "slippage_percent")?,
        config.get_double("backtest", "slippage_fixed")?,
    )?;
    let size_pct = config
        .get_double("backtest", "size_pct")?
        .ok_or_else(|| NavtraderError::missing("backtest", "size_pct"))?;
    let cash_guard = match config.get_string("backtest", "cash_guard") {
        Some(value) => value.parse::<CashGuard>()?,
        None => CashGuard::default(),
    };
    let universe = config
        .get_string("backtest", "assets")
        .ok_or_else(|| NavtraderError::missing("backtest", "assets"))
        .and_then(|value| parse_assets(&value))?;
    let data_source = load_data_source(config)?;

    let start_date = optional_date(config, "start_date")?;
    let end_date = optional_date(config, "end_date")?;
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(NavtraderError::invalid(
                "backtest",
                "start_date",
                "start_date must not be after end_date",
            ));
        }
    }

    let backtest = BacktestConfig {
        initial_cash,
        commission_rate,
        slippage,
        size_pct,
        cash_guard,
        universe,
    };
    backtest.validate()?;

    Ok(RunSettings {
        backtest,
        data_source,
        start_date,
        end_date,
    })
}

fn load_data_source(config: &dyn ConfigPort) -> Result<DataSource, NavtraderError> {
    let kind = config
        .get_string("backtest", "data_source")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "csv".to_string());

    match kind.as_str() {
        "csv" => config
            .get_string("backtest", "data_dir")
            .map(|dir| DataSource::Csv {
                dir: PathBuf::from(dir.trim()),
            })
            .ok_or_else(|| NavtraderError::missing("backtest", "data_dir")),
        "sqlite" => {
            let path = config
                .get_string("sqlite", "path")
                .ok_or_else(|| NavtraderError::missing("sqlite", "path"))?;
            let pool_size = config
                .get_int("sqlite", "pool_size")?
                .unwrap_or(DEFAULT_POOL_SIZE);
            let pool_size = u32::try_from(pool_size)
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| {
                    NavtraderError::invalid("sqlite", "pool_size", "must be a positive integer")
                })?;
            Ok(DataSource::Sqlite {
                path: PathBuf::from(path.trim()),
                pool_size,
            })
        }
        other => Err(NavtraderError::invalid(
            "backtest",
            "data_source",
            format!("unknown data source '{other}', expected csv or sqlite"),
        )),
    }
}

fn optional_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, NavtraderError> {
    match config.get_string("backtest", key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                NavtraderError::invalid(
                    "backtest",
                    key,
                    format!("invalid {key} format, expected YYYY-MM-DD"),
                )
            }),
    }
}

/// Reads `[strategy]` and checks that the named provider accepts its parameters.
pub fn load_strategy_settings(config: &dyn ConfigPort) -> Result<StrategySettings, NavtraderError> {
    let name = config
        .get_string("strategy", "name")
        .map(|s| s.trim().to_lowercase())
        .ok_or_else(|| NavtraderError::missing("strategy", "name"))?;

    let mut params = ParamSet::new();
    for key in config.keys("strategy") {
        if key == "name" {
            continue;
        }
        if let Some(value) = config.get_double("strategy", &key)? {
            params.insert(key, value);
        }
    }

    build_provider(&name, &params)?;
    Ok(StrategySettings { name, params })
}

/// Reads `[sweep]`. Each axis must name a parameter of the configured strategy.
pub fn load_sweep_grid(
    config: &dyn ConfigPort,
    strategy: &StrategySettings,
) -> Result<ParamGrid, NavtraderError> {
    let mut grid = ParamGrid::new();
    for key in config.keys("sweep") {
        if strategy.params.get(&key).is_none() {
            return Err(NavtraderError::invalid(
                "sweep",
                &key,
                format!("'{key}' is not a parameter of {}", strategy.name),
            ));
        }
        let text = config
            .get_string("sweep", &key)
            .ok_or_else(|| NavtraderError::missing("sweep", &key))?;
        grid = grid.parse_axis(&key, &text)?;
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const BASE: &str = "[backtest]\ninitial_cash = 100000\ncommission_rate = 0.0005\nslippage_percent = 0.0005\nsize_pct = 0.166\nassets = AAA,BBB\ndata_dir = data\n";

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with_backtest(extra: &str) -> FileConfigAdapter {
        make_config(&format!("{BASE}{extra}"))
    }

    fn without(key: &str) -> FileConfigAdapter {
        let content: String = BASE
            .lines()
            .filter(|line| !line.starts_with(key))
            .map(|line| format!("{line}\n"))
            .collect();
        make_config(&content)
    }

    #[test]
    fn valid_backtest_config_loads() {
        let settings = load_run_settings(&with_backtest("")).unwrap();
        assert_eq!(settings.backtest.universe, vec!["AAA", "BBB"]);
        assert_eq!(settings.backtest.slippage, Slippage::Percent(0.0005));
        assert_eq!(settings.backtest.cash_guard, CashGuard::Reject);
        assert_eq!(
            settings.data_source,
            DataSource::Csv {
                dir: PathBuf::from("data")
            }
        );
        assert_eq!(settings.start_date, None);
    }

    #[test]
    fn initial_cash_must_be_positive() {
        let config = make_config(&BASE.replace("initial_cash = 100000", "initial_cash = 0"));
        let err = load_run_settings(&config).unwrap_err();
        assert!(matches!(err, NavtraderError::ConfigInvalid { key, .. } if key == "initial_cash"));
    }

    #[test]
    fn missing_required_keys() {
        for key in ["initial_cash", "commission_rate", "size_pct", "assets", "data_dir"] {
            let err = load_run_settings(&without(key)).unwrap_err();
            assert!(
                matches!(&err, NavtraderError::ConfigMissing { key: k, .. } if k == key),
                "{key}: {err}"
            );
        }
    }

    #[test]
    fn commission_is_required_and_rejects_negative() {
        let err = load_run_settings(&without("commission_rate")).unwrap_err();
        assert!(
            matches!(err, NavtraderError::ConfigMissing { key, .. } if key == "commission_rate")
        );

        let free = make_config(&BASE.replace("commission_rate = 0.0005", "commission_rate = 0"));
        assert_eq!(load_run_settings(&free).unwrap().backtest.commission_rate, 0.0);

        let config = make_config(&BASE.replace("0.0005\nslippage", "-0.1\nslippage"));
        let err = load_run_settings(&config).unwrap_err();
        assert!(
            matches!(err, NavtraderError::ConfigInvalid { key, .. } if key == "commission_rate")
        );
    }

    #[test]
    fn non_numeric_value_fails() {
        let config = make_config(&BASE.replace("size_pct = 0.166", "size_pct = lots"));
        let err = load_run_settings(&config).unwrap_err();
        assert!(matches!(err, NavtraderError::ConfigInvalid { key, .. } if key == "size_pct"));
    }

    #[test]
    fn slippage_resolution() {
        let both = with_backtest("slippage_fixed = 0.02\n");
        assert_eq!(
            load_run_settings(&both).unwrap().backtest.slippage,
            Slippage::Percent(0.0005)
        );

        let fixed_only = make_config(
            &BASE.replace("slippage_percent = 0.0005", "slippage_fixed = 0.02"),
        );
        assert_eq!(
            load_run_settings(&fixed_only).unwrap().backtest.slippage,
            Slippage::Fixed(0.02)
        );

        let err = load_run_settings(&without("slippage_percent")).unwrap_err();
        assert!(matches!(err, NavtraderError::ConfigMissing { .. }));
    }

    #[test]
    fn size_pct_above_one_fails() {
        let config = make_config(&BASE.replace("size_pct = 0.166", "size_pct = 1.5"));
        let err = load_run_settings(&config).unwrap_err();
        assert!(matches!(err, NavtraderError::ConfigInvalid { key, .. } if key == "size_pct"));
    }

    #[test]
    fn duplicate_assets_fail() {
        let config = make_config(&BASE.replace("AAA,BBB", "AAA,AAA"));
        let err = load_run_settings(&config).unwrap_err();
        assert!(matches!(err, NavtraderError::ConfigInvalid { key, .. } if key == "assets"));
    }

    #[test]
    fn sqlite_data_source() {
        let config = with_backtest("data_source = SQLite\n[sqlite]\npath = bars.db\n");
        assert_eq!(
            load_run_settings(&config).unwrap().data_source,
            DataSource::Sqlite {
                path: PathBuf::from("bars.db"),
                pool_size: 4
            }
        );

        let no_path = with_backtest("data_source = sqlite\n");
        assert!(matches!(
            load_run_settings(&no_path),
            Err(NavtraderError::ConfigMissing { section, .. }) if section == "sqlite"
        ));

        let bad_pool =
            with_backtest("data_source = sqlite\n[sqlite]\npath = bars.db\npool_size = 0\n");
        assert!(matches!(
            load_run_settings(&bad_pool),
            Err(NavtraderError::ConfigInvalid { key, .. }) if key == "pool_size"
        ));

        let unknown = with_backtest("data_source = parquet\n");
        assert!(matches!(
            load_run_settings(&unknown),
            Err(NavtraderError::ConfigInvalid { key, .. }) if key == "data_source"
        ));
    }

    #[test]
    fn cash_guard_parsed() {
        let settings = load_run_settings(&with_backtest("cash_guard = Clamp\n")).unwrap();
        assert_eq!(settings.backtest.cash_guard, CashGuard::Clamp);
        let err = load_run_settings(&with_backtest("cash_guard = margin\n")).unwrap_err();
        assert!(matches!(err, NavtraderError::ConfigInvalid { key, .. } if key == "cash_guard"));
    }

    #[test]
    fn date_window() {
        let settings =
            load_run_settings(&with_backtest("start_date = 2020-01-01\nend_date = 2020-12-31\n"))
                .unwrap();
        assert_eq!(settings.start_date, NaiveDate::from_ymd_opt(2020, 1, 1));

        let err = load_run_settings(&with_backtest("start_date = 2020/01/01\n")).unwrap_err();
        assert!(matches!(err, NavtraderError::ConfigInvalid { key, .. } if key == "start_date"));

        let err = load_run_settings(&with_backtest(
            "start_date = 2021-01-01\nend_date = 2020-01-01\n",
        ))
        .unwrap_err();
        assert!(matches!(err, NavtraderError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn strategy_settings_load() {
        let config = make_config("[strategy]\nname = Trend_Intensity\nwindow_1 = 50\nwindow_2 = 5\n");
        let strategy = load_strategy_settings(&config).unwrap();
        assert_eq!(strategy.name, "trend_intensity");
        assert_eq!(strategy.params.get("window_1"), Some(50.0));
        assert_eq!(strategy.params.get("window_2"), Some(5.0));

        let river = load_strategy_settings(&make_config("[strategy]\nname = adx_river\n")).unwrap();
        assert_eq!(river.name, "adx_river");
        assert!(river.params.is_empty());
    }

    #[test]
    fn strategy_errors() {
        let missing = make_config("[strategy]\nwindow_1 = 10\n");
        assert!(matches!(
            load_strategy_settings(&missing),
            Err(NavtraderError::ConfigMissing { key, .. }) if key == "name"
        ));

        let unknown = make_config("[strategy]\nname = adx\nwindow_1 = 10\n");
        assert!(matches!(
            load_strategy_settings(&unknown),
            Err(NavtraderError::ConfigInvalid { key, .. }) if key == "name"
        ));

        let zero = make_config("[strategy]\nname = bull_bear_power\nwindow_1 = 0\n");
        assert!(matches!(
            load_strategy_settings(&zero),
            Err(NavtraderError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn sweep_grid_loads_and_checks_names() {
        let config = make_config(
            "[strategy]\nname = trend_intensity\nwindow_1 = 50\nwindow_2 = 5\n[sweep]\nwindow_2 = 1,2\nwindow_1 = 10:40:10\n",
        );
        let strategy = load_strategy_settings(&config).unwrap();
        let grid = load_sweep_grid(&config, &strategy).unwrap();
        assert_eq!(grid.names().collect::<Vec<_>>(), vec!["window_1", "window_2"]);
        assert_eq!(grid.size(), 6);

        let bad = make_config(
            "[strategy]\nname = bull_bear_power\nwindow_1 = 10\n[sweep]\nwindow_9 = 1,2\n",
        );
        let strategy = load_strategy_settings(&bad).unwrap();
        assert!(matches!(
            load_sweep_grid(&bad, &strategy),
            Err(NavtraderError::ConfigInvalid { section, .. }) if section == "sweep"
        ));
    }
}
