//! Core domain types and logic.

pub mod bar;
pub mod feed;
pub mod position;
pub mod portfolio;
pub mod sizing;
pub mod execution;
pub mod audit;
pub mod backtest;
pub mod signal;
pub mod sweep;
pub mod universe;
pub mod config_validation;
pub mod error;
