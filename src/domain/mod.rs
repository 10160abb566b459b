//! Core domain types and logic.

pub mod bar;
pub mod dataset;
pub mod frequency;
pub mod resample;
pub mod indicator;
pub mod signal;
pub mod rebalance;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod universe;
pub mod config_validation;
pub mod error;
