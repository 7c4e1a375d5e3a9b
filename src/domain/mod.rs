//! Core domain types and logic.

pub mod bar;
pub mod trade;
pub mod params;
pub mod cost;
pub mod split;
pub mod strategy;
pub mod runner;
pub mod metrics;
pub mod sweep;
pub mod validation;
pub mod config_validation;
pub mod error;
