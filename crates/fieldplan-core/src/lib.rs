//! # fieldplan-core
//!
//! Core types, config, error handling, candidate normalization, text
//! similarity and the calendar aggregator for fieldplan.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod similarity;

pub use config::shellexpand;
