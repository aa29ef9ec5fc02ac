//! # fieldplan-store
//!
//! SQLite persistence for fieldplan: fields, tasks with their daily progress
//! ledger, and monthly planning keywords.

pub mod store;

pub use store::{ConflictScope, CreateOutcome, ProgressChange, ProgressCounts, Store};
