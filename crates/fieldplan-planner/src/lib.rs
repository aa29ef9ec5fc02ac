//! # fieldplan-planner
//!
//! Planning-input boundary for fieldplan. A [`TextGenerator`] is a black box
//! that answers prompts; this crate builds the prompts for each planning run
//! and decodes the answers into candidate tasks and monthly keywords.

pub mod decode;
pub mod extract;
pub mod generator;
pub mod prompts;

pub use generator::{CommandGenerator, TextGenerator};
pub use prompts::{growth_stage, GrowthStage, PlanPrompt};
