//! Query/filter orchestration for the subscriber dashboard.
//!
//! This module builds the panel queries for a sidebar selection, runs them
//! through the result cache and shapes the results into a report.

pub mod orchestrator;
pub mod queries;

pub use orchestrator::Orchestrator;
pub use queries::QueryCatalog;
