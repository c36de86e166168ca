//! Query execution against an Apache Pinot broker.
//!
//! This module provides the [`QueryExecutor`] seam used by the orchestrator
//! and its HTTP implementation, [`PinotClient`].

pub mod client;

pub use client::{PinotClient, PinotClientConfig};

use crate::error::DashboardError;
use crate::models::ResultTable;
use std::future::Future;

/// Something that can run one SQL string and return its result table.
pub trait QueryExecutor: Send + Sync {
    /// Execute `sql` and materialize every row.
    fn execute(&self, sql: &str)
        -> impl Future<Output = Result<ResultTable, DashboardError>> + Send;

    /// Check that the engine is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), DashboardError>> + Send;
}
