//! Turns a sidebar selection into queries and panel tables.

use super::queries::{build_filter_clause, QueryCatalog, Statement, FILTER_COLUMN};
use crate::cache::{CacheConfig, CacheStats, ResultCache};
use crate::error::DashboardError;
use crate::models::{DashboardReport, FilterSelection, Panel, PanelKind, ResultTable};
use crate::pinot::QueryExecutor;
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the connection handle and the result cache for one table.
pub struct Orchestrator<E> {
    executor: E,
    cache: ResultCache,
    catalog: QueryCatalog,
}

impl<E: QueryExecutor> Orchestrator<E> {
    /// Create an orchestrator over `executor`.
    pub fn new(executor: E, catalog: QueryCatalog, cache_config: &CacheConfig) -> Self {
        info!(
            "Dashboard over table {} (cache: {} entries, ttl {}s)",
            catalog.table(),
            cache_config.max_entries,
            cache_config.ttl_seconds
        );

        Self {
            executor,
            cache: ResultCache::new(cache_config),
            catalog,
        }
    }

    /// The query catalog in use.
    pub fn catalog(&self) -> &QueryCatalog {
        &self.catalog
    }

    /// The underlying executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run a statement, at most once per distinct rendered text while cached.
    pub async fn fetch_aggregate(
        &self,
        statement: &Statement,
    ) -> Result<Arc<ResultTable>, DashboardError> {
        let sql = statement.render();

        if self.cache.contains(&sql) {
            debug!("Cache hit: {}", sql);
        }

        self.cache
            .get_or_load(sql.clone(), async {
                debug!("Cache miss, executing: {}", sql);
                let table = self.executor.execute(&sql).await?;
                debug!("Fetched {} rows", table.row_count());
                Ok(table)
            })
            .await
    }

    /// Distinct non-null subscription types, in engine order.
    pub async fn list_filter_values(&self) -> Result<Vec<String>, DashboardError> {
        let table = self.fetch_aggregate(&self.catalog.filter_values()).await?;

        let column = table
            .column(FILTER_COLUMN)
            .ok_or_else(|| DashboardError::MissingColumn(FILTER_COLUMN.to_string()))?;

        Ok(column
            .into_iter()
            .filter_map(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect())
    }

    /// Run every panel query for `selection`.
    ///
    /// Failed queries become failed panels; the report itself never fails.
    pub async fn build_report(&self, selection: &FilterSelection) -> DashboardReport {
        let clause = build_filter_clause(selection);
        debug!("Filter clause: {}", clause.render());

        let clause = &clause;
        let panels = PanelKind::ALL.iter().map(|&kind| async move {
            let statement = self.catalog.panel(kind, clause);
            let sql = statement.render();

            match self.fetch_aggregate(&statement).await {
                Ok(table) => Panel::loaded(kind, sql, (*table).clone()),
                Err(e) => {
                    warn!("Panel '{}' failed ({}): {}", kind, e.kind(), e);
                    Panel::failed(kind, sql, e.to_string())
                }
            }
        });

        let (filter_values, panels) =
            futures::join!(self.list_filter_values(), join_all(panels));

        let (filter_values, filter_error) = match filter_values {
            Ok(values) => (values, None),
            Err(e) => {
                warn!("Could not load subscription types: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        DashboardReport {
            table_name: self.catalog.table().to_string(),
            selection: selection.clone(),
            filter_values,
            filter_error,
            panels,
            generated_at: Utc::now(),
        }
    }

    /// Cache counters.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Drop every cached result.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::testing::CountingExecutor;
    use serde_json::json;

    fn orchestrator(executor: CountingExecutor) -> Orchestrator<CountingExecutor> {
        Orchestrator::new(
            executor,
            QueryCatalog::new("topic5").unwrap(),
            &CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_list_filter_values() {
        let orch = orchestrator(CountingExecutor::new());
        let values = orch.list_filter_values().await.unwrap();
        assert_eq!(values, vec!["BASIC", "PREMIUM"]);
    }

    #[tokio::test]
    async fn test_list_filter_values_skips_nulls() {
        let executor = CountingExecutor::new().respond(
            "SELECT DISTINCT",
            Ok(ResultTable::new(
                vec!["SUBSCRIPTIONTYPE".to_string()],
                vec![vec![json!("BASIC")], vec![Value::Null], vec![json!("FAMILY")]],
            )),
        );
        let values = orchestrator(executor).list_filter_values().await.unwrap();
        assert_eq!(values, vec!["BASIC", "FAMILY"]);
    }

    #[tokio::test]
    async fn test_list_filter_values_missing_column() {
        let executor = CountingExecutor::new().respond(
            "SELECT DISTINCT",
            Ok(ResultTable::new(vec!["OTHER".to_string()], vec![])),
        );
        let result = orchestrator(executor).list_filter_values().await;
        assert!(matches!(result, Err(DashboardError::MissingColumn(_))));
    }

    #[tokio::test]
    async fn test_fetch_aggregate_is_idempotent() {
        let orch = orchestrator(CountingExecutor::new());
        let statement = orch.catalog().filter_values();

        let first = orch.fetch_aggregate(&statement).await.unwrap();
        let second = orch.fetch_aggregate(&statement).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(orch.executor().calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_execution() {
        let orch = orchestrator(CountingExecutor::new());
        let statement = orch.catalog().filter_values();

        let results = join_all((0..8).map(|_| orch.fetch_aggregate(&statement))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(orch.executor().calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried_next_time() {
        let executor = CountingExecutor::new().respond(
            "SELECT DISTINCT",
            Err(DashboardError::Connect {
                url: "http://broker".to_string(),
            }),
        );
        let orch = orchestrator(executor);
        let statement = orch.catalog().filter_values();

        tokio_test::assert_err!(orch.fetch_aggregate(&statement).await);
        tokio_test::assert_err!(orch.fetch_aggregate(&statement).await);
        assert_eq!(orch.executor().calls(), 2);
    }

    #[tokio::test]
    async fn test_report_for_all_issues_five_panel_queries() {
        let orch = orchestrator(CountingExecutor::new());
        let report = orch.build_report(&FilterSelection::All).await;

        assert_eq!(report.panels.len(), 5);
        assert_eq!(report.filter_values, vec!["BASIC", "PREMIUM"]);
        assert!(report.filter_error.is_none());

        let panel_queries = orch.executor().queries_excluding("SELECT DISTINCT");
        assert_eq!(panel_queries.len(), 5);
        let mut distinct = panel_queries.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), 5);
        assert!(panel_queries
            .iter()
            .all(|q| q.contains("WHERE SUBSCRIPTIONTYPE IS NOT NULL")));
    }

    #[tokio::test]
    async fn test_report_for_value_reuses_subscription_counts() {
        let orch = orchestrator(CountingExecutor::new());
        orch.build_report(&FilterSelection::All).await;
        let report = orch
            .build_report(&FilterSelection::Value("PREMIUM".to_string()))
            .await;

        // Four filtered panels are new; the totals query and the distinct
        // values query come from the cache.
        let panel_queries = orch.executor().queries_excluding("SELECT DISTINCT");
        assert_eq!(panel_queries.len(), 9);

        let region = report.panel(PanelKind::RegionDistribution).unwrap();
        assert!(region
            .sql
            .contains("WHERE SUBSCRIPTIONTYPE = 'PREMIUM' AND SUBSCRIPTIONTYPE IS NOT NULL"));

        let totals = report.panel(PanelKind::SubscriptionCounts).unwrap();
        assert!(totals.sql.contains("WHERE SUBSCRIPTIONTYPE IS NOT NULL"));
        assert!(!totals.sql.contains("PREMIUM"));
    }

    #[tokio::test]
    async fn test_report_for_value_issues_five_distinct_queries() {
        let orch = orchestrator(CountingExecutor::new());
        let report = orch
            .build_report(&FilterSelection::Value("BASIC".to_string()))
            .await;

        let mut queries = orch.executor().queries_excluding("SELECT DISTINCT");
        queries.sort();
        queries.dedup();
        assert_eq!(queries.len(), 5);
        assert_eq!(report.selection, FilterSelection::Value("BASIC".to_string()));
    }

    #[tokio::test]
    async fn test_empty_top_users_is_not_an_error() {
        let executor = CountingExecutor::new().respond(
            "SUM(VIEWTIME)",
            Ok(ResultTable::new(
                vec!["USERID".to_string(), "total_viewtime".to_string()],
                vec![],
            )),
        );
        let report = orchestrator(executor)
            .build_report(&FilterSelection::All)
            .await;

        let top = report.panel(PanelKind::TopUsersByViewtime).unwrap();
        assert!(!top.is_failed());
        assert_eq!(top.table.as_ref().unwrap().row_count(), 0);
    }

    #[tokio::test]
    async fn test_one_failed_panel_keeps_the_rest() {
        let executor = CountingExecutor::new().respond(
            "AVG(VIEWTIME)",
            Err(DashboardError::Broker {
                code: 200,
                message: "QueryExecutionError".to_string(),
            }),
        );
        let report = orchestrator(executor)
            .build_report(&FilterSelection::All)
            .await;

        assert_eq!(report.failed_panels(), 1);
        let failed = report.panel(PanelKind::AverageViewtimeByGender).unwrap();
        assert!(failed.error.as_ref().unwrap().contains("QueryExecutionError"));
        assert!(report
            .panels
            .iter()
            .filter(|p| p.kind != PanelKind::AverageViewtimeByGender)
            .all(|p| p.table.is_some()));
    }

    #[tokio::test]
    async fn test_filter_values_failure_is_recorded() {
        let executor = CountingExecutor::new().respond(
            "SELECT DISTINCT",
            Err(DashboardError::Timeout { seconds: 30 }),
        );
        let report = orchestrator(executor)
            .build_report(&FilterSelection::All)
            .await;

        assert!(report.filter_values.is_empty());
        assert!(report.filter_error.as_deref().unwrap().contains("timed out"));
        assert_eq!(report.dropdown_options(), vec!["All"]);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_reexecution() {
        let orch = orchestrator(CountingExecutor::new());
        let statement = orch.catalog().filter_values();

        orch.fetch_aggregate(&statement).await.unwrap();
        orch.clear_cache().await;
        orch.fetch_aggregate(&statement).await.unwrap();

        assert_eq!(orch.executor().calls(), 2);
    }
}
