//! Data models for the dashboard.
//!
//! This module contains the core data structures shared by the query
//! orchestrator, the chart builder and the renderers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Label of the "no filter" entry in the subscription dropdown.
pub const ALL_LABEL: &str = "All";

/// The subscription type chosen in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum FilterSelection {
    /// No filter: every non-null subscription type.
    #[default]
    All,
    /// Exactly one subscription type.
    Value(String),
}

impl FilterSelection {
    /// Parse a raw dropdown / query-string value.
    ///
    /// An absent or empty value, or exactly [`ALL_LABEL`], maps to
    /// [`FilterSelection::All`]. Anything else is taken verbatim, so a
    /// subscription type spelled `ALL` stays selectable.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") | Some(ALL_LABEL) => FilterSelection::All,
            Some(s) => FilterSelection::Value(s.to_string()),
        }
    }
}

impl fmt::Display for FilterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSelection::All => write!(f, "{}", ALL_LABEL),
            FilterSelection::Value(v) => write!(f, "{}", v),
        }
    }
}

/// Tabular output of one query: named columns and aligned rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Column data types as reported by the engine (may be empty).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_types: Vec<String>,
    /// Rows, each aligned to `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl ResultTable {
    /// Creates a table from column names and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            column_types: Vec::new(),
            rows,
        }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, or `None` if the column is absent.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).unwrap_or(&Value::Null))
                .collect(),
        )
    }

    /// Rows as JSON objects keyed by column name.
    ///
    /// Missing trailing cells become `null`.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = Map::with_capacity(self.columns.len());
                for (i, name) in self.columns.iter().enumerate() {
                    record.insert(name.clone(), row.get(i).cloned().unwrap_or(Value::Null));
                }
                Value::Object(record)
            })
            .collect()
    }
}

/// The five chart slots on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    RegionDistribution,
    GenderDistribution,
    AverageViewtimeByGender,
    TopUsersByViewtime,
    SubscriptionCounts,
}

impl PanelKind {
    /// All panels in page order.
    pub const ALL: [PanelKind; 5] = [
        PanelKind::RegionDistribution,
        PanelKind::GenderDistribution,
        PanelKind::AverageViewtimeByGender,
        PanelKind::TopUsersByViewtime,
        PanelKind::SubscriptionCounts,
    ];

    /// Heading shown above the chart.
    pub fn title(&self) -> &'static str {
        match self {
            PanelKind::RegionDistribution => "Region-wise User Distribution",
            PanelKind::GenderDistribution => "Gender Distribution",
            PanelKind::AverageViewtimeByGender => "Average Viewtime by Gender",
            PanelKind::TopUsersByViewtime => "Top Users by Viewtime",
            PanelKind::SubscriptionCounts => "Count by Subscription Type",
        }
    }

    /// Whether the panel's query applies the sidebar filter.
    pub fn uses_filter(&self) -> bool {
        !matches!(self, PanelKind::SubscriptionCounts)
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// One chart slot: its query and either the result or the failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Panel {
    /// Which chart this is.
    pub kind: PanelKind,
    /// Exact SQL text sent to the broker.
    pub sql: String,
    /// Result table on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<ResultTable>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Panel {
    /// A panel whose query succeeded.
    pub fn loaded(kind: PanelKind, sql: String, table: ResultTable) -> Self {
        Self {
            kind,
            sql,
            table: Some(table),
            error: None,
        }
    }

    /// A panel whose query failed.
    pub fn failed(kind: PanelKind, sql: String, error: String) -> Self {
        Self {
            kind,
            sql,
            table: None,
            error: Some(error),
        }
    }

    /// Whether the query failed.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything needed to draw one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    /// Pinot table the queries ran against.
    pub table_name: String,
    /// The active filter.
    pub selection: FilterSelection,
    /// Distinct subscription types for the dropdown (without `All`).
    pub filter_values: Vec<String>,
    /// Set when the distinct-values query failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_error: Option<String>,
    /// The five panels in page order.
    pub panels: Vec<Panel>,
    /// When the report was assembled.
    pub generated_at: DateTime<Utc>,
}

impl DashboardReport {
    /// Looks up a panel by kind.
    pub fn panel(&self, kind: PanelKind) -> Option<&Panel> {
        self.panels.iter().find(|p| p.kind == kind)
    }

    /// Number of panels whose query failed.
    pub fn failed_panels(&self) -> usize {
        self.panels.iter().filter(|p| p.is_failed()).count()
    }

    /// Dropdown options: `All` followed by the distinct values.
    pub fn dropdown_options(&self) -> Vec<String> {
        std::iter::once(ALL_LABEL.to_string())
            .chain(self.filter_values.iter().cloned())
            .collect()
    }
}
