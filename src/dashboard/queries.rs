//! SQL statements behind the dashboard panels.
//!
//! Statements are templates with `?` placeholders plus bind parameters.
//! Parameters only enter the query text through [`bind_literal`].

use crate::models::{FilterSelection, PanelKind};

/// Column the sidebar filters on.
pub const FILTER_COLUMN: &str = "SUBSCRIPTIONTYPE";

/// Quote a value as a SQL string literal, doubling embedded quotes.
pub fn bind_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Whether `name` is safe to use as an unquoted table identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A SQL boolean condition with its bind parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    sql: String,
    params: Vec<String>,
}

impl FilterClause {
    /// The template text with `?` placeholders.
    pub fn template(&self) -> &str {
        &self.sql
    }

    /// Bind parameters in placeholder order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The clause with every parameter bound.
    pub fn render(&self) -> String {
        bind(&self.sql, &self.params)
    }
}

/// Build the `WHERE` clause for a sidebar selection.
///
/// Both variants require the filter column to be non-null.
pub fn build_filter_clause(selection: &FilterSelection) -> FilterClause {
    match selection {
        FilterSelection::All => FilterClause {
            sql: format!("WHERE {} IS NOT NULL", FILTER_COLUMN),
            params: Vec::new(),
        },
        FilterSelection::Value(value) => FilterClause {
            sql: format!(
                "WHERE {col} = ? AND {col} IS NOT NULL",
                col = FILTER_COLUMN
            ),
            params: vec![value.clone()],
        },
    }
}

/// A complete query template and its bind parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    params: Vec<String>,
}

impl Statement {
    fn new(sql: String, params: Vec<String>) -> Self {
        debug_assert_eq!(
            sql.matches('?').count(),
            params.len(),
            "placeholder count must match parameter count"
        );
        Self { sql, params }
    }

    /// The exact query text sent to the broker.
    pub fn render(&self) -> String {
        bind(&self.sql, &self.params)
    }
}

fn bind(template: &str, params: &[String]) -> String {
    let mut out = String::with_capacity(template.len() + params.len() * 16);
    let mut params = params.iter();

    for c in template.chars() {
        if c != '?' {
            out.push(c);
            continue;
        }
        match params.next() {
            Some(p) => out.push_str(&bind_literal(p)),
            None => out.push('?'),
        }
    }

    out
}

/// Query catalog for one Pinot table.
#[derive(Debug, Clone)]
pub struct QueryCatalog {
    table: String,
}

impl QueryCatalog {
    /// Create a catalog for `table`, which must be a plain identifier.
    pub fn new(table: &str) -> Option<Self> {
        is_valid_identifier(table).then(|| Self {
            table: table.to_string(),
        })
    }

    /// The table every statement reads from.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Distinct non-null values of the filter column.
    pub fn filter_values(&self) -> Statement {
        Statement::new(
            format!(
                "SELECT DISTINCT {col} FROM {table} WHERE {col} IS NOT NULL",
                col = FILTER_COLUMN,
                table = self.table
            ),
            Vec::new(),
        )
    }

    /// The statement behind one panel.
    pub fn panel(&self, kind: PanelKind, clause: &FilterClause) -> Statement {
        let table = &self.table;
        // Subscription counts always cover every subscription type.
        let clause = if kind.uses_filter() {
            clause.clone()
        } else {
            build_filter_clause(&FilterSelection::All)
        };
        let filter = clause.template();

        let sql = match kind {
            PanelKind::RegionDistribution => format!(
                "SELECT REGIONID, COUNT(DISTINCT USERID) AS user_count FROM {table} {filter} \
                 GROUP BY REGIONID ORDER BY user_count DESC LIMIT 10"
            ),
            PanelKind::GenderDistribution => format!(
                "SELECT GENDER, COUNT(*) AS gender_count FROM {table} {filter} \
                 GROUP BY GENDER ORDER BY gender_count DESC"
            ),
            PanelKind::AverageViewtimeByGender => format!(
                "SELECT GENDER, AVG(VIEWTIME) AS avg_viewtime FROM {table} {filter} \
                 GROUP BY GENDER"
            ),
            PanelKind::TopUsersByViewtime => format!(
                "SELECT USERID, SUM(VIEWTIME) AS total_viewtime FROM {table} {filter} \
                 GROUP BY USERID ORDER BY total_viewtime DESC LIMIT 10"
            ),
            PanelKind::SubscriptionCounts => format!(
                "SELECT {FILTER_COLUMN}, COUNT(*) AS subscription_count FROM {table} {filter} \
                 GROUP BY {FILTER_COLUMN} ORDER BY subscription_count DESC"
            ),
        };

        Statement::new(sql, clause.params().to_vec())
    }
}
