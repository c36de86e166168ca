//! HTML and JSON dashboard generation.
//!
//! This module renders a [`DashboardReport`] as a standalone HTML page
//! (charts drawn in the browser by vega-embed) or as a JSON document.
//! The page comes from the askama template `templates/dashboard.html`,
//! which HTML-escapes every interpolated value.

use crate::charts::{panel_view, PanelView};
use crate::models::{DashboardReport, Panel, PanelKind};
use anyhow::{Context, Result};
use askama::Template;
use serde::Serialize;
use std::path::Path;

const PAGE_TITLE: &str = "Real-time Subscribers Analytics";
const PAGE_SUBTITLE: &str = "Interactive Dashboard with Users Insights";

const VEGA_SCRIPTS: &[&str] = &[
    "https://cdn.jsdelivr.net/npm/vega@5",
    "https://cdn.jsdelivr.net/npm/vega-lite@5",
    "https://cdn.jsdelivr.net/npm/vega-embed@6",
];

/// Page layout: region full width, gender panels side by side, then the rest.
const LAYOUT: &[&[PanelKind]] = &[
    &[PanelKind::RegionDistribution],
    &[PanelKind::GenderDistribution, PanelKind::AverageViewtimeByGender],
    &[PanelKind::TopUsersByViewtime],
    &[PanelKind::SubscriptionCounts],
];

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardPage<'a> {
    title: &'a str,
    subtitle: &'a str,
    scripts: &'a [&'a str],
    options: Vec<DropdownOption>,
    selected: String,
    filter_error: Option<&'a str>,
    rows: Vec<Vec<PanelSlot>>,
    table_name: &'a str,
    generated_at: String,
}

struct DropdownOption {
    value: String,
    selected: bool,
}

struct PanelSlot {
    id: &'static str,
    title: &'static str,
    body: SlotBody,
}

enum SlotBody {
    /// Script-safe Vega-Lite JSON.
    Chart(String),
    Empty,
    Error(String),
    Missing,
}

impl<'a> DashboardPage<'a> {
    fn new(report: &'a DashboardReport) -> Self {
        let selected = report.selection.to_string();

        let mut values = report.dropdown_options();
        // Keep a selection visible even if the engine no longer lists it.
        if !values.contains(&selected) {
            values.push(selected.clone());
        }
        let options = values
            .into_iter()
            .map(|value| DropdownOption {
                selected: value == selected,
                value,
            })
            .collect();

        let rows = LAYOUT
            .iter()
            .map(|row| row.iter().map(|&kind| panel_slot(report, kind)).collect())
            .collect();

        Self {
            title: PAGE_TITLE,
            subtitle: PAGE_SUBTITLE,
            scripts: VEGA_SCRIPTS,
            options,
            selected,
            filter_error: report.filter_error.as_deref(),
            rows,
            table_name: &report.table_name,
            generated_at: report
                .generated_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
        }
    }
}

fn panel_slot(report: &DashboardReport, kind: PanelKind) -> PanelSlot {
    let body = match report.panel(kind).map(panel_view) {
        Some(PanelView::Chart(spec)) => SlotBody::Chart(script_safe_json(&spec.to_string())),
        Some(PanelView::Empty) => SlotBody::Empty,
        Some(PanelView::Error(message)) => SlotBody::Error(message),
        None => SlotBody::Missing,
    };

    PanelSlot {
        id: panel_id(kind),
        title: kind.title(),
        body,
    }
}

/// Generate the complete dashboard page.
pub fn generate_html_report(report: &DashboardReport) -> Result<String> {
    DashboardPage::new(report)
        .render()
        .context("Failed to render dashboard page")
}

fn panel_id(kind: PanelKind) -> &'static str {
    match kind {
        PanelKind::RegionDistribution => "panel-region",
        PanelKind::GenderDistribution => "panel-gender",
        PanelKind::AverageViewtimeByGender => "panel-avg-viewtime",
        PanelKind::TopUsersByViewtime => "panel-top-users",
        PanelKind::SubscriptionCounts => "panel-subscriptions",
    }
}

/// Make JSON safe to inline inside a `<script>` element.
///
/// The template emits chart specs unescaped, so `</script>` inside data
/// must not close the element.
fn script_safe_json(json: &str) -> String {
    json.replace("</", "<\\/")
}

/// Report plus the per-panel chart views.
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a DashboardReport,
    charts: Vec<JsonChart>,
}

#[derive(Serialize)]
struct JsonChart {
    kind: PanelKind,
    view: PanelView,
}

fn json_charts(panels: &[Panel]) -> Vec<JsonChart> {
    panels
        .iter()
        .map(|p| JsonChart {
            kind: p.kind,
            view: panel_view(p),
        })
        .collect()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &DashboardReport) -> Result<String> {
    let doc = JsonReport {
        report,
        charts: json_charts(&report.panels),
    };
    serde_json::to_string_pretty(&doc).map_err(Into::into)
}

/// Output format for rendered reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Standalone HTML page (default)
    #[default]
    Html,
    /// JSON document
    Json,
}

/// Render a report in `format` and write it to `path`.
pub fn write_report(report: &DashboardReport, format: OutputFormat, path: &Path) -> Result<()> {
    let content = match format {
        OutputFormat::Html => generate_html_report(report)?,
        OutputFormat::Json => generate_json_report(report)?,
    };

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterSelection, ResultTable};
    use chrono::Utc;
    use serde_json::json;

    fn create_test_report(selection: FilterSelection) -> DashboardReport {
        let table = |cols: [&str; 2], rows: Vec<Vec<serde_json::Value>>| {
            ResultTable::new(cols.iter().map(|c| c.to_string()).collect(), rows)
        };

        DashboardReport {
            table_name: "topic5".to_string(),
            selection,
            filter_values: vec!["BASIC".to_string(), "PREMIUM".to_string()],
            filter_error: None,
            panels: vec![
                Panel::loaded(
                    PanelKind::RegionDistribution,
                    "SELECT REGIONID".to_string(),
                    table(
                        ["REGIONID", "user_count"],
                        vec![vec![json!("Region_1"), json!(4)]],
                    ),
                ),
                Panel::loaded(
                    PanelKind::GenderDistribution,
                    "SELECT GENDER".to_string(),
                    table(
                        ["GENDER", "gender_count"],
                        vec![vec![json!("MALE"), json!(2)]],
                    ),
                ),
                Panel::failed(
                    PanelKind::AverageViewtimeByGender,
                    "SELECT GENDER, AVG".to_string(),
                    "Pinot query error 200: <boom>".to_string(),
                ),
                Panel::loaded(
                    PanelKind::TopUsersByViewtime,
                    "SELECT USERID".to_string(),
                    table(["USERID", "total_viewtime"], vec![]),
                ),
                Panel::loaded(
                    PanelKind::SubscriptionCounts,
                    "SELECT SUBSCRIPTIONTYPE".to_string(),
                    table(
                        ["SUBSCRIPTIONTYPE", "subscription_count"],
                        vec![vec![json!("BASIC"), json!(7)]],
                    ),
                ),
            ],
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_generate_html_report() {
        let html = generate_html_report(&create_test_report(FilterSelection::All)).unwrap();

        assert!(html.contains("<h1>Real-time Subscribers Analytics</h1>"));
        assert!(html.contains("Interactive Dashboard with Users Insights"));
        assert!(html.contains("Select Subscription Type"));
        assert!(html.contains("<option value=\"All\" selected>All</option>"));
        assert!(html.contains("<option value=\"PREMIUM\">PREMIUM</option>"));
        assert!(html.contains("id=\"panel-region-chart\""));
        assert!(html.contains("vega-embed"));
    }

    #[test]
    fn test_failed_and_empty_panels() {
        let html = generate_html_report(&create_test_report(FilterSelection::All)).unwrap();

        assert!(html.contains("Query failed: Pinot query error 200: &lt;boom&gt;"));
        assert!(html.contains("No data for the selected subscription type."));
        assert!(!html.contains("panel-top-users-chart"));
    }

    #[test]
    fn test_selected_value_is_escaped() {
        let html = generate_html_report(&create_test_report(FilterSelection::Value(
            "<b>\"x\"&y".to_string(),
        )))
        .unwrap();

        assert!(!html.contains("<b>\"x\""));
        assert!(html.contains("&lt;b&gt;&quot;x&quot;&amp;y"));
        assert!(html.contains("<option value=\"&lt;b&gt;&quot;x&quot;&amp;y\" selected>"));
    }

    #[test]
    fn test_filter_error_is_shown() {
        let mut report = create_test_report(FilterSelection::All);
        report.filter_values.clear();
        report.filter_error = Some("Query timed out after 30s".to_string());

        let html = generate_html_report(&report).unwrap();
        assert!(html.contains("Could not load subscription types: Query timed out after 30s"));
        assert!(html.contains("<option value=\"All\" selected>All</option>"));
        assert!(!html.contains("value=\"BASIC\""));
    }

    #[test]
    fn test_chart_spec_is_embedded_unescaped() {
        let html = generate_html_report(&create_test_report(FilterSelection::All)).unwrap();
        assert!(html.contains("data-target=\"panel-region-chart\">{\""));
        assert!(html.contains("\"REGIONID\""));
        assert!(html.contains("<div class=\"columns\">"));
    }

    #[test]
    fn test_script_safe_json() {
        assert_eq!(script_safe_json(r#"{"a":"</script>"}"#), r#"{"a":"<\/script>"}"#);
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report(FilterSelection::Value("BASIC".to_string()));
        let json = generate_json_report(&report).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(doc["table_name"], "topic5");
        assert_eq!(doc["selection"], json!({"kind": "value", "value": "BASIC"}));
        assert_eq!(doc["panels"].as_array().unwrap().len(), 5);
        assert_eq!(doc["charts"][0]["view"]["state"], "chart");
        assert_eq!(doc["charts"][2]["view"]["state"], "error");
        assert_eq!(doc["charts"][3]["view"]["state"], "empty");
        assert_eq!(doc["charts"][3]["kind"], "top_users_by_viewtime");
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.html");

        write_report(
            &create_test_report(FilterSelection::All),
            OutputFormat::Html,
            &path,
        )
        .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<!DOCTYPE html>"));
    }
}
