//! Vega-Lite spec generation for dashboard panels.
//!
//! Each panel maps to one chart: a bar chart or a pie chart with inline
//! data taken from the panel's result table. The browser renders the specs
//! with vega-embed.

use crate::error::DashboardError;
use crate::models::{Panel, PanelKind, ResultTable};
use serde::Serialize;
use serde_json::{json, Value};

const SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// Chart height in pixels; width follows the container.
const CHART_HEIGHT: u32 = 320;

/// Mark family for a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Pie,
}

/// How a panel's columns map to chart channels.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartBinding {
    pub kind: ChartKind,
    /// Category column (x axis, or pie slice names).
    pub category: &'static str,
    /// Measure column (y axis, or pie slice sizes).
    pub measure: &'static str,
    /// Axis titles, when they differ from the column names.
    pub labels: Option<(&'static str, &'static str)>,
    /// Single mark colour for bar charts.
    pub color: &'static str,
    /// Fixed category → colour mapping for pie charts.
    pub color_map: &'static [(&'static str, &'static str)],
    /// Draw the measure above each bar.
    pub value_labels: bool,
}

const GENDER_COLORS: &[(&str, &str)] = &[
    ("MALE", "#B4C0AD"),
    ("FEMALE", "#B9C7DC"),
    ("OTHER", "#EEE7C3"),
];

/// Colours handed out, in order, to categories without a fixed colour.
const FALLBACK_PALETTE: &[&str] = &[
    "#636EFA", "#EF553B", "#00CC96", "#AB63FA", "#FFA15A", "#19D3F3", "#FF6692", "#B6E880",
    "#FF97FF", "#FECB52",
];

/// The chart binding for each panel.
pub fn binding(kind: PanelKind) -> ChartBinding {
    let bar = |category: &'static str, measure: &'static str, color: &'static str| ChartBinding {
        kind: ChartKind::Bar,
        category,
        measure,
        labels: None,
        color,
        color_map: &[],
        value_labels: false,
    };

    match kind {
        PanelKind::RegionDistribution => bar("REGIONID", "user_count", "#98AE9B"),
        PanelKind::GenderDistribution => ChartBinding {
            kind: ChartKind::Pie,
            color_map: GENDER_COLORS,
            ..bar("GENDER", "gender_count", "#B4C0AD")
        },
        PanelKind::AverageViewtimeByGender => bar("GENDER", "avg_viewtime", "#B9C7DC"),
        PanelKind::TopUsersByViewtime => ChartBinding {
            labels: Some(("User ID", "Total Viewtime")),
            value_labels: true,
            ..bar("USERID", "total_viewtime", "#EEE7C3")
        },
        PanelKind::SubscriptionCounts => {
            bar("SUBSCRIPTIONTYPE", "subscription_count", "#B4C0AD")
        }
    }
}

/// What the page shows in a panel slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum PanelView {
    /// A Vega-Lite spec to embed.
    Chart(Value),
    /// The query matched no rows.
    Empty,
    /// The query failed or returned an unusable table.
    Error(String),
}

/// Decide how to display a panel.
pub fn panel_view(panel: &Panel) -> PanelView {
    if let Some(ref err) = panel.error {
        return PanelView::Error(err.clone());
    }

    let Some(ref table) = panel.table else {
        return PanelView::Error("No result returned".to_string());
    };

    if table.is_empty() {
        return PanelView::Empty;
    }

    match vega_lite_spec(panel.kind, table) {
        Ok(spec) => PanelView::Chart(spec),
        Err(e) => PanelView::Error(e.to_string()),
    }
}

/// Build the Vega-Lite spec for a panel's table.
pub fn vega_lite_spec(kind: PanelKind, table: &ResultTable) -> Result<Value, DashboardError> {
    let binding = binding(kind);

    for column in [binding.category, binding.measure] {
        if table.column_index(column).is_none() {
            return Err(DashboardError::MissingColumn(column.to_string()));
        }
    }

    let mut spec = json!({
        "$schema": SCHEMA,
        "title": kind.title(),
        "width": "container",
        "height": CHART_HEIGHT,
        "data": { "values": table.to_records() },
    });

    let body = match binding.kind {
        ChartKind::Bar => bar_body(&binding),
        ChartKind::Pie => pie_body(&binding, table),
    };

    if let (Value::Object(spec_map), Value::Object(body_map)) = (&mut spec, body) {
        spec_map.extend(body_map);
    }

    Ok(spec)
}

fn bar_body(binding: &ChartBinding) -> Value {
    let (x_title, y_title) = binding
        .labels
        .unwrap_or((binding.category, binding.measure));

    let encoding = json!({
        "x": {
            "field": binding.category,
            "type": "nominal",
            "sort": null,
            "title": x_title,
        },
        "y": {
            "field": binding.measure,
            "type": "quantitative",
            "title": y_title,
        },
        "tooltip": [
            { "field": binding.category, "type": "nominal", "title": x_title },
            { "field": binding.measure, "type": "quantitative", "title": y_title },
        ],
    });

    let bar = json!({ "type": "bar", "color": binding.color });

    if !binding.value_labels {
        return json!({ "mark": bar, "encoding": encoding });
    }

    json!({
        "encoding": encoding,
        "layer": [
            { "mark": bar },
            {
                "mark": { "type": "text", "dy": -6, "baseline": "bottom" },
                "encoding": {
                    "text": {
                        "field": binding.measure,
                        "type": "quantitative",
                        "format": ".2s",
                    }
                }
            }
        ],
    })
}

fn pie_body(binding: &ChartBinding, table: &ResultTable) -> Value {
    let (domain, range) = color_scale(binding.color_map, table.column(binding.category));

    json!({
        "mark": { "type": "arc", "tooltip": true },
        "encoding": {
            "theta": { "field": binding.measure, "type": "quantitative" },
            "color": {
                "field": binding.category,
                "type": "nominal",
                "scale": { "domain": domain, "range": range },
            },
        },
    })
}

/// Fixed colours first, then one palette colour per unmapped category.
fn color_scale(
    color_map: &[(&'static str, &'static str)],
    categories: Option<Vec<&Value>>,
) -> (Vec<String>, Vec<String>) {
    let mut domain: Vec<String> = color_map.iter().map(|(k, _)| k.to_string()).collect();
    let mut range: Vec<String> = color_map.iter().map(|(_, v)| v.to_string()).collect();
    let mut palette = FALLBACK_PALETTE.iter().cycle();

    for value in categories.into_iter().flatten() {
        let name = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if domain.contains(&name) {
            continue;
        }
        if let Some(color) = palette.next() {
            domain.push(name);
            range.push(color.to_string());
        }
    }

    (domain, range)
}
