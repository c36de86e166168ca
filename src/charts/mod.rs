//! Chart specs for the dashboard panels.

pub mod vega;

pub use vega::{panel_view, PanelView};
