//! Dashboard page and document generation.

pub mod generator;

pub use generator::{generate_html_report, generate_json_report, write_report, OutputFormat};
