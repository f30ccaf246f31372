//! Report rendering.

pub mod generator;

pub use generator::{
    console_summary, generate_json_report, generate_markdown_report, write_report, Report,
    ReportMetadata,
};
