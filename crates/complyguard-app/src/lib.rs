//! Use case orchestration for complyguard.
//!
//! This crate is the application layer: use cases that wire rule loading, the scan
//! coordinator, resolution, and rendering together. The CLI crate depends on this and only
//! handles argument parsing and I/O.

#![forbid(unsafe_code)]

mod context;
mod explain;
mod merge;
mod render;
mod report;
mod rules;
mod scan;

pub use context::{
    ENV_COMMIT, ENV_REPOSITORY, ENV_SOURCE_DATE_EPOCH, resolve_subject, resolve_timestamp,
};
pub use explain::{ExplainOutput, format_explanation, format_not_found, run_explain};
pub use merge::{MergeError, merge_reports};
pub use render::{render_annotations, render_markdown};
pub use report::{
    EXIT_CONFIG_ERROR, EXIT_FAILED, EXIT_PASSED, build_report, exit_code, parse_report_json,
    serialize_report, tool_meta,
};
pub use rules::{
    RuleSource, ValidateOutput, evaluator_registry, load_rules, preset_text, run_validate,
};
pub use scan::{ScanInput, ScanOutput, run_scan};
