//! Stable DTOs and IDs used across the complyguard workspace.
//!
//! This crate is intentionally boring:
//! - data types for the emitted evidence report
//! - stable string IDs for evaluator kinds and finding codes
//! - canonical repo-relative path handling
//! - explain registry for evaluator kinds and finding codes

#![forbid(unsafe_code)]

pub mod explain;
pub mod ids;
pub mod path;
pub mod report;

pub use explain::{Explanation, lookup_explanation};
pub use path::RepoPath;
pub use report::{
    ComplianceReport, Coverage, FindingStatus, Location, OverallStatus, ReportFinding,
    SCHEMA_REPORT_V1, Severity, Subject, Summary, ToolMeta,
};
