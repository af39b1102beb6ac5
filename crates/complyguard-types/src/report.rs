use crate::RepoPath;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Stable schema identifier for complyguard evidence reports.
pub const SCHEMA_REPORT_V1: &str = "complyguard.report.v1";

/// Rule severity. Declaration order is the severity order: `Critical > High > Medium > Low > Info`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Only these severities can flip the overall status to failed.
    pub fn is_gating(self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(v: &str) -> Option<Severity> {
        match v.to_ascii_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }
}

/// Outcome of evaluating one rule against one unit (or the whole tree).
///
/// `Failed` means the control was violated; `Error` and `Skipped` mean it could not be
/// evaluated. The two families are never collapsed.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    Passed,
    Failed,
    Warning,
    Skipped,
    Error,
}

impl FindingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FindingStatus::Passed => "passed",
            FindingStatus::Failed => "failed",
            FindingStatus::Warning => "warning",
            FindingStatus::Skipped => "skipped",
            FindingStatus::Error => "error",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Passed,
    Failed,
}

#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct Location {
    pub path: RepoPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Location {
    pub fn file(path: RepoPath) -> Self {
        Self { path, line: None }
    }

    pub fn line(path: RepoPath, line: u32) -> Self {
        Self {
            path,
            line: Some(line),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.path, line),
            None => write!(f, "{}", self.path),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ToolMeta {
    pub name: String,
    pub version: String,
}

/// What was scanned: repository identity plus the commit the tree was checked out at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Subject {
    pub repository: String,
    pub commit: String,
}

impl Subject {
    pub fn unknown() -> Self {
        Self {
            repository: "unknown".to_string(),
            commit: "unknown".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Summary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub warnings: u32,
    pub skipped: u32,
    pub errors: u32,
}

impl Summary {
    pub fn from_statuses<I: IntoIterator<Item = FindingStatus>>(statuses: I) -> Self {
        let mut s = Summary::default();
        for status in statuses {
            s.total += 1;
            match status {
                FindingStatus::Passed => s.passed += 1,
                FindingStatus::Failed => s.failed += 1,
                FindingStatus::Warning => s.warnings += 1,
                FindingStatus::Skipped => s.skipped += 1,
                FindingStatus::Error => s.errors += 1,
            }
        }
        s
    }
}

/// How much of the tree the scan actually covered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub complete: bool,
    pub units_scanned: u64,
    pub walk_errors: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Default for Coverage {
    fn default() -> Self {
        Self {
            complete: true,
            units_scanned: 0,
            walk_errors: 0,
            reason: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportFinding {
    pub rule_id: String,
    pub rule_name: String,
    pub framework: String,
    pub control: String,
    pub code: String,
    pub status: FindingStatus,
    pub severity: Severity,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    /// Stable SHA-256 identity of `ruleId + code + location`, for diffing reports over time.
    pub fingerprint: String,
}

/// The evidence report. Created once per scan and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    /// Versioned schema identifier for the report shape.
    pub schema: String,
    pub tool: ToolMeta,
    /// The report's single declared timestamp.
    #[schemars(with = "String")]
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub subject: Subject,
    pub frameworks: Vec<String>,
    pub rules_evaluated: u32,
    pub overall_status: OverallStatus,
    pub summary: Summary,
    pub coverage: Coverage,
    pub findings: Vec<ReportFinding>,
}
