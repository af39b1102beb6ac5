use anyhow::Context;
use complyguard_domain::Resolution;
use complyguard_types::{
    ComplianceReport, Coverage, OverallStatus, SCHEMA_REPORT_V1, Subject, ToolMeta,
};
use time::{OffsetDateTime, UtcOffset};

pub const EXIT_PASSED: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
/// Invalid rules, settings, or inputs. Nothing was scanned.
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Map the overall status to a process exit code: 0 = passed, 1 = failed.
pub fn exit_code(status: OverallStatus) -> i32 {
    match status {
        OverallStatus::Passed => EXIT_PASSED,
        OverallStatus::Failed => EXIT_FAILED,
    }
}

pub fn tool_meta() -> ToolMeta {
    ToolMeta {
        name: "complyguard".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Assemble the report envelope. The timestamp is normalized to UTC whole seconds.
pub fn build_report(
    resolution: Resolution,
    coverage: Coverage,
    subject: Subject,
    timestamp: OffsetDateTime,
) -> ComplianceReport {
    let timestamp = timestamp.to_offset(UtcOffset::UTC);
    ComplianceReport {
        schema: SCHEMA_REPORT_V1.to_string(),
        tool: tool_meta(),
        timestamp: timestamp.replace_nanosecond(0).unwrap_or(timestamp),
        subject,
        frameworks: resolution.frameworks,
        rules_evaluated: resolution.rules_evaluated,
        overall_status: resolution.overall,
        summary: resolution.summary,
        coverage,
        findings: resolution.findings,
    }
}

pub fn parse_report_json(text: &str) -> anyhow::Result<ComplianceReport> {
    let value: serde_json::Value = serde_json::from_str(text).context("parse report json")?;
    let schema = value
        .get("schema")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if schema != SCHEMA_REPORT_V1 {
        anyhow::bail!("unknown report schema: {schema:?} (expected {SCHEMA_REPORT_V1})");
    }
    serde_json::from_value(value).context("parse complyguard report")
}

/// Canonical JSON bytes for the report.
pub fn serialize_report(report: &ComplianceReport) -> anyhow::Result<Vec<u8>> {
    complyguard_render::render_json(report).context("serialize report")
}
