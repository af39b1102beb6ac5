use complyguard_types::{
    ComplianceReport, Coverage, FindingStatus, Location, OverallStatus, RepoPath, ReportFinding,
    SCHEMA_REPORT_V1, Severity, Subject, Summary, ToolMeta, ids,
};
use time::macros::datetime;

pub(crate) fn finding(
    rule_id: &str,
    framework: &str,
    status: FindingStatus,
    severity: Severity,
) -> ReportFinding {
    ReportFinding {
        rule_id: rule_id.to_string(),
        rule_name: format!("{rule_id} name"),
        framework: framework.to_string(),
        control: "CC6.1".to_string(),
        code: ids::CODE_PATTERN_MATCHED.to_string(),
        status,
        severity,
        message: format!("{rule_id} name: pattern matched"),
        evidence: None,
        remediation: None,
        location: None,
        fingerprint: "0".repeat(64),
    }
}

pub(crate) fn report(findings: Vec<ReportFinding>, overall: OverallStatus) -> ComplianceReport {
    let mut frameworks: Vec<String> = findings.iter().map(|f| f.framework.clone()).collect();
    frameworks.sort();
    frameworks.dedup();
    ComplianceReport {
        schema: SCHEMA_REPORT_V1.to_string(),
        tool: ToolMeta {
            name: "complyguard".to_string(),
            version: "0.1.0".to_string(),
        },
        timestamp: datetime!(2026-01-02 03:04:05 UTC),
        subject: Subject {
            repository: "acme/api".to_string(),
            commit: "abc123".to_string(),
        },
        frameworks,
        rules_evaluated: 3,
        overall_status: overall,
        summary: Summary::from_statuses(findings.iter().map(|f| f.status)),
        coverage: Coverage {
            units_scanned: 12,
            ..Coverage::default()
        },
        findings,
    }
}

/// Critical secret in config.py, a GDPR warning, and a clean tool rule.
pub(crate) fn failing_report() -> ComplianceReport {
    let mut secret = finding("AC-001", "SOC2", FindingStatus::Failed, Severity::Critical);
    secret.location = Some(Location::line(RepoPath::new("config.py"), 2));
    secret.evidence = Some("password = \"hunter2\"".to_string());
    secret.remediation = Some("Use environment variables or secrets manager".to_string());

    let mut pii = finding("GDPR-001", "GDPR", FindingStatus::Warning, Severity::Medium);
    pii.location = Some(Location::line(RepoPath::new("users.py"), 10));
    pii.remediation = Some("Ensure PII is encrypted and access-controlled".to_string());

    let mut clean = finding("DEP-001", "SOC2", FindingStatus::Passed, Severity::High);
    clean.code = ids::CODE_NO_VIOLATIONS.to_string();
    clean.message = "DEP-001 name: no violations".to_string();

    report(vec![secret, clean, pii], OverallStatus::Failed)
}
