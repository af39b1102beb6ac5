use complyguard_types::{ComplianceReport, FindingStatus, OverallStatus, ReportFinding};
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;

/// Render the report for human readers.
///
/// Layout: header and summary table, findings grouped by framework (sorted), then one
/// remediation entry per failing or warning rule, ordered by rule id.
pub fn render_markdown(report: &ComplianceReport) -> String {
    let mut out = String::new();

    out.push_str("# Compliance report\n\n");
    let overall = match report.overall_status {
        OverallStatus::Passed => "PASSED",
        OverallStatus::Failed => "FAILED",
    };
    let timestamp = report
        .timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| report.timestamp.to_string());
    out.push_str(&format!("- Overall: **{overall}**\n"));
    out.push_str(&format!(
        "- Subject: `{}` @ `{}`\n",
        report.subject.repository, report.subject.commit
    ));
    out.push_str(&format!("- Timestamp: {timestamp}\n"));
    out.push_str(&format!(
        "- Frameworks: {}\n",
        if report.frameworks.is_empty() {
            "none".to_string()
        } else {
            report.frameworks.join(", ")
        }
    ));
    out.push_str(&format!("- Rules evaluated: {}\n", report.rules_evaluated));
    out.push_str(&format!(
        "- Tool: {} {}\n\n",
        report.tool.name, report.tool.version
    ));

    render_summary(&mut out, report);

    if report.findings.is_empty() {
        out.push_str("No findings.\n");
        return out;
    }

    render_findings(&mut out, &report.findings);
    render_remediation(&mut out, &report.findings);

    out
}

fn render_summary(out: &mut String, report: &ComplianceReport) {
    let s = &report.summary;
    out.push_str("## Summary\n\n");
    out.push_str("| Total | Passed | Failed | Warnings | Skipped | Errors |\n");
    out.push_str("|------:|-------:|-------:|---------:|--------:|-------:|\n");
    out.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} |\n\n",
        s.total, s.passed, s.failed, s.warnings, s.skipped, s.errors
    ));

    let c = &report.coverage;
    if c.complete {
        out.push_str(&format!(
            "Coverage: complete ({} units scanned, {} walk errors).\n\n",
            c.units_scanned, c.walk_errors
        ));
    } else {
        out.push_str(&format!(
            "> Coverage incomplete ({}): {} units scanned, {} walk errors. Skipped controls were not evaluated.\n\n",
            c.reason.as_deref().unwrap_or("unknown"),
            c.units_scanned,
            c.walk_errors
        ));
    }
}

fn render_findings(out: &mut String, findings: &[ReportFinding]) {
    let mut by_framework: BTreeMap<&str, Vec<&ReportFinding>> = BTreeMap::new();
    for f in findings {
        by_framework.entry(f.framework.as_str()).or_default().push(f);
    }

    out.push_str("## Findings\n\n");
    for (framework, rows) in by_framework {
        out.push_str(&format!("### {framework}\n\n"));
        for f in rows {
            out.push_str(&format!(
                "- [{}] [{}] `{}` {} ({}): {}",
                status_label(f.status),
                f.severity.as_str(),
                f.rule_id,
                f.rule_name,
                f.control,
                one_line(&f.message)
            ));
            if let Some(loc) = &f.location {
                out.push_str(&format!(" at `{loc}`"));
            }
            out.push('\n');
            if let Some(evidence) = &f.evidence {
                out.push_str(&format!("  - evidence: {}\n", code_span(evidence)));
            }
        }
        out.push('\n');
    }
}

fn render_remediation(out: &mut String, findings: &[ReportFinding]) {
    let mut rules: BTreeMap<&str, &ReportFinding> = BTreeMap::new();
    for f in findings {
        if !matches!(f.status, FindingStatus::Failed | FindingStatus::Warning) {
            continue;
        }
        let entry = rules.entry(f.rule_id.as_str()).or_insert(f);
        if entry.remediation.is_none() && f.remediation.is_some() {
            *entry = f;
        }
    }
    if rules.is_empty() {
        return;
    }

    out.push_str("## Remediation\n\n");
    for (rule_id, f) in rules {
        out.push_str(&format!(
            "- **{rule_id}** {}: {}\n",
            f.rule_name,
            f.remediation
                .as_deref()
                .map(one_line)
                .unwrap_or_else(|| "No remediation provided.".to_string())
        ));
    }
}

fn status_label(status: FindingStatus) -> &'static str {
    match status {
        FindingStatus::Passed => "PASSED",
        FindingStatus::Failed => "FAILED",
        FindingStatus::Warning => "WARNING",
        FindingStatus::Skipped => "SKIPPED",
        FindingStatus::Error => "ERROR",
    }
}

fn one_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Inline code span that survives backticks inside the text.
fn code_span(s: &str) -> String {
    let s = one_line(s);
    if s.contains('`') {
        format!("`` {s} ``")
    } else {
        format!("`{s}`")
    }
}
