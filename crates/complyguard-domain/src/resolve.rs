use crate::{Finding, FindingSet, RuleCatalog, RuleInfo, fingerprint_for_finding};
use complyguard_types::{
    Coverage, FindingStatus, OverallStatus, ReportFinding, Severity, Summary, ids,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    /// Report rows in total finding order, including synthesized `no_violations` rows.
    pub findings: Vec<ReportFinding>,
    pub overall: OverallStatus,
    pub summary: Summary,
    pub rules_evaluated: u32,
    pub frameworks: Vec<String>,
}

/// Attach rule metadata to every finding, synthesize a row for rules that produced nothing,
/// and apply the severity gate.
///
/// A silent rule gets a `no_violations` pass only when `coverage` is complete. After an
/// interrupted scan silence proves nothing, so the rule gets a `Skipped` `scan_timeout` row.
///
/// The overall status is `Failed` iff some finding is `Failed` and its rule is Critical or
/// High. Warnings, skips, and errors never fail the verdict on their own.
pub fn resolve(catalog: &RuleCatalog, set: &FindingSet, coverage: &Coverage) -> Resolution {
    let mut findings: Vec<Finding> = set.iter().cloned().collect();
    for rule in catalog.iter() {
        if set.has_rule(&rule.id) {
            continue;
        }
        findings.push(if coverage.complete {
            Finding::new(
                rule.id.as_str(),
                ids::CODE_NO_VIOLATIONS,
                FindingStatus::Passed,
                "No violations detected",
            )
        } else {
            Finding::scan_timeout(rule.id.as_str(), None)
        });
    }
    findings.sort();

    let rows: Vec<ReportFinding> = findings
        .iter()
        .map(|f| {
            let info = catalog.get(&f.rule_id).cloned().unwrap_or_else(|| {
                tracing::warn!(rule_id = %f.rule_id, "finding references a rule outside the catalog");
                unknown_rule(&f.rule_id)
            });
            to_report_finding(f, &info)
        })
        .collect();

    let overall = if rows
        .iter()
        .any(|r| r.status == FindingStatus::Failed && r.severity.is_gating())
    {
        OverallStatus::Failed
    } else {
        OverallStatus::Passed
    };

    Resolution {
        summary: Summary::from_statuses(rows.iter().map(|r| r.status)),
        overall,
        rules_evaluated: catalog.len() as u32,
        frameworks: catalog.frameworks(),
        findings: rows,
    }
}

fn unknown_rule(rule_id: &str) -> RuleInfo {
    RuleInfo {
        id: rule_id.to_string(),
        name: rule_id.to_string(),
        framework: "unknown".to_string(),
        control: "unknown".to_string(),
        severity: Severity::Info,
        remediation: None,
    }
}

fn to_report_finding(f: &Finding, rule: &RuleInfo) -> ReportFinding {
    // Remediation is only useful where something needs fixing.
    let remediation = match f.status {
        FindingStatus::Passed | FindingStatus::Skipped => None,
        _ => rule.remediation.clone(),
    };
    ReportFinding {
        rule_id: f.rule_id.clone(),
        rule_name: rule.name.clone(),
        framework: rule.framework.clone(),
        control: rule.control.clone(),
        code: f.code.clone(),
        status: f.status,
        severity: rule.severity,
        message: f.message.clone(),
        evidence: f.evidence.clone(),
        remediation,
        location: f.location.clone(),
        fingerprint: fingerprint_for_finding(f),
    }
}

/// Convert emitted report rows back into domain findings (for shard merging).
///
/// Synthesized `no_violations` rows are dropped; resolution re-creates them.
pub fn findings_from_report(rows: &[ReportFinding]) -> FindingSet {
    rows.iter()
        .filter(|r| r.code != ids::CODE_NO_VIOLATIONS)
        .map(|r| Finding {
            rule_id: r.rule_id.clone(),
            code: r.code.clone(),
            status: r.status,
            message: r.message.clone(),
            evidence: r.evidence.clone(),
            location: r.location.clone(),
        })
        .collect()
}
