//! Merge reports from sharded scans of the same subject.

use crate::report::{build_report, tool_meta};
use complyguard_domain::{FindingSet, RuleCatalog, findings_from_report, resolve};
use complyguard_types::{ComplianceReport, Coverage, SCHEMA_REPORT_V1};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("no reports to merge")]
    Empty,

    #[error("unsupported report schema: {schema}")]
    UnsupportedSchema { schema: String },

    #[error("reports describe different subjects: {expected} and {found}")]
    SubjectMismatch { expected: String, found: String },
}

/// Combine shard reports into one, re-resolving the verdict over the union of findings.
///
/// All reports must share a subject. Findings dedup exactly as within one scan, so the
/// result does not depend on argument order. Coverage is complete only if every shard was.
/// The merged timestamp is the latest shard timestamp.
///
/// Presence-check conclusions are per shard: a marker found in one shard does not withdraw
/// a `marker_missing` warning from another.
pub fn merge_reports(reports: &[ComplianceReport]) -> Result<ComplianceReport, MergeError> {
    let first = reports.first().ok_or(MergeError::Empty)?;
    let subject_label = |r: &ComplianceReport| format!("{}@{}", r.subject.repository, r.subject.commit);

    for r in reports {
        if r.schema != SCHEMA_REPORT_V1 {
            return Err(MergeError::UnsupportedSchema {
                schema: r.schema.clone(),
            });
        }
        if r.subject != first.subject {
            return Err(MergeError::SubjectMismatch {
                expected: subject_label(first),
                found: subject_label(r),
            });
        }
    }

    let catalog = RuleCatalog::from_report_findings(reports.iter().flat_map(|r| &r.findings));
    let findings = reports
        .iter()
        .map(|r| findings_from_report(&r.findings))
        .fold(FindingSet::new(), FindingSet::merge);

    let reasons: BTreeSet<&str> = reports
        .iter()
        .filter_map(|r| r.coverage.reason.as_deref())
        .collect();
    let coverage = Coverage {
        complete: reports.iter().all(|r| r.coverage.complete),
        units_scanned: reports.iter().map(|r| r.coverage.units_scanned).sum(),
        walk_errors: reports.iter().map(|r| r.coverage.walk_errors).sum(),
        reason: reasons.into_iter().next().map(str::to_string),
    };
    let timestamp = reports
        .iter()
        .map(|r| r.timestamp)
        .max()
        .unwrap_or(first.timestamp);

    tracing::info!(shards = reports.len(), findings = findings.len(), "reports merged");

    let mut merged = build_report(
        resolve(&catalog, &findings, &coverage),
        coverage,
        first.subject.clone(),
        timestamp,
    );
    merged.tool = tool_meta();
    Ok(merged)
}
