//! The `scan` use case: load rules, walk the tree, evaluate, and build the report.

use crate::report::build_report;
use crate::rules::{RuleSource, evaluator_registry, load_rules};
use anyhow::Context;
use camino::Utf8Path;
use complyguard_domain::{CancelToken, resolve};
use complyguard_scan::{FsWalker, ScanOptions, scan};
use complyguard_settings::{ComplyguardConfigV1, Overrides, ResolvedSettings};
use complyguard_types::{ComplianceReport, Subject};
use serde_json::Value;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
pub struct ScanInput<'a> {
    /// Scan root directory.
    pub root: &'a Utf8Path,
    pub rules: RuleSource,
    /// `complyguard.toml` contents (empty string if not found).
    pub config_text: &'a str,
    pub overrides: Overrides,
    /// Repository metadata for metadata-check rules, `Value::Null` when not supplied.
    pub metadata: Value,
    pub subject: Subject,
    /// The report's declared timestamp. Never read from the clock here.
    pub timestamp: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct ScanOutput {
    pub report: ComplianceReport,
    pub settings: ResolvedSettings,
}

/// Run a full scan. Any `Err` is a configuration problem and nothing was evaluated;
/// evaluation problems surface as findings in the report instead.
pub fn run_scan(input: ScanInput<'_>) -> anyhow::Result<ScanOutput> {
    let cfg = if input.config_text.trim().is_empty() {
        ComplyguardConfigV1::default()
    } else {
        complyguard_settings::parse_config_toml(input.config_text).context("parse config")?
    };
    let settings = complyguard_settings::resolve_settings(cfg, input.overrides.clone())
        .context("resolve config")?;

    if !input.root.is_dir() {
        anyhow::bail!("scan root is not a directory: {}", input.root);
    }

    let registry = evaluator_registry(settings.limits);
    let rules = load_rules(&input.rules, &registry)?;
    let plan = registry.compile(&rules).context("compile rule set")?;

    let walker = FsWalker::new(input.root).with_scope(settings.scope()?);
    let options = ScanOptions::new(input.root)
        .with_concurrency(settings.concurrency)
        .with_metadata(input.metadata);
    let cancel = settings
        .timeout
        .map_or_else(CancelToken::new, CancelToken::with_timeout);

    let outcome = scan(&plan, walker.walk(), &options, &cancel);
    let resolution = resolve(plan.catalog(), &outcome.findings, &outcome.coverage);

    Ok(ScanOutput {
        report: build_report(resolution, outcome.coverage, input.subject, input.timestamp),
        settings,
    })
}
