use super::{PathScope, compile_regex, scan_lines};
use crate::{
    CompiledCheck, EvalContext, EvalError, EvaluatorFactory, Finding, Limits, ProbeCheck,
    ProbeOutcome, SourceUnit, UnitMeta,
};
use complyguard_rules::{EvaluatorKind, Rule, RuleError};
use complyguard_types::{Coverage, FindingStatus, Location, RepoPath, ids};
use regex::Regex;
use std::io::Read;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

const PARAMS: &[&str] = &[
    "pattern",
    "include",
    "exclude",
    "case_insensitive",
    "when_missing",
];

/// Accumulates probe hits for one presence rule across all workers.
///
/// Keeps the hit count, the lexicographically smallest matching path, and the number of
/// units only partly read. None depends on the order probes complete in.
#[derive(Debug, Default)]
pub struct PresenceState {
    hits: AtomicU64,
    truncated: AtomicU64,
    first: Mutex<Option<RepoPath>>,
}

impl PresenceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: &RepoPath) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        let mut first = self.first.lock().unwrap_or_else(PoisonError::into_inner);
        if first.as_ref().is_none_or(|cur| path < cur) {
            *first = Some(path.clone());
        }
    }

    pub fn record_truncated(&self) {
        self.truncated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn truncated(&self) -> u64 {
        self.truncated.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn first_match(&self) -> Option<RepoPath> {
        self.first
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub struct PresenceFactory {
    limits: Limits,
}

impl PresenceFactory {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }
}

impl EvaluatorFactory for PresenceFactory {
    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::PresenceCheck
    }

    fn compile(&self, rule: &Rule) -> Result<CompiledCheck, RuleError> {
        let p = rule.params.reader(&rule.id);
        p.deny_unknown(PARAMS)?;

        let case_insensitive = p.bool("case_insensitive")?.unwrap_or(false);
        let regex = compile_regex(&rule.id, p.require_str("pattern")?, case_insensitive)?;
        let scope = PathScope::from_params(&p, &rule.id)?;

        let when_missing = match p.str("when_missing")? {
            None | Some("warning") => FindingStatus::Warning,
            Some("failed") => FindingStatus::Failed,
            Some(other) => {
                return Err(RuleError::invalid_params(
                    &rule.id,
                    format!("`when_missing` must be warning|failed, got '{other}'"),
                ));
            }
        };

        Ok(CompiledCheck::Probe(Box::new(PresenceCheck {
            rule_id: rule.id.clone(),
            regex,
            scope,
            when_missing,
            limits: self.limits,
        })))
    }
}

/// Requires at least one unit in scope to contain a marker.
pub struct PresenceCheck {
    rule_id: String,
    regex: Regex,
    scope: PathScope,
    when_missing: FindingStatus,
    limits: Limits,
}

impl ProbeCheck for PresenceCheck {
    fn applies_to(&self, unit: &UnitMeta) -> bool {
        !unit.binary && self.scope.matches(&unit.path)
    }

    fn probe(
        &self,
        unit: &dyn SourceUnit,
        ctx: &EvalContext<'_>,
    ) -> Result<ProbeOutcome, EvalError> {
        let meta = unit.meta();
        let reader = unit
            .open()
            .map_err(|e| EvalError::io(meta.path.as_str(), e))?
            .take(self.limits.max_file_bytes);

        let mut found = false;
        scan_lines(reader, &meta.path, ctx.cancel, |_, text| {
            if self.regex.is_match(text) {
                found = true;
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })?;

        Ok(if found {
            ProbeOutcome::Hit
        } else if meta.size > self.limits.max_file_bytes {
            ProbeOutcome::Truncated
        } else {
            ProbeOutcome::Miss
        })
    }

    fn finalize(&self, state: &PresenceState, coverage: &Coverage) -> Vec<Finding> {
        let finding = match state.first_match() {
            Some(first) => Finding::new(
                self.rule_id.as_str(),
                ids::CODE_MARKER_FOUND,
                FindingStatus::Passed,
                "Required marker found",
            )
            .with_evidence(format!(
                "first match: {first}; {} matching unit(s)",
                state.hits()
            ))
            .at(Location::file(first)),
            None if coverage.complete => {
                let missing = Finding::new(
                    self.rule_id.as_str(),
                    ids::CODE_MARKER_MISSING,
                    self.when_missing,
                    "Required marker not found in any unit",
                );
                match state.truncated() {
                    0 => missing,
                    n => missing.with_evidence(format!(
                        "{n} unit(s) larger than {} bytes were only searched up to that limit",
                        self.limits.max_file_bytes
                    )),
                }
            }
            None => Finding::new(
                self.rule_id.as_str(),
                ids::CODE_SCAN_TIMEOUT,
                FindingStatus::Skipped,
                "Marker not found before the scan stopped; presence could not be concluded",
            ),
        };
        vec![finding]
    }
}
