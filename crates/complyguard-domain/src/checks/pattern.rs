use super::{PathScope, compile_regex, scan_lines};
use crate::{
    CompiledCheck, EvalContext, EvalError, EvaluatorFactory, Finding, Limits, SourceUnit,
    UnitCheck, UnitMeta, truncate_evidence,
};
use complyguard_rules::{EvaluatorKind, Rule, RuleError};
use complyguard_types::{FindingStatus, Location, ids};
use regex::Regex;
use std::io::Read;
use std::ops::ControlFlow;

const PARAMS: &[&str] = &[
    "pattern",
    "include",
    "exclude",
    "case_insensitive",
    "on_match",
    "max_matches",
    "redact",
];

const DEFAULT_MAX_MATCHES: u64 = 20;

/// Replaces every matched span when a rule sets `redact = true`.
const REDACTED: &str = "[REDACTED]";

pub struct PatternFactory {
    limits: Limits,
}

impl PatternFactory {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }
}

impl EvaluatorFactory for PatternFactory {
    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::PatternMatch
    }

    fn compile(&self, rule: &Rule) -> Result<CompiledCheck, RuleError> {
        let p = rule.params.reader(&rule.id);
        p.deny_unknown(PARAMS)?;

        let case_insensitive = p.bool("case_insensitive")?.unwrap_or(false);
        let regex = compile_regex(&rule.id, p.require_str("pattern")?, case_insensitive)?;
        let scope = PathScope::from_params(&p, &rule.id)?;

        let on_match = match p.str("on_match")? {
            None | Some("failed") => FindingStatus::Failed,
            Some("warning") => FindingStatus::Warning,
            Some(other) => {
                return Err(RuleError::invalid_params(
                    &rule.id,
                    format!("`on_match` must be failed|warning, got '{other}'"),
                ));
            }
        };

        let max_matches = p.u64("max_matches")?.unwrap_or(DEFAULT_MAX_MATCHES);
        if max_matches == 0 {
            return Err(RuleError::invalid_params(
                &rule.id,
                "`max_matches` must be at least 1",
            ));
        }

        Ok(CompiledCheck::Unit(Box::new(PatternMatch {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            regex,
            scope,
            on_match,
            redact: p.bool("redact")?.unwrap_or(false),
            max_matches: usize::try_from(max_matches).unwrap_or(usize::MAX),
            limits: self.limits,
        })))
    }
}

/// Flags every line matching a regex.
pub struct PatternMatch {
    rule_id: String,
    rule_name: String,
    regex: Regex,
    scope: PathScope,
    on_match: FindingStatus,
    /// Mask the matched text in evidence.
    redact: bool,
    max_matches: usize,
    limits: Limits,
}

impl PatternMatch {
    fn evidence(&self, line: &str) -> String {
        let line = line.trim();
        let shown = if self.redact {
            self.regex.replace_all(line, REDACTED)
        } else {
            line.into()
        };
        truncate_evidence(&shown, self.limits.max_evidence_bytes)
    }
}

impl UnitCheck for PatternMatch {
    fn applies_to(&self, unit: &UnitMeta) -> bool {
        !unit.binary && self.scope.matches(&unit.path)
    }

    fn evaluate(
        &self,
        unit: &dyn SourceUnit,
        ctx: &EvalContext<'_>,
    ) -> Result<Vec<Finding>, EvalError> {
        let meta = unit.meta();
        if meta.size > self.limits.max_file_bytes {
            return Ok(vec![
                Finding::new(
                    self.rule_id.as_str(),
                    ids::CODE_FILE_TOO_LARGE,
                    FindingStatus::Skipped,
                    format!(
                        "not scanned: {} bytes exceeds the {}-byte limit",
                        meta.size, self.limits.max_file_bytes
                    ),
                )
                .at(Location::file(meta.path.clone())),
            ]);
        }

        let reader = unit
            .open()
            .map_err(|e| EvalError::io(meta.path.as_str(), e))?
            .take(self.limits.max_file_bytes);

        let mut out = Vec::new();
        scan_lines(reader, &meta.path, ctx.cancel, |line_no, text| {
            if !self.regex.is_match(text) {
                return ControlFlow::Continue(());
            }
            out.push(
                Finding::new(
                    self.rule_id.as_str(),
                    ids::CODE_PATTERN_MATCHED,
                    self.on_match,
                    format!("{}: pattern matched", self.rule_name),
                )
                .with_evidence(self.evidence(text))
                .at(Location::line(meta.path.clone(), line_no)),
            );
            if out.len() >= self.max_matches {
                tracing::debug!(
                    rule_id = %self.rule_id,
                    path = %meta.path,
                    max_matches = self.max_matches,
                    "match cap reached"
                );
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })?;

        Ok(out)
    }
}
