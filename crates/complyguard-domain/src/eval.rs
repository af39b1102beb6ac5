use crate::{CancelToken, Finding, PresenceState, SourceUnit, UnitMeta};
use camino::Utf8Path;
use complyguard_rules::{EvaluatorKind, Rule, RuleError};
use complyguard_types::Coverage;
use serde_json::Value;
use thiserror::Error;

/// Per-unit resource caps shared by the built-in evaluators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Units larger than this are not scanned by pattern rules.
    pub max_file_bytes: u64,
    /// Evidence strings are cut to this many bytes.
    pub max_evidence_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
            max_evidence_bytes: 1024,
        }
    }
}

/// Read-only state every evaluator sees during a scan.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    /// Absolute scan root. Tree evaluators run here.
    pub root: &'a Utf8Path,
    /// Caller-supplied repository metadata (`Value::Null` when none was given).
    pub metadata: &'a Value,
    pub cancel: &'a CancelToken,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

impl EvalError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        EvalError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Independent per-unit evaluation (pattern-match).
pub trait UnitCheck: Send + Sync {
    fn applies_to(&self, unit: &UnitMeta) -> bool;

    fn evaluate(
        &self,
        unit: &dyn SourceUnit,
        ctx: &EvalContext<'_>,
    ) -> Result<Vec<Finding>, EvalError>;
}

/// What one probe saw in one unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    Hit,
    Miss,
    /// No marker in the part that was read; the unit is larger than the read limit.
    Truncated,
}

/// Two-phase evaluation: probe every applicable unit, conclude once after all probes.
///
/// The scan records probe outcomes into a [`PresenceState`]; `finalize` reads only that state,
/// so its outcome is independent of worker count and probe order.
pub trait ProbeCheck: Send + Sync {
    fn applies_to(&self, unit: &UnitMeta) -> bool;

    fn probe(
        &self,
        unit: &dyn SourceUnit,
        ctx: &EvalContext<'_>,
    ) -> Result<ProbeOutcome, EvalError>;

    fn finalize(&self, state: &PresenceState, coverage: &Coverage) -> Vec<Finding>;
}

/// Whole-tree evaluation, run once per scan (external tools, metadata).
pub trait TreeCheck: Send + Sync {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Vec<Finding>, EvalError>;
}

/// A rule compiled into one of the three evaluation shapes.
pub enum CompiledCheck {
    Unit(Box<dyn UnitCheck>),
    Probe(Box<dyn ProbeCheck>),
    Tree(Box<dyn TreeCheck>),
}

impl std::fmt::Debug for CompiledCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompiledCheck::Unit(_) => f.write_str("CompiledCheck::Unit"),
            CompiledCheck::Probe(_) => f.write_str("CompiledCheck::Probe"),
            CompiledCheck::Tree(_) => f.write_str("CompiledCheck::Tree"),
        }
    }
}

/// Compiles rules of one evaluator kind. Parameters are validated here, once per rule.
pub trait EvaluatorFactory: Send + Sync {
    fn kind(&self) -> EvaluatorKind;

    fn compile(&self, rule: &Rule) -> Result<CompiledCheck, RuleError>;
}
