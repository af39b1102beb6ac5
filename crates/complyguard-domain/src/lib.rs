//! Evaluation core: the evaluator contract, the built-in evaluators, and the reduction of
//! findings into a resolved verdict.
//!
//! Input: a validated rule set plus source units supplied by a walker.
//! Output: findings, aggregated and resolved against the rule catalog.
//!
//! This crate never walks a filesystem and never spawns processes; those live in
//! `complyguard-scan` and `complyguard-tools`.

#![forbid(unsafe_code)]

mod aggregate;
mod cancel;
mod catalog;
mod eval;
mod finding;
mod fingerprint;
mod registry;
mod resolve;
mod unit;

pub mod checks;

#[cfg(test)]
mod properties;
#[cfg(test)]
mod test_support;

pub use aggregate::FindingSet;
pub use cancel::CancelToken;
pub use catalog::{RuleCatalog, RuleInfo};
pub use checks::PresenceState;
pub use eval::{
    CompiledCheck, EvalContext, EvalError, EvaluatorFactory, Limits, ProbeCheck, ProbeOutcome,
    TreeCheck, UnitCheck,
};
pub use finding::{Finding, truncate_evidence};
pub use fingerprint::fingerprint_for_finding;
pub use registry::{EvaluatorRegistry, PlannedCheck, ScanPlan};
pub use resolve::{Resolution, findings_from_report, resolve};
pub use unit::{BINARY_SNIFF_BYTES, MemoryUnit, SourceUnit, UnitMeta, looks_binary};
