//! Rule model and rule-set registry.
//!
//! This crate is IO-free: it parses and validates rule-set documents provided as strings.
//! Whether a rule's evaluator kind is usable is decided by the caller, which passes the set
//! of kinds it has registered.

#![forbid(unsafe_code)]

mod error;
mod load;
mod model;
mod presets;

pub use error::RuleError;
pub use load::{RuleFormat, SCHEMA_RULES_V1, load, parse, validate};
pub use model::{EvaluatorKind, ParamReader, Params, Rule, RuleSet};
pub use presets::{load_preset, preset, preset_names};
