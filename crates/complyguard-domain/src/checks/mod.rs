//! Built-in evaluators. Each module compiles one evaluator kind from a rule's parameters.

use complyguard_rules::RuleError;
use regex::{Regex, RegexBuilder};

mod lines;
mod metadata;
mod pattern;
mod presence;
mod scope;

pub use metadata::MetadataFactory;
pub use pattern::PatternFactory;
pub use presence::{PresenceFactory, PresenceState};
pub use scope::PathScope;

pub(crate) use lines::scan_lines;

fn compile_regex(rule_id: &str, pattern: &str, case_insensitive: bool) -> Result<Regex, RuleError> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| RuleError::invalid_params(rule_id, format!("`pattern` is not a valid regex: {e}")))
}
