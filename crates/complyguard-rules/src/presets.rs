use crate::load::{RuleFormat, load};
use crate::model::{EvaluatorKind, RuleSet};
use crate::RuleError;
use std::collections::BTreeSet;

const BASELINE: &str = include_str!("../presets/baseline.toml");

/// Built-in rule sets, by name. Presets are plain rule-set documents and go through the
/// same loader as user files.
pub fn preset(name: &str) -> Option<&'static str> {
    match name {
        "baseline" => Some(BASELINE),
        _ => None,
    }
}

pub fn preset_names() -> &'static [&'static str] {
    &["baseline"]
}

pub fn load_preset(
    name: &str,
    registered: &BTreeSet<EvaluatorKind>,
) -> Result<RuleSet, RuleError> {
    let text = preset(name).ok_or_else(|| RuleError::UnknownPreset {
        name: name.to_string(),
    })?;
    load(text, RuleFormat::Toml, registered)
}
