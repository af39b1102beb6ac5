//! Rule-set sources and the `validate` use case.

use anyhow::Context;
use camino::Utf8PathBuf;
use complyguard_domain::{EvaluatorRegistry, Limits};
use complyguard_rules::{RuleError, RuleFormat, RuleSet};
use complyguard_tools::ExternalToolFactory;

const PRESET_PREFIX: &str = "preset:";

/// Where a rule set comes from: a file, or a built-in preset (`preset:NAME`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleSource {
    Path(Utf8PathBuf),
    Preset(String),
}

impl RuleSource {
    pub fn parse(v: &str) -> Self {
        match v.strip_prefix(PRESET_PREFIX) {
            Some(name) => RuleSource::Preset(name.to_string()),
            None => RuleSource::Path(Utf8PathBuf::from(v)),
        }
    }

    fn read(&self) -> anyhow::Result<(String, RuleFormat)> {
        match self {
            RuleSource::Path(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("read rule set {path}"))?;
                Ok((text, RuleFormat::from_path(path)))
            }
            RuleSource::Preset(name) => Ok((preset_text(name)?.to_string(), RuleFormat::Toml)),
        }
    }
}

impl std::fmt::Display for RuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleSource::Path(path) => write!(f, "{path}"),
            RuleSource::Preset(name) => write!(f, "{PRESET_PREFIX}{name}"),
        }
    }
}

/// Built-in evaluators plus the external-tool adapter.
pub fn evaluator_registry(limits: Limits) -> EvaluatorRegistry {
    EvaluatorRegistry::builtin(limits).with(Box::new(ExternalToolFactory::new(limits)))
}

/// The text of a built-in preset.
pub fn preset_text(name: &str) -> anyhow::Result<&'static str> {
    complyguard_rules::preset(name).ok_or_else(|| {
        anyhow::anyhow!(
            "{} (available: {})",
            RuleError::UnknownPreset {
                name: name.to_string()
            },
            complyguard_rules::preset_names().join(", ")
        )
    })
}

/// Load and validate a rule set against the registry's kinds. Fail-fast.
pub fn load_rules(source: &RuleSource, registry: &EvaluatorRegistry) -> anyhow::Result<RuleSet> {
    let (text, format) = source.read()?;
    let rules = complyguard_rules::load(&text, format, &registry.kinds())
        .with_context(|| format!("load rule set {source}"))?;
    tracing::debug!(rules = rules.len(), source = %source, "rule set loaded");
    Ok(rules)
}

#[derive(Clone, Debug)]
pub struct ValidateOutput {
    /// Rules in the document (0 when it did not parse).
    pub rules: usize,
    /// Every problem found, in document order. Empty means the set is valid.
    pub errors: Vec<RuleError>,
}

impl ValidateOutput {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse, validate, and compile a rule set without scanning.
///
/// Unlike [`load_rules`], every referential error is reported, not just the first. An
/// unreadable source is an `Err`; an invalid document is reported in the output.
pub fn run_validate(source: &RuleSource) -> anyhow::Result<ValidateOutput> {
    let (text, format) = source.read()?;
    let registry = evaluator_registry(Limits::default());

    let rules = match complyguard_rules::parse(&text, format) {
        Ok(rules) => rules,
        Err(e) => {
            return Ok(ValidateOutput {
                rules: 0,
                errors: vec![e],
            });
        }
    };

    let mut errors = complyguard_rules::validate(&rules, &registry.kinds());
    if errors.is_empty()
        && let Err(e) = registry.compile(&rules)
    {
        errors.push(e);
    }

    Ok(ValidateOutput {
        rules: rules.len(),
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_distinguishes_presets_and_paths() {
        assert_eq!(
            RuleSource::parse("preset:baseline"),
            RuleSource::Preset("baseline".to_string())
        );
        assert_eq!(
            RuleSource::parse("policy/rules.toml"),
            RuleSource::Path(Utf8PathBuf::from("policy/rules.toml"))
        );
        assert_eq!(RuleSource::parse("preset:baseline").to_string(), "preset:baseline");
    }

    #[test]
    fn baseline_preset_loads_with_full_registry() {
        let registry = evaluator_registry(Limits::default());
        let rules = load_rules(&RuleSource::Preset("baseline".to_string()), &registry)
            .expect("baseline");
        assert_eq!(rules.len(), 6);
    }

    #[test]
    fn unknown_preset_lists_available() {
        let err = preset_text("strict").unwrap_err();
        assert_eq!(err.to_string(), "unknown preset: strict (available: baseline)");
    }

    #[test]
    fn validate_reports_every_error() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(tmp.path().join("rules.toml")).expect("utf8");
        let rule = |id: &str, kind: &str| {
            format!(
                "[[rules]]\nid = \"{id}\"\nframework = \"SOC2\"\ncontrol = \"C\"\nname = \"n\"\nseverity = \"low\"\nevaluator = \"{kind}\"\n[rules.params]\npattern = \"x\"\n\n"
            )
        };
        let text = format!(
            "{}{}{}",
            rule("A", "pattern-match"),
            rule("A", "pattern-match"),
            rule("B", "presence-check")
        );
        std::fs::write(&path, text).expect("write");

        let out = run_validate(&RuleSource::Path(path)).expect("validate");
        assert_eq!(out.rules, 3);
        assert_eq!(
            out.errors,
            vec![RuleError::DuplicateRuleId {
                id: "A".to_string()
            }]
        );
        assert!(!out.is_valid());
    }

    #[test]
    fn validate_compiles_params() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(tmp.path().join("rules.json")).expect("utf8");
        std::fs::write(
            &path,
            r#"{"rules":[{"id":"X","framework":"F","control":"C","name":"n","severity":"low",
                "evaluator":"pattern-match","params":{"pattern":"("}}]}"#,
        )
        .expect("write");

        let out = run_validate(&RuleSource::Path(path)).expect("validate");
        assert!(matches!(out.errors[0], RuleError::InvalidParameters { .. }));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = run_validate(&RuleSource::Path("/nonexistent/rules.toml".into())).unwrap_err();
        assert!(err.to_string().contains("read rule set"));
    }
}
