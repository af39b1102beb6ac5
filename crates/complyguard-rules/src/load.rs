use crate::model::{EvaluatorKind, Params, Rule, RuleSet};
use crate::RuleError;
use camino::Utf8Path;
use complyguard_types::Severity;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Optional schema string rule-set documents may declare.
pub const SCHEMA_RULES_V1: &str = "complyguard.rules.v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleFormat {
    Toml,
    Json,
}

impl RuleFormat {
    /// `.json` is JSON; everything else is treated as TOML.
    pub fn from_path(path: &Utf8Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("json") => RuleFormat::Json,
            _ => RuleFormat::Toml,
        }
    }
}

/// `rules.toml` document shape. Fields are loose here and tightened in [`parse`].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSetDoc {
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    rules: Vec<RuleDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDoc {
    id: Option<String>,
    framework: Option<String>,
    control: Option<String>,
    name: Option<String>,
    severity: Option<String>,
    evaluator: Option<String>,
    #[serde(default)]
    params: BTreeMap<String, Value>,
    #[serde(default)]
    remediation: Option<String>,
}

/// Parse a rule-set document into typed rules without checking registry-dependent invariants.
///
/// Fails on the first syntax, missing-field, severity, or evaluator-kind error.
pub fn parse(text: &str, format: RuleFormat) -> Result<RuleSet, RuleError> {
    let doc: RuleSetDoc = match format {
        RuleFormat::Toml => toml::from_str(text).map_err(|e| RuleError::MalformedRuleSet {
            reason: e.to_string().trim_end().to_string(),
        })?,
        RuleFormat::Json => serde_json::from_str(text).map_err(|e| RuleError::MalformedRuleSet {
            reason: e.to_string(),
        })?,
    };

    if let Some(schema) = doc.schema.as_deref()
        && schema != SCHEMA_RULES_V1
    {
        return Err(RuleError::UnsupportedSchema {
            schema: schema.to_string(),
        });
    }

    let rules = doc
        .rules
        .into_iter()
        .enumerate()
        .map(|(index, raw)| rule_from_doc(index, raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RuleSet::from_rules(rules))
}

fn rule_from_doc(index: usize, raw: RuleDoc) -> Result<Rule, RuleError> {
    let required = |v: Option<String>, field: &'static str| -> Result<String, RuleError> {
        match v {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(RuleError::MissingField { index, field }),
        }
    };

    let id = required(raw.id, "id")?;
    let framework = required(raw.framework, "framework")?;
    let control = required(raw.control, "control")?;
    let name = required(raw.name, "name")?;
    let severity_s = required(raw.severity, "severity")?;
    let evaluator_s = required(raw.evaluator, "evaluator")?;

    let severity = Severity::parse(&severity_s).ok_or_else(|| RuleError::InvalidSeverity {
        rule_id: id.clone(),
        value: severity_s.clone(),
    })?;
    let evaluator =
        EvaluatorKind::parse(&evaluator_s).ok_or_else(|| RuleError::UnknownEvaluatorKind {
            rule_id: id.clone(),
            kind: evaluator_s.clone(),
        })?;

    Ok(Rule {
        id,
        framework,
        control,
        name,
        severity,
        evaluator,
        params: Params::new(raw.params),
        remediation: raw.remediation.filter(|r| !r.trim().is_empty()),
    })
}

/// Check referential integrity of a rule set. Pure: no side effects, errors in document order.
pub fn validate(rules: &RuleSet, registered: &BTreeSet<EvaluatorKind>) -> Vec<RuleError> {
    let mut errors = Vec::new();
    let mut seen: BTreeSet<&str> = BTreeSet::new();

    for (index, rule) in rules.iter().enumerate() {
        if rule.id.trim().is_empty() {
            errors.push(RuleError::MissingField { index, field: "id" });
        } else if !seen.insert(rule.id.as_str()) {
            errors.push(RuleError::DuplicateRuleId {
                id: rule.id.clone(),
            });
        }
        if rule.name.trim().is_empty() {
            errors.push(RuleError::MissingField {
                index,
                field: "name",
            });
        }
        if !registered.contains(&rule.evaluator) {
            errors.push(RuleError::UnknownEvaluatorKind {
                rule_id: rule.id.clone(),
                kind: rule.evaluator.as_str().to_string(),
            });
        }
    }

    errors
}

/// Parse and validate a rule-set document. Whole-document, fail-fast: either every rule is
/// valid and the full set is returned, or the first error is.
pub fn load(
    text: &str,
    format: RuleFormat,
    registered: &BTreeSet<EvaluatorKind>,
) -> Result<RuleSet, RuleError> {
    let rules = parse(text, format)?;
    if let Some(first) = validate(&rules, registered).into_iter().next() {
        return Err(first);
    }
    Ok(rules)
}
