use crate::{CompiledCheck, EvalContext, EvalError, EvaluatorFactory, Finding, TreeCheck};
use complyguard_rules::{EvaluatorKind, Rule, RuleError};
use complyguard_types::{FindingStatus, ids};
use serde_json::Value;

const PARAMS: &[&str] = &["key", "equals", "min", "present"];

pub struct MetadataFactory;

impl EvaluatorFactory for MetadataFactory {
    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::MetadataCheck
    }

    fn compile(&self, rule: &Rule) -> Result<CompiledCheck, RuleError> {
        let p = rule.params.reader(&rule.id);
        p.deny_unknown(PARAMS)?;
        let key = p.require_str("key")?.to_string();

        let mut expectations = Vec::new();
        if let Some(v) = p.value("equals") {
            expectations.push(Expect::Equals(v.clone()));
        }
        if let Some(v) = p.value("min") {
            let min = v.as_f64().ok_or_else(|| {
                RuleError::invalid_params(&rule.id, format!("`min` must be a number, got {v}"))
            })?;
            expectations.push(Expect::Min(min));
        }
        if let Some(present) = p.bool("present")? {
            expectations.push(Expect::Present(present));
        }

        let expect = match expectations.len() {
            1 => expectations.remove(0),
            0 => {
                return Err(RuleError::invalid_params(
                    &rule.id,
                    "one of `equals`, `min`, `present` is required",
                ));
            }
            _ => {
                return Err(RuleError::invalid_params(
                    &rule.id,
                    "`equals`, `min`, and `present` are mutually exclusive",
                ));
            }
        };

        Ok(CompiledCheck::Tree(Box::new(MetadataCheck {
            rule_id: rule.id.clone(),
            key,
            expect,
        })))
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Expect {
    Equals(Value),
    Min(f64),
    Present(bool),
}

/// Compares one caller-supplied metadata value against an expectation.
pub struct MetadataCheck {
    rule_id: String,
    key: String,
    expect: Expect,
}

impl MetadataCheck {
    fn missing(&self, why: &str) -> Finding {
        Finding::new(
            self.rule_id.as_str(),
            ids::CODE_METADATA_MISSING,
            FindingStatus::Skipped,
            format!("metadata `{}` not available: {why}", self.key),
        )
    }

    fn outcome(&self, ok: bool, evidence: String) -> Finding {
        let (code, status, message) = if ok {
            (
                ids::CODE_METADATA_SATISFIED,
                FindingStatus::Passed,
                format!("metadata `{}` satisfies the control", self.key),
            )
        } else {
            (
                ids::CODE_METADATA_MISMATCH,
                FindingStatus::Failed,
                format!("metadata `{}` does not satisfy the control", self.key),
            )
        };
        Finding::new(self.rule_id.as_str(), code, status, message).with_evidence(evidence)
    }
}

impl TreeCheck for MetadataCheck {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Vec<Finding>, EvalError> {
        if ctx.metadata.is_null() {
            return Ok(vec![self.missing("no metadata document supplied")]);
        }
        let value = lookup(ctx.metadata, &self.key);

        let finding = match (&self.expect, value) {
            (Expect::Present(want), v) => {
                let has = v.is_some_and(|v| !v.is_null());
                self.outcome(
                    has == *want,
                    format!("present = {has}, expected {want}"),
                )
            }
            (_, None) => self.missing("key not found"),
            (Expect::Equals(expected), Some(actual)) => self.outcome(
                actual == expected,
                format!("{} = {actual}, expected {expected}", self.key),
            ),
            (Expect::Min(min), Some(actual)) => self.outcome(
                actual.as_f64().is_some_and(|n| n >= *min),
                format!("{} = {actual}, expected at least {min}", self.key),
            ),
        };
        Ok(vec![finding])
    }
}

/// Dotted-path lookup; numeric segments index into arrays.
fn lookup<'a>(doc: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(doc, |cur, seg| match cur {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let doc = json!({ "a": { "b": [ { "c": 3 } ] } });
        assert_eq!(lookup(&doc, "a.b.0.c"), Some(&json!(3)));
        assert_eq!(lookup(&doc, "a.x"), None);
        assert_eq!(lookup(&doc, "a.b.7"), None);
    }
}
