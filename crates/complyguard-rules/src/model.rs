use crate::RuleError;
use complyguard_types::{Severity, ids};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// The fixed set of evaluator kinds a rule may reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EvaluatorKind {
    PatternMatch,
    PresenceCheck,
    ExternalTool,
    MetadataCheck,
}

impl EvaluatorKind {
    pub const ALL: [EvaluatorKind; 4] = [
        EvaluatorKind::PatternMatch,
        EvaluatorKind::PresenceCheck,
        EvaluatorKind::ExternalTool,
        EvaluatorKind::MetadataCheck,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EvaluatorKind::PatternMatch => ids::KIND_PATTERN_MATCH,
            EvaluatorKind::PresenceCheck => ids::KIND_PRESENCE_CHECK,
            EvaluatorKind::ExternalTool => ids::KIND_EXTERNAL_TOOL,
            EvaluatorKind::MetadataCheck => ids::KIND_METADATA_CHECK,
        }
    }

    /// Accepts the kebab-case id plus the snake_case spelling.
    pub fn parse(v: &str) -> Option<EvaluatorKind> {
        match v.replace('_', "-").as_str() {
            ids::KIND_PATTERN_MATCH => Some(EvaluatorKind::PatternMatch),
            ids::KIND_PRESENCE_CHECK => Some(EvaluatorKind::PresenceCheck),
            ids::KIND_EXTERNAL_TOOL => Some(EvaluatorKind::ExternalTool),
            ids::KIND_METADATA_CHECK => Some(EvaluatorKind::MetadataCheck),
            _ => None,
        }
    }
}

impl std::fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque evaluator parameters. Interpretation belongs to the evaluator; see [`Params::reader`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    pub fn new(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    /// Typed accessors that report errors against `rule_id`.
    pub fn reader<'a>(&'a self, rule_id: &'a str) -> ParamReader<'a> {
        ParamReader {
            rule_id,
            params: self,
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Params(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

pub struct ParamReader<'a> {
    rule_id: &'a str,
    params: &'a Params,
}

impl<'a> ParamReader<'a> {
    fn invalid(&self, reason: String) -> RuleError {
        RuleError::invalid_params(self.rule_id, reason)
    }

    pub fn str(&self, key: &str) -> Result<Option<&'a str>, RuleError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.invalid(format!("`{key}` must be a string, got {other}"))),
        }
    }

    pub fn require_str(&self, key: &str) -> Result<&'a str, RuleError> {
        match self.str(key)? {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(self.invalid(format!("`{key}` is required"))),
        }
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>, RuleError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.invalid(format!("`{key}` must be a boolean, got {other}"))),
        }
    }

    pub fn u64(&self, key: &str) -> Result<Option<u64>, RuleError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| {
                self.invalid(format!("`{key}` must be a non-negative integer, got {v}"))
            }),
        }
    }

    /// A single string is accepted as a one-element list.
    pub fn str_list(&self, key: &str) -> Result<Vec<String>, RuleError> {
        match self.params.get(key) {
            None => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        self.invalid(format!("`{key}` must contain only strings, got {item}"))
                    })
                })
                .collect(),
            Some(other) => Err(self.invalid(format!(
                "`{key}` must be a string or list of strings, got {other}"
            ))),
        }
    }

    pub fn i64_list(&self, key: &str) -> Result<Option<Vec<i64>>, RuleError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_i64().ok_or_else(|| {
                        self.invalid(format!("`{key}` must contain only integers, got {item}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(other) => Err(self.invalid(format!(
                "`{key}` must be a list of integers, got {other}"
            ))),
        }
    }

    pub fn value(&self, key: &str) -> Option<&'a Value> {
        self.params.get(key)
    }

    /// Rejects keys the evaluator does not understand, so typos fail at load time.
    pub fn deny_unknown(&self, known: &[&str]) -> Result<(), RuleError> {
        for key in self.params.keys() {
            if !known.contains(&key) {
                return Err(self.invalid(format!(
                    "unknown parameter `{key}` (expected one of: {})",
                    known.join(", ")
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    pub id: String,
    pub framework: String,
    pub control: String,
    pub name: String,
    pub severity: Severity,
    pub evaluator: EvaluatorKind,
    pub params: Params,
    pub remediation: Option<String>,
}

/// An ordered collection of rules.
///
/// Sets returned by [`crate::load`] are already validated; [`RuleSet::from_rules`] does not
/// validate, pair it with [`crate::validate`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Distinct frameworks, sorted.
    pub fn frameworks(&self) -> Vec<String> {
        self.rules
            .iter()
            .map(|r| r.framework.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
