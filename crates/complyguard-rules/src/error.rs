use thiserror::Error;

/// Configuration errors. Any of these aborts a scan before evaluation starts.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("malformed rule set: {reason}")]
    MalformedRuleSet { reason: String },

    #[error("unsupported rule-set schema: {schema}")]
    UnsupportedSchema { schema: String },

    #[error("rule #{index}: missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("rule {rule_id}: invalid severity '{value}' (expected critical|high|medium|low|info)")]
    InvalidSeverity { rule_id: String, value: String },

    #[error("rule {rule_id}: unknown evaluator kind '{kind}'")]
    UnknownEvaluatorKind { rule_id: String, kind: String },

    #[error("duplicate rule id: {id}")]
    DuplicateRuleId { id: String },

    #[error("rule {rule_id}: invalid parameters: {reason}")]
    InvalidParameters { rule_id: String, reason: String },

    #[error("unknown preset: {name}")]
    UnknownPreset { name: String },
}

impl RuleError {
    pub fn invalid_params(rule_id: &str, reason: impl Into<String>) -> Self {
        RuleError::InvalidParameters {
            rule_id: rule_id.to_string(),
            reason: reason.into(),
        }
    }
}
