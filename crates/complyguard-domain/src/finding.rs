use complyguard_types::{FindingStatus, Location, ids};
use std::cmp::Ordering;

/// Marker appended to evidence cut at the byte cap.
const TRUNCATED_MARKER: &str = "…[truncated]";

/// One evaluator outcome for one rule, at an optional location. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Finding {
    pub rule_id: String,
    pub code: String,
    pub status: FindingStatus,
    pub message: String,
    pub evidence: Option<String>,
    pub location: Option<Location>,
}

impl Finding {
    pub fn new(
        rule_id: impl Into<String>,
        code: &str,
        status: FindingStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            code: code.to_string(),
            status,
            message: message.into(),
            evidence: None,
            location: None,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// The (rule, location) pair could not be evaluated.
    pub fn evaluator_error(
        rule_id: &str,
        location: Option<Location>,
        message: impl Into<String>,
    ) -> Self {
        Finding::new(
            rule_id,
            ids::CODE_EVALUATOR_ERROR,
            FindingStatus::Error,
            message,
        )
        .with_location(location)
    }

    /// The (rule, location) pair was not evaluated before the scan stopped.
    pub fn scan_timeout(rule_id: &str, location: Option<Location>) -> Self {
        Finding::new(
            rule_id,
            ids::CODE_SCAN_TIMEOUT,
            FindingStatus::Skipped,
            "not evaluated: scan stopped before this check ran",
        )
        .with_location(location)
    }

    /// Identity used for deduplication: `(ruleId, location, status)`.
    pub(crate) fn dedup_key(&self) -> (String, LocationKey, FindingStatus) {
        (
            self.rule_id.clone(),
            LocationKey(self.location.clone()),
            self.status,
        )
    }
}

/// `Location` ordering with location-less findings sorted after located ones.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct LocationKey(pub(crate) Option<Location>);

impl Ord for LocationKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl PartialOrd for LocationKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order: `(ruleId, location, status, code, message, evidence)`.
impl Ord for Finding {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rule_id
            .cmp(&other.rule_id)
            .then_with(|| {
                LocationKey(self.location.clone()).cmp(&LocationKey(other.location.clone()))
            })
            .then(self.status.cmp(&other.status))
            .then_with(|| self.code.cmp(&other.code))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.evidence.cmp(&other.evidence))
    }
}

impl PartialOrd for Finding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cut `text` to at most `max_bytes` on a char boundary, marking the cut.
pub fn truncate_evidence(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &text[..end], TRUNCATED_MARKER)
}
