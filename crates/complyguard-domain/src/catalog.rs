use complyguard_rules::{Rule, RuleSet};
use complyguard_types::{ReportFinding, Severity};
use std::collections::BTreeMap;

/// The report-facing description of a rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleInfo {
    pub id: String,
    pub name: String,
    pub framework: String,
    pub control: String,
    pub severity: Severity,
    pub remediation: Option<String>,
}

impl From<&Rule> for RuleInfo {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            framework: rule.framework.clone(),
            control: rule.control.clone(),
            severity: rule.severity,
            remediation: rule.remediation.clone(),
        }
    }
}

/// Rules known to a scan, keyed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleCatalog {
    rules: BTreeMap<String, RuleInfo>,
}

impl RuleCatalog {
    pub fn from_rule_set(set: &RuleSet) -> Self {
        Self {
            rules: set
                .iter()
                .map(|r| (r.id.clone(), RuleInfo::from(r)))
                .collect(),
        }
    }

    /// Rebuild the catalog from emitted report rows (used when merging shard reports).
    pub fn from_report_findings<'a, I>(findings: I) -> Self
    where
        I: IntoIterator<Item = &'a ReportFinding>,
    {
        let mut rules = BTreeMap::new();
        for f in findings {
            let info = rules.entry(f.rule_id.clone()).or_insert_with(|| RuleInfo {
                id: f.rule_id.clone(),
                name: f.rule_name.clone(),
                framework: f.framework.clone(),
                control: f.control.clone(),
                severity: f.severity,
                remediation: None,
            });
            // Passing rows carry no remediation; take it from whichever row has it.
            if info.remediation.is_none() {
                info.remediation = f.remediation.clone();
            }
        }
        Self { rules }
    }

    pub fn insert(&mut self, info: RuleInfo) {
        self.rules.insert(info.id.clone(), info);
    }

    pub fn get(&self, id: &str) -> Option<&RuleInfo> {
        self.rules.get(id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in id order.
    pub fn iter(&self) -> impl Iterator<Item = &RuleInfo> {
        self.rules.values()
    }

    /// Distinct frameworks, sorted.
    pub fn frameworks(&self) -> Vec<String> {
        let mut out: Vec<String> = self.rules.values().map(|r| r.framework.clone()).collect();
        out.sort();
        out.dedup();
        out
    }
}
