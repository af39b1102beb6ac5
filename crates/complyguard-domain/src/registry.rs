use crate::checks::{MetadataFactory, PatternFactory, PresenceFactory};
use crate::{CompiledCheck, EvaluatorFactory, Limits, RuleCatalog};
use complyguard_rules::{EvaluatorKind, RuleError, RuleSet, validate};
use std::collections::{BTreeMap, BTreeSet};

/// Fixed mapping from evaluator kind to implementation. Built once at startup.
pub struct EvaluatorRegistry {
    factories: BTreeMap<EvaluatorKind, Box<dyn EvaluatorFactory>>,
}

impl EvaluatorRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Pattern-match, presence-check, and metadata-check.
    pub fn builtin(limits: Limits) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(PatternFactory::new(limits)));
        registry.register(Box::new(PresenceFactory::new(limits)));
        registry.register(Box::new(MetadataFactory));
        registry
    }

    /// Registers (or replaces) the factory for its kind.
    pub fn register(&mut self, factory: Box<dyn EvaluatorFactory>) {
        self.factories.insert(factory.kind(), factory);
    }

    pub fn with(mut self, factory: Box<dyn EvaluatorFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn kinds(&self) -> BTreeSet<EvaluatorKind> {
        self.factories.keys().copied().collect()
    }

    /// Validate the rule set against the registered kinds, then compile every rule once.
    ///
    /// All-or-nothing: the first invalid rule aborts compilation.
    pub fn compile(&self, rules: &RuleSet) -> Result<ScanPlan, RuleError> {
        if let Some(first) = validate(rules, &self.kinds()).into_iter().next() {
            return Err(first);
        }

        let mut checks = Vec::with_capacity(rules.len());
        for rule in rules {
            let factory =
                self.factories
                    .get(&rule.evaluator)
                    .ok_or_else(|| RuleError::UnknownEvaluatorKind {
                        rule_id: rule.id.clone(),
                        kind: rule.evaluator.as_str().to_string(),
                    })?;
            checks.push(PlannedCheck {
                rule_id: rule.id.clone(),
                kind: rule.evaluator,
                check: factory.compile(rule)?,
            });
        }

        Ok(ScanPlan {
            catalog: RuleCatalog::from_rule_set(rules),
            checks,
        })
    }
}

#[derive(Debug)]
pub struct PlannedCheck {
    pub rule_id: String,
    pub kind: EvaluatorKind,
    pub check: CompiledCheck,
}

/// Compiled, immutable rule set ready to be scanned. Shared read-only by all workers.
#[derive(Debug)]
pub struct ScanPlan {
    catalog: RuleCatalog,
    checks: Vec<PlannedCheck>,
}

impl ScanPlan {
    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn checks(&self) -> &[PlannedCheck] {
        &self.checks
    }

    pub fn into_checks(self) -> Vec<PlannedCheck> {
        self.checks
    }

    pub fn has_unit_work(&self) -> bool {
        self.checks
            .iter()
            .any(|c| !matches!(c.check, CompiledCheck::Tree(_)))
    }
}
