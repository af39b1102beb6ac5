use crate::{
    CancelToken, CompiledCheck, EvalContext, EvaluatorRegistry, Finding, Limits, RuleCatalog,
    RuleInfo,
};
use camino::Utf8Path;
use complyguard_rules::{EvaluatorKind, Params, Rule};
use complyguard_types::{FindingStatus, Location, RepoPath, Severity, ids};
use serde_json::Value;

pub fn rule(id: &str, kind: EvaluatorKind, severity: Severity, params: Value) -> Rule {
    let params: Params = match params {
        Value::Object(map) => map.into_iter().collect(),
        _ => Params::default(),
    };
    Rule {
        id: id.to_string(),
        framework: "SOC2".to_string(),
        control: "CC6.1".to_string(),
        name: format!("rule {id}"),
        severity,
        evaluator: kind,
        params,
        remediation: Some(format!("fix {id}")),
    }
}

pub fn compile(rule: &Rule) -> CompiledCheck {
    compile_with(rule, Limits::default())
}

pub fn compile_with(rule: &Rule, limits: Limits) -> CompiledCheck {
    let set = complyguard_rules::RuleSet::from_rules(vec![rule.clone()]);
    EvaluatorRegistry::builtin(limits)
        .compile(&set)
        .expect("rule compiles")
        .into_checks()
        .into_iter()
        .next()
        .expect("one check")
        .check
}

pub fn catalog(rules: &[(&str, Severity)]) -> RuleCatalog {
    let mut cat = RuleCatalog::default();
    for (id, severity) in rules {
        cat.insert(RuleInfo {
            id: id.to_string(),
            name: format!("rule {id}"),
            framework: "SOC2".to_string(),
            control: "CC6.1".to_string(),
            severity: *severity,
            remediation: Some(format!("fix {id}")),
        });
    }
    cat
}

pub fn failed_at(rule_id: &str, path: &str, line: u32) -> Finding {
    Finding::new(
        rule_id,
        ids::CODE_PATTERN_MATCHED,
        FindingStatus::Failed,
        "pattern matched",
    )
    .at(Location::line(RepoPath::new(path), line))
}

pub fn with_ctx<R>(metadata: &Value, f: impl FnOnce(&EvalContext<'_>) -> R) -> R {
    let cancel = CancelToken::new();
    let ctx = EvalContext {
        root: Utf8Path::new("."),
        metadata,
        cancel: &cancel,
    };
    f(&ctx)
}
