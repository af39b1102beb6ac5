use camino::Utf8PathBuf;
use complyguard_domain::{
    CancelToken, CompiledCheck, EvalContext, EvalError, EvaluatorFactory, EvaluatorRegistry,
    Finding, Limits, MemoryUnit, ScanPlan, SourceUnit, UnitCheck, UnitMeta, resolve,
};
use complyguard_rules::{EvaluatorKind, Rule, RuleError, RuleFormat, parse};
use complyguard_scan::{FsWalker, ScanOptions, UnitResult, WalkError, scan};
use complyguard_tools::ExternalToolFactory;
use complyguard_types::{FindingStatus, Location, RepoPath, ids};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const SECRETS_AND_LOGGING: &str = r#"
[[rules]]
id = "AC-001"
framework = "SOC2"
control = "CC6.1"
name = "No hardcoded credentials"
severity = "critical"
evaluator = "pattern-match"
[rules.params]
pattern = '''password\s*=\s*["'][^"']+["']'''
include = ["*.py"]
case_insensitive = true

[[rules]]
id = "MO-001"
framework = "SOC2"
control = "CC7.2"
name = "Audit logging enabled"
severity = "high"
evaluator = "presence-check"
[rules.params]
pattern = '''import\s+logging'''
include = ["*.py"]
"#;

fn registry() -> EvaluatorRegistry {
    EvaluatorRegistry::builtin(Limits::default())
        .with(Box::new(ExternalToolFactory::new(Limits::default())))
}

fn plan(text: &str) -> ScanPlan {
    registry()
        .compile(&parse(text, RuleFormat::Toml).expect("parse"))
        .expect("compile")
}

fn units(items: &[(&str, &str)]) -> Vec<UnitResult> {
    items
        .iter()
        .map(|(path, content)| {
            let unit: Arc<dyn SourceUnit> = Arc::new(MemoryUnit::new(path, *content));
            Ok(unit)
        })
        .collect()
}

fn options(concurrency: usize) -> ScanOptions {
    ScanOptions::new(".").with_concurrency(concurrency)
}

fn by_rule<'a>(findings: &'a [Finding], rule_id: &str) -> Vec<&'a Finding> {
    findings.iter().filter(|f| f.rule_id == rule_id).collect()
}

#[test]
fn hardcoded_password_is_one_failed_finding() {
    let plan = plan(SECRETS_AND_LOGGING);
    let outcome = scan(
        &plan,
        units(&[
            ("config.py", "import logging\npassword = \"hunter2\"\n"),
            ("app.py", "print('ok')\n"),
        ]),
        &options(2),
        &CancelToken::new(),
    );

    let findings = outcome.findings.into_vec();
    let secrets = by_rule(&findings, "AC-001");
    assert_eq!(secrets.len(), 1);
    assert_eq!(secrets[0].status, FindingStatus::Failed);
    assert_eq!(
        secrets[0].location,
        Some(Location::line(RepoPath::new("config.py"), 2))
    );

    let logging = by_rule(&findings, "MO-001");
    assert_eq!(logging.len(), 1);
    assert_eq!(logging[0].code, ids::CODE_MARKER_FOUND);

    assert!(outcome.coverage.complete);
    assert_eq!(outcome.coverage.units_scanned, 2);
}

#[test]
fn presence_check_is_identical_for_one_and_four_workers() {
    let plan = plan(SECRETS_AND_LOGGING);
    let items: Vec<(String, String)> = (0..10_000)
        .map(|i| {
            let body = if i % 997 == 0 {
                "import logging\n".to_string()
            } else {
                format!("value_{i} = {i}\n")
            };
            (format!("pkg{:02}/mod_{i:05}.py", i % 37), body)
        })
        .collect();
    let make = || -> Vec<UnitResult> {
        items
            .iter()
            .map(|(p, c)| {
                let unit: Arc<dyn SourceUnit> = Arc::new(MemoryUnit::new(p, c.as_str()));
                Ok(unit)
            })
            .collect()
    };

    let one = scan(&plan, make(), &options(1), &CancelToken::new());
    let four = scan(&plan, make(), &options(4), &CancelToken::new());

    assert_eq!(one.findings, four.findings);
    assert_eq!(one.coverage, four.coverage);

    let findings = four.findings.into_vec();
    let logging = by_rule(&findings, "MO-001");
    assert_eq!(logging.len(), 1);
    assert_eq!(
        logging[0].evidence.as_deref(),
        Some("first match: pkg00/mod_00000.py; 11 matching unit(s)")
    );
}

#[test]
fn output_does_not_depend_on_worker_count() {
    let plan = plan(SECRETS_AND_LOGGING);
    let corpus: Vec<(String, String)> = (0..300)
        .map(|i| (format!("f{i:03}.py"), format!("x = 1\npassword = 'p{i}'\n")))
        .collect();
    let make = || -> Vec<UnitResult> {
        corpus
            .iter()
            .map(|(p, c)| {
                let unit: Arc<dyn SourceUnit> = Arc::new(MemoryUnit::new(p, c.as_str()));
                Ok(unit)
            })
            .collect()
    };
    let baseline = scan(&plan, make(), &options(1), &CancelToken::new());
    for workers in [2, 3, 8, 0] {
        let again = scan(&plan, make(), &options(workers), &CancelToken::new());
        assert_eq!(baseline.findings, again.findings, "workers = {workers}");
    }
}

#[test]
fn walk_order_does_not_change_findings() {
    let plan = plan(SECRETS_AND_LOGGING);
    let mut corpus: Vec<(String, String)> = (0..120)
        .map(|i| {
            let body = match i % 3 {
                0 => format!("password = 'p{i}'\n"),
                1 => "from logging import getLogger\nimport logging\n".to_string(),
                _ => "pass\n".to_string(),
            };
            (format!("m{i:03}.py"), body)
        })
        .collect();
    let run = |corpus: &[(String, String)]| {
        let items: Vec<UnitResult> = corpus
            .iter()
            .map(|(p, c)| {
                let unit: Arc<dyn SourceUnit> = Arc::new(MemoryUnit::new(p, c.as_str()));
                Ok(unit)
            })
            .collect();
        scan(&plan, items, &options(4), &CancelToken::new()).findings
    };

    let sorted = run(&corpus);
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..5 {
        corpus.shuffle(&mut rng);
        assert_eq!(run(&corpus), sorted);
    }
}

#[test]
fn cancelled_scan_skips_pending_work_and_marks_coverage_incomplete() {
    let plan = plan(SECRETS_AND_LOGGING);
    let token = CancelToken::new();
    token.cancel();

    let outcome = scan(
        &plan,
        units(&[("config.py", "password = 'abc123'\n")]),
        &options(2),
        &token,
    );
    assert!(!outcome.coverage.complete);
    assert_eq!(outcome.coverage.reason.as_deref(), Some(ids::REASON_CANCELLED));

    let resolution = resolve(plan.catalog(), &outcome.findings, &outcome.coverage);
    for rule_id in ["AC-001", "MO-001"] {
        let rows: Vec<_> = resolution
            .findings
            .iter()
            .filter(|r| r.rule_id == rule_id)
            .collect();
        assert!(!rows.is_empty(), "{rule_id} has no rows");
        assert!(
            rows.iter()
                .all(|r| r.status == FindingStatus::Skipped && r.code == ids::CODE_SCAN_TIMEOUT),
            "{rule_id}: {rows:?}"
        );
    }

    let findings = outcome.findings.into_vec();
    let secrets = by_rule(&findings, "AC-001");
    assert_eq!(
        secrets[0].location,
        Some(Location::file(RepoPath::new("config.py")))
    );
}

/// Takes a fixed time per unit and never reports anything.
struct Slow(Duration);

impl UnitCheck for Slow {
    fn applies_to(&self, _: &UnitMeta) -> bool {
        true
    }

    fn evaluate(&self, _: &dyn SourceUnit, _: &EvalContext<'_>) -> Result<Vec<Finding>, EvalError> {
        std::thread::sleep(self.0);
        Ok(Vec::new())
    }
}

struct SlowFactory;

impl EvaluatorFactory for SlowFactory {
    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::PatternMatch
    }

    fn compile(&self, _: &Rule) -> Result<CompiledCheck, RuleError> {
        Ok(CompiledCheck::Unit(Box::new(Slow(Duration::from_millis(25)))))
    }
}

#[test]
fn deadline_expiring_mid_scan_skips_the_rest() {
    let plan = EvaluatorRegistry::builtin(Limits::default())
        .with(Box::new(SlowFactory))
        .compile(&parse(SECRETS_AND_LOGGING, RuleFormat::Toml).expect("parse"))
        .expect("compile");
    let corpus: Vec<(String, &str)> = (0..400).map(|i| (format!("m{i:03}.py"), "pass\n")).collect();
    let items: Vec<UnitResult> = corpus
        .iter()
        .map(|(p, c)| {
            let unit: Arc<dyn SourceUnit> = Arc::new(MemoryUnit::new(p, *c));
            Ok(unit)
        })
        .collect();

    let started = Instant::now();
    let token = CancelToken::with_timeout(Duration::from_millis(200));
    let outcome = scan(&plan, items, &options(2), &token);
    assert!(started.elapsed() < Duration::from_secs(4));

    assert!(!outcome.coverage.complete);
    assert_eq!(outcome.coverage.reason.as_deref(), Some(ids::REASON_SCAN_TIMEOUT));
    assert!(outcome.coverage.units_scanned < 400);

    let resolution = resolve(plan.catalog(), &outcome.findings, &outcome.coverage);
    assert!(
        resolution
            .findings
            .iter()
            .any(|r| r.rule_id == "AC-001" && r.status == FindingStatus::Skipped)
    );
    let logging: Vec<_> = resolution
        .findings
        .iter()
        .filter(|r| r.rule_id == "MO-001")
        .collect();
    assert!(logging.iter().any(|r| r.location.is_none()));
    assert!(logging.iter().all(|r| r.code == ids::CODE_SCAN_TIMEOUT));
    assert!(
        resolution
            .findings
            .iter()
            .all(|r| r.code != ids::CODE_NO_VIOLATIONS && r.status != FindingStatus::Passed)
    );
}

#[test]
fn walk_errors_are_counted_not_fatal() {
    let plan = plan(SECRETS_AND_LOGGING);
    let mut items = units(&[("a.py", "import logging\n")]);
    items.push(Err(WalkError::NonUtf8 {
        path: "bad\u{fffd}.py".to_string(),
    }));

    let outcome = scan(&plan, items, &options(1), &CancelToken::new());
    assert_eq!(outcome.coverage.walk_errors, 1);
    assert_eq!(outcome.coverage.units_scanned, 1);
    assert!(outcome.coverage.complete);
}

/// Pattern-match stand-in that panics on one path and fails on another.
struct Flaky;

impl UnitCheck for Flaky {
    fn applies_to(&self, _: &UnitMeta) -> bool {
        true
    }

    fn evaluate(&self, unit: &dyn SourceUnit, _: &EvalContext<'_>) -> Result<Vec<Finding>, EvalError> {
        match unit.path().as_str() {
            "boom.py" => panic!("evaluator bug"),
            "io.py" => Err(EvalError::Failed("disk on fire".to_string())),
            _ => Ok(Vec::new()),
        }
    }
}

struct FlakyFactory;

impl EvaluatorFactory for FlakyFactory {
    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::PatternMatch
    }

    fn compile(&self, _: &Rule) -> Result<CompiledCheck, RuleError> {
        Ok(CompiledCheck::Unit(Box::new(Flaky)))
    }
}

#[test]
fn evaluator_panics_and_errors_become_error_findings() {
    let plan = EvaluatorRegistry::builtin(Limits::default())
        .with(Box::new(FlakyFactory))
        .compile(&parse(SECRETS_AND_LOGGING, RuleFormat::Toml).expect("parse"))
        .expect("compile");

    let outcome = scan(
        &plan,
        units(&[("boom.py", ""), ("io.py", ""), ("ok.py", "")]),
        &options(2),
        &CancelToken::new(),
    );
    let findings = outcome.findings.into_vec();
    let errors = by_rule(&findings, "AC-001");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|f| f.status == FindingStatus::Error));
    assert!(errors[0].message.contains("evaluator panicked: evaluator bug"));
    assert!(errors[1].message.contains("disk on fire"));
    assert!(outcome.coverage.complete);
}

#[cfg(unix)]
#[test]
fn hung_tool_yields_one_error_and_the_scan_completes() {
    let tmp = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf8");
    std::fs::write(root.join("config.py"), "password = 'x'\n").expect("write");

    let text = format!(
        "{SECRETS_AND_LOGGING}\n{}",
        r#"
[[rules]]
id = "DEP-001"
framework = "SOC2"
control = "CC6.1"
name = "Dependency vulnerabilities"
severity = "high"
evaluator = "external-tool"
[rules.params]
command = ["sleep", "30"]
timeout_secs = 1
"#
    );
    let plan = plan(&text);
    let walker = FsWalker::new(root.clone());
    let outcome = scan(
        &plan,
        walker.walk(),
        &ScanOptions::new(root).with_concurrency(2),
        &CancelToken::new(),
    );

    let findings = outcome.findings.into_vec();
    let tool = by_rule(&findings, "DEP-001");
    assert_eq!(tool.len(), 1);
    assert_eq!(tool[0].status, FindingStatus::Error);
    assert_eq!(tool[0].code, ids::CODE_TOOL_TIMEOUT);
    assert_eq!(by_rule(&findings, "AC-001").len(), 1);
    assert!(outcome.coverage.complete);
}

#[test]
fn filesystem_scan_end_to_end() {
    let tmp = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf8");
    std::fs::create_dir_all(root.join("src")).expect("mkdir");
    std::fs::write(root.join("src/app.py"), "print('clean')\n").expect("write");
    std::fs::write(root.join("src/blob.py"), b"password = 'x'\0").expect("write");

    let plan = plan(SECRETS_AND_LOGGING);
    let walker = FsWalker::new(root.clone());
    let outcome = scan(&plan, walker.walk(), &ScanOptions::new(root), &CancelToken::new());

    let findings = outcome.findings.into_vec();
    // Binary units are not applicable, so the secret in blob.py is not reported.
    assert!(by_rule(&findings, "AC-001").is_empty());
    let logging = by_rule(&findings, "MO-001");
    assert_eq!(logging[0].status, FindingStatus::Warning);
    assert_eq!(logging[0].code, ids::CODE_MARKER_MISSING);
    assert_eq!(outcome.coverage.units_scanned, 2);
}
