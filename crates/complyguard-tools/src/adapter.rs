use crate::parse::NPM_SEVERITIES;
use crate::{CommandRunner, OutputParser, SystemCommandRunner, ToolCommand, ToolError};
use complyguard_domain::{
    CompiledCheck, EvalContext, EvalError, EvaluatorFactory, Finding, Limits, TreeCheck,
    truncate_evidence,
};
use complyguard_rules::{EvaluatorKind, Rule, RuleError};
use complyguard_types::{FindingStatus, ids};
use std::sync::Arc;
use std::time::Duration;

const PARAMS: &[&str] = &[
    "command",
    "parser",
    "timeout_secs",
    "accept_exit_codes",
    "requires_file",
    "prohibited",
    "fail_on",
];

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Compiles `external-tool` rules.
pub struct ExternalToolFactory {
    limits: Limits,
    runner: Arc<dyn CommandRunner>,
}

impl ExternalToolFactory {
    pub fn new(limits: Limits) -> Self {
        Self::with_runner(limits, Arc::new(SystemCommandRunner))
    }

    pub fn with_runner(limits: Limits, runner: Arc<dyn CommandRunner>) -> Self {
        Self { limits, runner }
    }
}

impl EvaluatorFactory for ExternalToolFactory {
    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::ExternalTool
    }

    fn compile(&self, rule: &Rule) -> Result<CompiledCheck, RuleError> {
        let id = rule.id.as_str();
        let p = rule.params.reader(id);
        p.deny_unknown(PARAMS)?;

        let command = p.str_list("command")?;
        if command.first().is_none_or(|program| program.is_empty()) {
            return Err(RuleError::invalid_params(
                id,
                "`command` is required (program followed by arguments)",
            ));
        }

        let prohibited = p.str_list("prohibited")?;
        let fail_on = p.str_list("fail_on")?;
        if let Some(bad) = fail_on.iter().find(|s| !NPM_SEVERITIES.contains(&s.as_str())) {
            return Err(RuleError::invalid_params(
                id,
                format!("`fail_on` entry '{bad}' is not one of {}", NPM_SEVERITIES.join("|")),
            ));
        }

        let parser = match p.str("parser")?.unwrap_or("exit-code") {
            "exit-code" => OutputParser::ExitCode,
            "findings-json" => OutputParser::FindingsJson,
            "npm-audit" => OutputParser::NpmAudit {
                fail_on: if fail_on.is_empty() {
                    vec!["critical".to_string(), "high".to_string()]
                } else {
                    fail_on.clone()
                },
            },
            "license-checker" => {
                if prohibited.is_empty() {
                    return Err(RuleError::invalid_params(
                        id,
                        "`prohibited` is required for the license-checker parser",
                    ));
                }
                OutputParser::LicenseChecker {
                    prohibited: prohibited.clone(),
                }
            }
            other => {
                return Err(RuleError::invalid_params(
                    id,
                    format!(
                        "unknown `parser` '{other}' (expected exit-code|findings-json|npm-audit|license-checker)"
                    ),
                ));
            }
        };
        if !fail_on.is_empty() && !matches!(parser, OutputParser::NpmAudit { .. }) {
            return Err(RuleError::invalid_params(id, "`fail_on` only applies to the npm-audit parser"));
        }
        if !prohibited.is_empty() && !matches!(parser, OutputParser::LicenseChecker { .. }) {
            return Err(RuleError::invalid_params(
                id,
                "`prohibited` only applies to the license-checker parser",
            ));
        }

        let timeout_secs = p.u64("timeout_secs")?.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(RuleError::invalid_params(id, "`timeout_secs` must be at least 1"));
        }

        let accept_exit_codes = p
            .i64_list("accept_exit_codes")?
            .unwrap_or_else(|| vec![0])
            .into_iter()
            .map(|c| {
                i32::try_from(c).map_err(|_| {
                    RuleError::invalid_params(id, format!("exit code {c} is out of range"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledCheck::Tree(Box::new(ExternalTool {
            rule_id: rule.id.clone(),
            command,
            parser,
            timeout: Duration::from_secs(timeout_secs),
            accept_exit_codes,
            requires_file: p.str("requires_file")?.map(str::to_string),
            max_evidence: self.limits.max_evidence_bytes,
            runner: Arc::clone(&self.runner),
        })))
    }
}

/// Runs one external scanner in the scan root and parses its output.
pub struct ExternalTool {
    rule_id: String,
    command: Vec<String>,
    parser: OutputParser,
    timeout: Duration,
    accept_exit_codes: Vec<i32>,
    requires_file: Option<String>,
    max_evidence: usize,
    runner: Arc<dyn CommandRunner>,
}

impl ExternalTool {
    fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    fn tool_error(&self, code: &str, message: String) -> Finding {
        Finding::new(self.rule_id.as_str(), code, FindingStatus::Error, message)
    }
}

impl TreeCheck for ExternalTool {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Vec<Finding>, EvalError> {
        if let Some(marker) = &self.requires_file
            && !ctx.root.join(marker).exists()
        {
            return Ok(vec![Finding::new(
                self.rule_id.as_str(),
                ids::CODE_NOT_APPLICABLE,
                FindingStatus::Skipped,
                format!("{marker} not found; {} was not run", self.program()),
            )]);
        }

        let cmd = ToolCommand {
            program: self.program().to_string(),
            args: self.command.iter().skip(1).cloned().collect(),
            cwd: ctx.root.to_path_buf(),
            timeout: self.timeout,
        };
        tracing::debug!(rule_id = %self.rule_id, program = %cmd.program, "running external tool");

        let output = match self.runner.run(&cmd, ctx.cancel) {
            Ok(output) => output,
            Err(ToolError::Cancelled) => return Err(EvalError::Cancelled),
            Err(ToolError::Timeout { .. }) if ctx.cancel.is_cancelled() => {
                return Err(EvalError::Cancelled);
            }
            Err(e @ ToolError::Timeout { .. }) => {
                tracing::warn!(rule_id = %self.rule_id, program = %cmd.program, "{e}");
                return Ok(vec![self.tool_error(
                    ids::CODE_TOOL_TIMEOUT,
                    format!("{} did not finish: {e}", cmd.program),
                )]);
            }
            Err(e) => {
                tracing::warn!(rule_id = %self.rule_id, program = %cmd.program, "{e}");
                return Ok(vec![self.tool_error(ids::CODE_TOOL_FAILED, e.to_string())]);
            }
        };
        tracing::debug!(
            rule_id = %self.rule_id,
            exit_code = output.exit_code,
            elapsed_ms = output.duration.as_millis() as u64,
            "external tool finished"
        );

        if !self.accept_exit_codes.contains(&output.exit_code) {
            tracing::warn!(
                rule_id = %self.rule_id,
                program = %cmd.program,
                exit_code = output.exit_code,
                "external tool exited with an unaccepted status"
            );
            let finding = self.tool_error(
                ids::CODE_TOOL_FAILED,
                format!(
                    "{} exited with status {} (accepted: {:?})",
                    cmd.program, output.exit_code, self.accept_exit_codes
                ),
            );
            let stderr = output.stderr.trim();
            return Ok(vec![if stderr.is_empty() {
                finding
            } else {
                finding.with_evidence(truncate_evidence(stderr, self.max_evidence))
            }]);
        }

        match self.parser.parse(&self.rule_id, &output, self.max_evidence) {
            Ok(findings) => Ok(findings),
            Err(e) => {
                tracing::warn!(rule_id = %self.rule_id, "{e}");
                Ok(vec![self.tool_error(ids::CODE_TOOL_FAILED, e.to_string())])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolOutput;
    use camino::Utf8Path;
    use complyguard_domain::CancelToken;
    use complyguard_rules::Params;
    use complyguard_types::Severity;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    /// Returns a canned result and records the command it was asked to run.
    struct FakeRunner {
        result: Mutex<Option<Result<ToolOutput, ToolError>>>,
        seen: Mutex<Vec<ToolCommand>>,
    }

    impl FakeRunner {
        fn returning(result: Result<ToolOutput, ToolError>) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(result)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, cmd: &ToolCommand, _: &CancelToken) -> Result<ToolOutput, ToolError> {
            self.seen.lock().expect("lock").push(cmd.clone());
            self.result
                .lock()
                .expect("lock")
                .take()
                .expect("runner called once")
        }
    }

    fn ok(stdout: &str, exit_code: i32) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput {
            stdout: stdout.to_string(),
            stderr: "npm ERR! something".to_string(),
            exit_code,
            duration: Duration::ZERO,
        })
    }

    fn rule(params: Value) -> Rule {
        let params: Params = match params {
            Value::Object(map) => map.into_iter().collect(),
            _ => Params::default(),
        };
        Rule {
            id: "DEP-001".to_string(),
            framework: "SOC2".to_string(),
            control: "CC6.1".to_string(),
            name: "Dependency vulnerabilities".to_string(),
            severity: Severity::High,
            evaluator: EvaluatorKind::ExternalTool,
            params,
            remediation: None,
        }
    }

    fn compile(runner: Arc<dyn CommandRunner>, params: Value) -> Box<dyn TreeCheck> {
        match ExternalToolFactory::with_runner(Limits::default(), runner)
            .compile(&rule(params))
            .expect("compile")
        {
            CompiledCheck::Tree(c) => c,
            other => panic!("expected a tree check, got {other:?}"),
        }
    }

    fn run_in(root: &Utf8Path, check: &dyn TreeCheck) -> Result<Vec<Finding>, EvalError> {
        let cancel = CancelToken::new();
        check.evaluate(&EvalContext {
            root,
            metadata: &Value::Null,
            cancel: &cancel,
        })
    }

    fn temp_root() -> (tempfile::TempDir, camino::Utf8PathBuf) {
        let tmp = tempfile::TempDir::new().expect("temp dir");
        let root = camino::Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf8");
        (tmp, root)
    }

    #[test]
    fn runs_in_scan_root_and_parses_output() {
        let (_tmp, root) = temp_root();
        let runner = FakeRunner::returning(ok(
            r#"{"metadata":{"vulnerabilities":{"critical":0,"high":3}}}"#,
            1,
        ));
        let check = compile(
            runner.clone(),
            json!({ "command": ["npm", "audit", "--json"], "parser": "npm-audit", "accept_exit_codes": [0, 1] }),
        );
        let out = run_in(&root, check.as_ref()).expect("evaluate");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, FindingStatus::Failed);

        let seen = runner.seen.lock().expect("lock");
        assert_eq!(seen[0].program, "npm");
        assert_eq!(seen[0].args, vec!["audit", "--json"]);
        assert_eq!(seen[0].cwd, root);
        assert_eq!(seen[0].timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn missing_required_file_skips_without_running() {
        let (_tmp, root) = temp_root();
        let runner = FakeRunner::returning(ok("{}", 0));
        let check = compile(
            runner.clone(),
            json!({ "command": ["npm", "audit"], "requires_file": "package.json" }),
        );
        let out = run_in(&root, check.as_ref()).expect("evaluate");
        assert_eq!(out[0].status, FindingStatus::Skipped);
        assert_eq!(out[0].code, ids::CODE_NOT_APPLICABLE);
        assert!(runner.seen.lock().expect("lock").is_empty());
    }

    #[test]
    fn unaccepted_exit_code_is_one_error() {
        let (_tmp, root) = temp_root();
        let check = compile(
            FakeRunner::returning(ok("", 2)),
            json!({ "command": ["npm", "audit"], "parser": "npm-audit" }),
        );
        let out = run_in(&root, check.as_ref()).expect("evaluate");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, FindingStatus::Error);
        assert_eq!(out[0].code, ids::CODE_TOOL_FAILED);
        assert_eq!(out[0].evidence.as_deref(), Some("npm ERR! something"));
    }

    #[test]
    fn unparseable_output_is_one_error() {
        let (_tmp, root) = temp_root();
        let check = compile(
            FakeRunner::returning(ok("not json", 0)),
            json!({ "command": ["npx", "license-checker", "--json"], "parser": "license-checker", "prohibited": ["GPL"] }),
        );
        let out = run_in(&root, check.as_ref()).expect("evaluate");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].code, ids::CODE_TOOL_FAILED);
    }

    #[test]
    fn missing_program_is_one_error() {
        let (_tmp, root) = temp_root();
        let check = compile(
            FakeRunner::returning(Err(ToolError::ProgramNotFound {
                program: "npm".to_string(),
            })),
            json!({ "command": ["npm"] }),
        );
        let out = run_in(&root, check.as_ref()).expect("evaluate");
        assert_eq!(out[0].status, FindingStatus::Error);
    }

    #[test]
    fn cancellation_propagates() {
        let (_tmp, root) = temp_root();
        let check = compile(
            FakeRunner::returning(Err(ToolError::Cancelled)),
            json!({ "command": ["npm"] }),
        );
        assert!(matches!(run_in(&root, check.as_ref()), Err(EvalError::Cancelled)));
    }

    #[cfg(unix)]
    #[test]
    fn slow_tool_times_out_with_exactly_one_error() {
        let (_tmp, root) = temp_root();
        let check = compile(
            Arc::new(SystemCommandRunner),
            json!({ "command": ["sleep", "30"], "timeout_secs": 1 }),
        );
        let out = run_in(&root, check.as_ref()).expect("evaluate");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, FindingStatus::Error);
        assert_eq!(out[0].code, ids::CODE_TOOL_TIMEOUT);
    }

    #[test]
    fn rejects_bad_parameters() {
        let factory = ExternalToolFactory::new(Limits::default());
        let err = |params: Value| factory.compile(&rule(params)).unwrap_err().to_string();

        assert!(err(json!({})).contains("`command` is required"));
        assert!(err(json!({ "command": ["x"], "parser": "sarif" })).contains("unknown `parser`"));
        assert!(err(json!({ "command": ["x"], "parser": "license-checker" })).contains("`prohibited`"));
        assert!(err(json!({ "command": ["x"], "fail_on": ["high"] })).contains("npm-audit"));
        assert!(err(json!({ "command": ["x"], "parser": "npm-audit", "fail_on": ["severe"] })).contains("fail_on"));
        assert!(err(json!({ "command": ["x"], "timeout_secs": 0 })).contains("timeout_secs"));
    }
}
