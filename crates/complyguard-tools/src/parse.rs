use crate::{ToolError, ToolOutput};
use complyguard_domain::{Finding, truncate_evidence};
use complyguard_types::{FindingStatus, Location, RepoPath, ids};
use serde::Deserialize;
use serde_json::Value;

/// npm-audit severity names, lowest first.
pub(crate) const NPM_SEVERITIES: [&str; 5] = ["info", "low", "moderate", "high", "critical"];

/// How a tool's output is turned into findings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputParser {
    /// Exit 0 is clean; any other accepted exit code is a violation.
    ExitCode,
    /// stdout is `[{message, path?, line?, status?, evidence?}]` or `{"findings": [...]}`.
    FindingsJson,
    /// `npm audit --json`: fails when any severity in `fail_on` has a non-zero count.
    NpmAudit { fail_on: Vec<String> },
    /// `license-checker --json`: fails when a package license contains a prohibited name.
    LicenseChecker { prohibited: Vec<String> },
}

impl OutputParser {
    pub fn name(&self) -> &'static str {
        match self {
            OutputParser::ExitCode => "exit-code",
            OutputParser::FindingsJson => "findings-json",
            OutputParser::NpmAudit { .. } => "npm-audit",
            OutputParser::LicenseChecker { .. } => "license-checker",
        }
    }

    pub(crate) fn parse(
        &self,
        rule_id: &str,
        output: &ToolOutput,
        max_evidence: usize,
    ) -> Result<Vec<Finding>, ToolError> {
        match self {
            OutputParser::ExitCode => Ok(vec![exit_code(rule_id, output, max_evidence)]),
            OutputParser::FindingsJson => findings_json(rule_id, &output.stdout, max_evidence),
            OutputParser::NpmAudit { fail_on } => {
                npm_audit(rule_id, &output.stdout, fail_on).map(|f| vec![f])
            }
            OutputParser::LicenseChecker { prohibited } => {
                license_checker(rule_id, &output.stdout, prohibited, max_evidence).map(|f| vec![f])
            }
        }
    }

    fn error(&self, reason: impl Into<String>) -> ToolError {
        ToolError::Parse {
            parser: self.name(),
            reason: reason.into(),
        }
    }
}

fn clean(rule_id: &str, message: impl Into<String>) -> Finding {
    Finding::new(rule_id, ids::CODE_TOOL_CLEAN, FindingStatus::Passed, message)
}

fn exit_code(rule_id: &str, output: &ToolOutput, max_evidence: usize) -> Finding {
    if output.exit_code == 0 {
        return clean(rule_id, "Tool reported no violations");
    }
    let detail = if output.stdout.trim().is_empty() {
        output.stderr.trim()
    } else {
        output.stdout.trim()
    };
    let finding = Finding::new(
        rule_id,
        ids::CODE_TOOL_FINDING,
        FindingStatus::Failed,
        format!("Tool reported violations (exit code {})", output.exit_code),
    );
    if detail.is_empty() {
        finding
    } else {
        finding.with_evidence(truncate_evidence(detail, max_evidence))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FindingsDoc {
    List(Vec<ToolFinding>),
    Wrapped { findings: Vec<ToolFinding> },
}

#[derive(Debug, Deserialize)]
struct ToolFinding {
    message: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    evidence: Option<String>,
}

fn findings_json(
    rule_id: &str,
    stdout: &str,
    max_evidence: usize,
) -> Result<Vec<Finding>, ToolError> {
    let doc: FindingsDoc = serde_json::from_str(stdout)
        .map_err(|e| OutputParser::FindingsJson.error(e.to_string()))?;
    let items = match doc {
        FindingsDoc::List(items) | FindingsDoc::Wrapped { findings: items } => items,
    };
    if items.is_empty() {
        return Ok(vec![clean(rule_id, "Tool reported no findings")]);
    }

    items
        .into_iter()
        .map(|item| {
            let status = match item.status.as_deref() {
                None | Some("failed") => FindingStatus::Failed,
                Some("warning") => FindingStatus::Warning,
                Some(other) => {
                    return Err(OutputParser::FindingsJson
                        .error(format!("unsupported finding status '{other}'")));
                }
            };
            let location = item.path.map(|p| Location {
                path: RepoPath::new(p),
                line: item.line,
            });
            let mut f = Finding::new(rule_id, ids::CODE_TOOL_FINDING, status, item.message)
                .with_location(location);
            if let Some(e) = item.evidence {
                f = f.with_evidence(truncate_evidence(&e, max_evidence));
            }
            Ok(f)
        })
        .collect()
}

fn npm_audit(rule_id: &str, stdout: &str, fail_on: &[String]) -> Result<Finding, ToolError> {
    let parser = OutputParser::NpmAudit {
        fail_on: fail_on.to_vec(),
    };
    let doc: Value = serde_json::from_str(stdout).map_err(|e| parser.error(e.to_string()))?;
    let counts = doc
        .pointer("/metadata/vulnerabilities")
        .and_then(Value::as_object)
        .ok_or_else(|| parser.error("missing metadata.vulnerabilities"))?;
    let count = |sev: &str| counts.get(sev).and_then(Value::as_u64).unwrap_or(0);

    let summary = NPM_SEVERITIES
        .iter()
        .rev()
        .map(|sev| format!("{sev}={}", count(sev)))
        .collect::<Vec<_>>()
        .join(", ");

    let gating: Vec<String> = NPM_SEVERITIES
        .iter()
        .rev()
        .filter(|sev| fail_on.iter().any(|f| f == *sev))
        .filter(|sev| count(sev) > 0)
        .map(|sev| format!("{} {sev}", count(sev)))
        .collect();

    if gating.is_empty() {
        return Ok(clean(
            rule_id,
            format!("No {} vulnerabilities detected", fail_on.join("/")),
        )
        .with_evidence(summary));
    }
    Ok(Finding::new(
        rule_id,
        ids::CODE_TOOL_FINDING,
        FindingStatus::Failed,
        format!("Found {} vulnerabilities", gating.join(", ")),
    )
    .with_evidence(summary))
}

fn license_checker(
    rule_id: &str,
    stdout: &str,
    prohibited: &[String],
    max_evidence: usize,
) -> Result<Finding, ToolError> {
    let parser = OutputParser::LicenseChecker {
        prohibited: prohibited.to_vec(),
    };
    let doc: Value = serde_json::from_str(stdout).map_err(|e| parser.error(e.to_string()))?;
    let packages = doc
        .as_object()
        .ok_or_else(|| parser.error("expected an object keyed by package"))?;

    let mut violations: Vec<String> = packages
        .iter()
        .filter_map(|(pkg, info)| {
            let licenses = match info.get("licenses") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" OR "),
                _ => "unknown".to_string(),
            };
            prohibited
                .iter()
                .any(|p| licenses.contains(p.as_str()))
                .then(|| format!("{pkg}: {licenses}"))
        })
        .collect();
    violations.sort();

    if violations.is_empty() {
        return Ok(clean(rule_id, "No prohibited licenses detected"));
    }
    Ok(Finding::new(
        rule_id,
        ids::CODE_TOOL_FINDING,
        FindingStatus::Failed,
        format!("Found {} prohibited licenses", violations.len()),
    )
    .with_evidence(truncate_evidence(&violations.join("\n"), max_evidence)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn output(stdout: &str, exit_code: i32) -> ToolOutput {
        ToolOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code,
            duration: Duration::ZERO,
        }
    }

    fn npm(fail_on: &[&str]) -> OutputParser {
        OutputParser::NpmAudit {
            fail_on: fail_on.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn exit_code_zero_is_clean() {
        let out = OutputParser::ExitCode.parse("R", &output("", 0), 1024).expect("parse");
        assert_eq!(out[0].status, FindingStatus::Passed);
        assert_eq!(out[0].code, ids::CODE_TOOL_CLEAN);
    }

    #[test]
    fn exit_code_nonzero_is_a_violation_with_evidence() {
        let out = OutputParser::ExitCode
            .parse("R", &output("bad thing\n", 1), 1024)
            .expect("parse");
        assert_eq!(out[0].status, FindingStatus::Failed);
        assert_eq!(out[0].evidence.as_deref(), Some("bad thing"));
    }

    #[test]
    fn npm_audit_fails_on_high_and_critical() {
        let stdout = r#"{"metadata":{"vulnerabilities":{"info":0,"low":4,"moderate":1,"high":2,"critical":1,"total":8}}}"#;
        let out = npm(&["critical", "high"]).parse("DEP-001", &output(stdout, 1), 1024).expect("parse");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, FindingStatus::Failed);
        assert_eq!(out[0].message, "Found 1 critical, 2 high vulnerabilities");
        assert_eq!(
            out[0].evidence.as_deref(),
            Some("critical=1, high=2, moderate=1, low=4, info=0")
        );
    }

    #[test]
    fn npm_audit_below_threshold_is_clean() {
        let stdout = r#"{"metadata":{"vulnerabilities":{"low":4,"moderate":1,"high":0,"critical":0}}}"#;
        let out = npm(&["critical", "high"]).parse("DEP-001", &output(stdout, 1), 1024).expect("parse");
        assert_eq!(out[0].status, FindingStatus::Passed);
    }

    #[test]
    fn npm_audit_without_metadata_is_a_parse_error() {
        let err = npm(&["high"]).parse("DEP-001", &output("{}", 0), 1024).unwrap_err();
        assert!(matches!(err, ToolError::Parse { parser: "npm-audit", .. }));
    }

    #[test]
    fn license_checker_flags_prohibited_substrings() {
        let stdout = r#"{
            "left-pad@1.0.0": {"licenses": "MIT"},
            "copyleft@2.0.0": {"licenses": "AGPL-3.0"},
            "dual@1.0.0": {"licenses": ["MIT", "GPL-2.0"]}
        }"#;
        let parser = OutputParser::LicenseChecker {
            prohibited: vec!["GPL".to_string(), "AGPL".to_string(), "SSPL".to_string()],
        };
        let out = parser.parse("LIC-001", &output(stdout, 0), 1024).expect("parse");
        assert_eq!(out[0].status, FindingStatus::Failed);
        assert_eq!(out[0].message, "Found 2 prohibited licenses");
        assert_eq!(
            out[0].evidence.as_deref(),
            Some("copyleft@2.0.0: AGPL-3.0\ndual@1.0.0: MIT OR GPL-2.0")
        );
    }

    #[test]
    fn findings_json_accepts_both_shapes() {
        let list = r#"[{"message":"m","path":"src/a.py","line":3}]"#;
        let wrapped = r#"{"findings":[{"message":"m","path":"src/a.py","line":3,"status":"warning"}]}"#;
        let a = OutputParser::FindingsJson.parse("R", &output(list, 0), 1024).expect("list");
        let b = OutputParser::FindingsJson.parse("R", &output(wrapped, 0), 1024).expect("wrapped");
        assert_eq!(a[0].status, FindingStatus::Failed);
        assert_eq!(b[0].status, FindingStatus::Warning);
        assert_eq!(a[0].location, Some(Location::line(RepoPath::new("src/a.py"), 3)));
    }

    #[test]
    fn findings_json_empty_is_clean() {
        let out = OutputParser::FindingsJson.parse("R", &output("[]", 0), 1024).expect("parse");
        assert_eq!(out[0].code, ids::CODE_TOOL_CLEAN);
    }
}
