//! Explain registry for evaluator kinds and finding codes.
//!
//! Maps evaluator kinds and codes to human-readable explanations with remediation guidance.

use crate::ids;

/// Explanation entry for an evaluator kind or code.
#[derive(Debug, Clone)]
pub struct Explanation {
    /// Short description of the kind/code.
    pub title: &'static str,
    /// What it means and when it is emitted.
    pub description: &'static str,
    /// What to do about it.
    pub remediation: &'static str,
    /// Rule-set snippet showing how the evaluator is configured.
    pub example: Option<&'static str>,
}

/// Look up an explanation by evaluator kind or code.
///
/// Returns `None` if the identifier is not recognized.
pub fn lookup_explanation(identifier: &str) -> Option<Explanation> {
    match identifier {
        // Evaluator kinds
        ids::KIND_PATTERN_MATCH => Some(explain_pattern_match()),
        ids::KIND_PRESENCE_CHECK => Some(explain_presence_check()),
        ids::KIND_EXTERNAL_TOOL => Some(explain_external_tool()),
        ids::KIND_METADATA_CHECK => Some(explain_metadata_check()),

        // Codes
        ids::CODE_PATTERN_MATCHED => Some(explain_pattern_matched()),
        ids::CODE_FILE_TOO_LARGE => Some(explain_file_too_large()),
        ids::CODE_MARKER_FOUND => Some(code_only(
            "Marker Found",
            "A presence-check rule found its marker in at least one source unit. The evidence names \
the first matching path (in path order) and the total number of matching units.",
            "None required.",
        )),
        ids::CODE_MARKER_MISSING => Some(code_only(
            "Marker Missing",
            "A presence-check rule probed every applicable source unit and found no marker. The \
status is the rule's `when_missing` setting (warning by default). Units larger than \
`max_file_bytes` are only searched up to that limit; the evidence counts them.",
            "Add the required capability (for example structured audit logging) or adjust the \
rule's include globs if the marker lives in files the rule does not cover. If the evidence \
counts oversized units, raise `max_file_bytes`.",
        )),
        ids::CODE_TOOL_FINDING => Some(code_only(
            "External Tool Finding",
            "An external scanner reported a violation (vulnerable dependency, prohibited license, \
or a generic finding) and its output was parsed into this finding.",
            "Follow the rule's remediation text; the evidence carries the tool's own summary.",
        )),
        ids::CODE_TOOL_CLEAN => Some(code_only(
            "External Tool Clean",
            "The external scanner ran successfully and reported nothing that violates the rule.",
            "None required.",
        )),
        ids::CODE_TOOL_FAILED => Some(explain_tool_failed()),
        ids::CODE_TOOL_TIMEOUT => Some(explain_tool_timeout()),
        ids::CODE_NOT_APPLICABLE => Some(code_only(
            "Not Applicable",
            "The rule's `requires_file` marker does not exist in the scanned tree, so the external \
tool was not run.",
            "None required unless the marker file is expected to exist.",
        )),
        ids::CODE_METADATA_SATISFIED => Some(code_only(
            "Metadata Satisfied",
            "Caller-supplied repository metadata satisfies the rule's expectation.",
            "None required.",
        )),
        ids::CODE_METADATA_MISMATCH => Some(code_only(
            "Metadata Mismatch",
            "Caller-supplied repository metadata (for example branch-protection settings) does not \
satisfy the rule's expectation.",
            "Change the repository setting named in the finding's evidence.",
        )),
        ids::CODE_METADATA_MISSING => Some(code_only(
            "Metadata Missing",
            "The rule needs a metadata key that the caller did not supply, so the control could not \
be evaluated.",
            "Pass a metadata document with `--metadata` that contains the key.",
        )),
        ids::CODE_NO_VIOLATIONS => Some(code_only(
            "No Violations",
            "The rule was evaluated and produced no findings of its own.",
            "None required.",
        )),
        ids::CODE_SCAN_TIMEOUT => Some(explain_scan_timeout()),
        ids::CODE_EVALUATOR_ERROR => Some(code_only(
            "Evaluator Error",
            "The evaluator failed while checking this unit (unreadable file, internal panic). The \
control was not evaluated for that unit.",
            "Fix the scanner environment (permissions, encoding) and re-run the scan.",
        )),

        _ => None,
    }
}

/// List all known evaluator kinds.
pub fn all_kinds() -> &'static [&'static str] {
    &[
        ids::KIND_PATTERN_MATCH,
        ids::KIND_PRESENCE_CHECK,
        ids::KIND_EXTERNAL_TOOL,
        ids::KIND_METADATA_CHECK,
    ]
}

/// List all known codes.
pub fn all_codes() -> &'static [&'static str] {
    &[
        ids::CODE_PATTERN_MATCHED,
        ids::CODE_FILE_TOO_LARGE,
        ids::CODE_MARKER_FOUND,
        ids::CODE_MARKER_MISSING,
        ids::CODE_TOOL_FINDING,
        ids::CODE_TOOL_CLEAN,
        ids::CODE_TOOL_FAILED,
        ids::CODE_TOOL_TIMEOUT,
        ids::CODE_NOT_APPLICABLE,
        ids::CODE_METADATA_SATISFIED,
        ids::CODE_METADATA_MISMATCH,
        ids::CODE_METADATA_MISSING,
        ids::CODE_NO_VIOLATIONS,
        ids::CODE_SCAN_TIMEOUT,
        ids::CODE_EVALUATOR_ERROR,
    ]
}

fn code_only(
    title: &'static str,
    description: &'static str,
    remediation: &'static str,
) -> Explanation {
    Explanation {
        title,
        description,
        remediation,
        example: None,
    }
}

// --- Evaluator kinds ---

fn explain_pattern_match() -> Explanation {
    Explanation {
        title: "Pattern Match",
        description: "\
Scans every applicable text unit line by line for a regular expression.

Each matching line becomes one finding at `path:line` with the trimmed line as evidence.
With `redact = true` every matched span in that line is replaced by `[REDACTED]`.
Units larger than the configured byte cap are reported as skipped, never silently dropped.
Binary units are not scanned.",
        remediation: "\
Remove or rewrite the matched content. Secrets belong in environment variables or a
secrets manager; weak algorithms should be replaced by TLS 1.2+, AES-256, SHA-256.",
        example: Some(
            r#"[[rules]]
id = "AC-001"
framework = "SOC2"
control = "CC6.1"
name = "No hardcoded credentials"
severity = "critical"
evaluator = "pattern-match"
remediation = "Use environment variables or a secrets manager"
[rules.params]
pattern = "password\\s*=\\s*['\"]"
include = ["*.py", "*.js", "*.ts", "*.yaml", "*.yml", "*.json"]
case_insensitive = true
redact = true"#,
        ),
    }
}

fn explain_presence_check() -> Explanation {
    Explanation {
        title: "Presence Check",
        description: "\
Looks for at least one occurrence of a marker anywhere in the tree.

Every applicable unit is probed; the conclusion is drawn once, after all units have been
seen. The result is identical regardless of worker count or evaluation order.",
        remediation: "\
Introduce the missing capability (e.g. import and configure a logging framework) in the
part of the tree the rule's include globs cover.",
        example: Some(
            r#"[[rules]]
id = "MO-001"
framework = "SOC2"
control = "CC7.2"
name = "Audit logging enabled"
severity = "high"
evaluator = "presence-check"
remediation = "Implement structured logging"
[rules.params]
pattern = "import\\s+logging|from\\s+logging"
include = ["*.py"]
when_missing = "warning""#,
        ),
    }
}

fn explain_external_tool() -> Explanation {
    Explanation {
        title: "External Tool Adapter",
        description: "\
Runs a third-party scanner (dependency audit, license checker) as a subprocess in the scan
root with a timeout, then parses its structured output into findings.

A timeout or an unexpected exit code yields exactly one `error` finding for the rule; the
scan always continues.",
        remediation: "\
For violations: update or replace the flagged dependencies. For errors: make sure the tool
is installed and runs within the configured timeout.",
        example: Some(
            r#"[[rules]]
id = "DEP-001"
framework = "SOC2"
control = "CC6.1"
name = "Dependency vulnerabilities"
severity = "high"
evaluator = "external-tool"
remediation = "Run 'npm audit fix' or update vulnerable packages"
[rules.params]
command = ["npm", "audit", "--json"]
parser = "npm-audit"
requires_file = "package.json"
accept_exit_codes = [0, 1]
timeout_secs = 120"#,
        ),
    }
}

fn explain_metadata_check() -> Explanation {
    Explanation {
        title: "Metadata Check",
        description: "\
Compares a caller-supplied metadata value (e.g. branch-protection settings fetched by CI)
against an expectation: `equals`, `min`, or `present`.

If the caller did not supply the key, the control is reported as skipped rather than
passed or failed.",
        remediation: "Change the repository setting to satisfy the expectation.",
        example: Some(
            r#"[[rules]]
id = "CM-001"
framework = "SOC2"
control = "CC8.1"
name = "Branch protection requires review"
severity = "high"
evaluator = "metadata-check"
remediation = "Require at least one approving review on the default branch"
[rules.params]
key = "branch_protection.required_reviews"
min = 1"#,
        ),
    }
}

// --- Codes ---

fn explain_pattern_matched() -> Explanation {
    let mut exp = explain_pattern_match();
    exp.title = "Pattern Matched";
    exp
}

fn explain_file_too_large() -> Explanation {
    Explanation {
        title: "File Too Large",
        description: "\
The unit exceeds the scan's `max_file_bytes` cap, so its content was not scanned. It is
reported as skipped so the gap in coverage is visible to auditors.",
        remediation: "\
Raise `max_file_bytes` in complyguard.toml if the file should be scanned, or exclude it
from the rule's include globs if it is generated or vendored.",
        example: None,
    }
}

fn explain_tool_failed() -> Explanation {
    Explanation {
        title: "External Tool Failed",
        description: "\
The external scanner could not be run, exited with a status outside `accept_exit_codes`,
or produced output the configured parser could not read. The control was not evaluated.",
        remediation: "\
Check that the program is installed and on PATH, and that `parser` matches the tool's output
format. The evidence carries the tool's stderr.",
        example: None,
    }
}

fn explain_tool_timeout() -> Explanation {
    let mut exp = explain_tool_failed();
    exp.title = "External Tool Timed Out";
    exp.description = "\
The external scanner did not finish within the rule's `timeout_secs` and was killed. The
control was not evaluated.";
    exp.remediation = "Raise `timeout_secs` for the rule or speed up the tool (e.g. warm caches).";
    exp
}

fn explain_scan_timeout() -> Explanation {
    Explanation {
        title: "Scan Timeout",
        description: "\
The scan-wide deadline expired (or the scan was cancelled) before this rule/unit pair was
evaluated. The report's coverage block is marked incomplete.",
        remediation: "Raise `--timeout` or `timeout_secs`, or raise `--concurrency`.",
        example: None,
    }
}
