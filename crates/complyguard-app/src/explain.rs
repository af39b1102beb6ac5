//! The `explain` use case: look up evaluator-kind and finding-code documentation.

use complyguard_types::explain::{self, Explanation};

#[derive(Clone, Debug)]
pub enum ExplainOutput {
    Found(Explanation),
    /// Unknown identifier; includes the known kinds and codes.
    NotFound {
        identifier: String,
        available_kinds: &'static [&'static str],
        available_codes: &'static [&'static str],
    },
}

pub fn run_explain(identifier: &str) -> ExplainOutput {
    match explain::lookup_explanation(identifier) {
        Some(exp) => ExplainOutput::Found(exp),
        None => ExplainOutput::NotFound {
            identifier: identifier.to_string(),
            available_kinds: explain::all_kinds(),
            available_codes: explain::all_codes(),
        },
    }
}

/// Format an explanation for terminal display.
pub fn format_explanation(exp: &Explanation) -> String {
    let mut out = String::new();

    out.push_str(exp.title);
    out.push('\n');
    out.push_str(&"=".repeat(exp.title.len()));
    out.push_str("\n\n");
    out.push_str(exp.description);
    out.push_str("\n\n");
    out.push_str("Remediation\n");
    out.push_str("-----------\n");
    out.push_str(exp.remediation);
    out.push('\n');

    if let Some(example) = exp.example {
        out.push_str("\nExample\n");
        out.push_str("-------\n\n");
        out.push_str("```toml\n");
        out.push_str(example);
        out.push('\n');
        out.push_str("```\n");
    }

    out
}

pub fn format_not_found(identifier: &str, kinds: &[&'static str], codes: &[&'static str]) -> String {
    let mut out = String::new();

    out.push_str(&format!("Unknown evaluator kind or code: {identifier}\n\n"));
    out.push_str("Available evaluator kinds:\n");
    for kind in kinds {
        out.push_str(&format!("  - {kind}\n"));
    }
    out.push_str("\nAvailable codes:\n");
    for code in codes {
        out.push_str(&format!("  - {code}\n"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explain_known_kind_includes_example() {
        let ExplainOutput::Found(exp) = run_explain("pattern-match") else {
            panic!("expected pattern-match to be known");
        };
        let formatted = format_explanation(&exp);
        assert!(formatted.starts_with("Pattern Match\n============="));
        assert!(formatted.contains("Remediation"));
        assert!(formatted.contains("```toml"));
    }

    #[test]
    fn explain_known_code_without_example() {
        let ExplainOutput::Found(exp) = run_explain("scan_timeout") else {
            panic!("expected scan_timeout to be known");
        };
        assert!(!format_explanation(&exp).contains("Example"));
    }

    #[test]
    fn explain_unknown_lists_available() {
        let ExplainOutput::NotFound {
            identifier,
            available_kinds,
            available_codes,
        } = run_explain("ast-query")
        else {
            panic!("expected not found");
        };
        let formatted = format_not_found(&identifier, available_kinds, available_codes);
        assert!(formatted.contains("Unknown evaluator kind or code: ast-query"));
        assert!(formatted.contains("  - presence-check"));
        assert!(formatted.contains("  - no_violations"));
    }
}
