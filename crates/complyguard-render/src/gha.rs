use complyguard_types::{ComplianceReport, FindingStatus};

/// Render findings as GitHub Actions workflow command annotations.
///
/// Format: `::{level} file={path},line={line}::{message}`. Passed findings are omitted.
/// Failures of gating rules are errors; other failures, warnings, and evaluation errors are
/// warnings; skipped controls are notices.
pub fn render_github_annotations(report: &ComplianceReport) -> Vec<String> {
    let mut out = Vec::new();

    for f in &report.findings {
        let level = match f.status {
            FindingStatus::Passed => continue,
            FindingStatus::Failed if f.severity.is_gating() => "error",
            FindingStatus::Failed | FindingStatus::Warning | FindingStatus::Error => "warning",
            FindingStatus::Skipped => "notice",
        };

        let mut meta = String::new();
        if let Some(loc) = &f.location {
            meta.push_str(&format!("file={}", escape_property(loc.path.as_str())));
            if let Some(line) = loc.line {
                meta.push_str(&format!(",line={line}"));
            }
        }

        let message = escape_data(&format!(
            "[{}:{}] {} ({} {})",
            f.rule_id, f.code, f.message, f.framework, f.control
        ));

        if meta.is_empty() {
            out.push(format!("::{level}::{message}"));
        } else {
            out.push(format!("::{level} {meta}::{message}"));
        }
    }

    out
}

fn escape_data(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(s: &str) -> String {
    escape_data(s).replace(':', "%3A").replace(',', "%2C")
}
