//! Render use cases over in-memory reports.

use complyguard_types::ComplianceReport;

pub fn render_markdown(report: &ComplianceReport) -> String {
    complyguard_render::render_markdown(report)
}

pub fn render_annotations(report: &ComplianceReport, max: usize) -> Vec<String> {
    complyguard_render::render_github_annotations(report)
        .into_iter()
        .take(max)
        .collect()
}
