use crate::Finding;
use sha2::{Digest, Sha256};

/// Compute a stable SHA-256 fingerprint for a finding.
///
/// Identity fields:
/// - rule_id
/// - code
/// - location path (repo-relative, if present)
/// - location line (if present)
pub fn fingerprint_for_finding(finding: &Finding) -> String {
    let line = finding
        .location
        .as_ref()
        .and_then(|l| l.line)
        .map(|l| l.to_string());
    let mut parts = vec![finding.rule_id.as_str(), finding.code.as_str()];
    if let Some(loc) = &finding.location {
        parts.push(loc.path.as_str());
    }
    if let Some(line) = line.as_deref() {
        parts.push(line);
    }
    let canonical = parts.join("|");

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}
