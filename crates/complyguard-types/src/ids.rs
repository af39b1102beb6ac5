//! Stable identifiers for evaluator kinds and finding codes.
//!
//! Evaluator kinds are kebab-case (they appear in rule-set documents). Codes are short
//! snake_case discriminators attached to every finding.

// Evaluator kinds
pub const KIND_PATTERN_MATCH: &str = "pattern-match";
pub const KIND_PRESENCE_CHECK: &str = "presence-check";
pub const KIND_EXTERNAL_TOOL: &str = "external-tool";
pub const KIND_METADATA_CHECK: &str = "metadata-check";

// Codes: pattern-match
pub const CODE_PATTERN_MATCHED: &str = "pattern_matched";
pub const CODE_FILE_TOO_LARGE: &str = "file_too_large";

// Codes: presence-check
pub const CODE_MARKER_FOUND: &str = "marker_found";
pub const CODE_MARKER_MISSING: &str = "marker_missing";

// Codes: external-tool
pub const CODE_TOOL_FINDING: &str = "tool_finding";
pub const CODE_TOOL_CLEAN: &str = "tool_clean";
pub const CODE_TOOL_FAILED: &str = "tool_failed";
pub const CODE_TOOL_TIMEOUT: &str = "tool_timeout";
pub const CODE_NOT_APPLICABLE: &str = "not_applicable";

// Codes: metadata-check
pub const CODE_METADATA_SATISFIED: &str = "metadata_satisfied";
pub const CODE_METADATA_MISMATCH: &str = "metadata_mismatch";
pub const CODE_METADATA_MISSING: &str = "metadata_missing";

// Scan-level
pub const CODE_NO_VIOLATIONS: &str = "no_violations";
pub const CODE_SCAN_TIMEOUT: &str = "scan_timeout";
pub const CODE_EVALUATOR_ERROR: &str = "evaluator_error";

// Coverage reasons
pub const REASON_SCAN_TIMEOUT: &str = "scan-timeout";
pub const REASON_CANCELLED: &str = "cancelled";
