//! Subject identity and the report timestamp, resolved from flags and the environment.

use anyhow::Context;
use complyguard_types::Subject;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const ENV_REPOSITORY: &str = "GITHUB_REPOSITORY";
pub const ENV_COMMIT: &str = "GITHUB_SHA";
pub const ENV_SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

/// Flags win over the environment; anything still unset is `"unknown"`.
pub fn resolve_subject(
    repository: Option<String>,
    commit: Option<String>,
    env: impl Fn(&str) -> Option<String>,
) -> Subject {
    let fallback = Subject::unknown();
    let pick = |flag: Option<String>, key: &str, default: String| {
        flag.or_else(|| env(key))
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(default)
    };
    Subject {
        repository: pick(repository, ENV_REPOSITORY, fallback.repository),
        commit: pick(commit, ENV_COMMIT, fallback.commit),
    }
}

/// `--timestamp` (RFC 3339) wins over `SOURCE_DATE_EPOCH` (unix seconds), which wins over
/// the current time.
pub fn resolve_timestamp(
    flag: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<OffsetDateTime> {
    if let Some(v) = flag {
        return OffsetDateTime::parse(v, &Rfc3339)
            .with_context(|| format!("invalid --timestamp (expected RFC 3339): {v}"));
    }
    if let Some(v) = env(ENV_SOURCE_DATE_EPOCH).filter(|v| !v.trim().is_empty()) {
        let secs: i64 = v
            .trim()
            .parse()
            .with_context(|| format!("invalid {ENV_SOURCE_DATE_EPOCH}: {v}"))?;
        return OffsetDateTime::from_unix_timestamp(secs)
            .with_context(|| format!("{ENV_SOURCE_DATE_EPOCH} out of range: {v}"));
    }
    Ok(OffsetDateTime::now_utc())
}
