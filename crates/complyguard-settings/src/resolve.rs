use crate::model::{ComplyguardConfigV1, SCHEMA_CONFIG_V1};
use anyhow::Context;
use complyguard_domain::Limits;
use complyguard_domain::checks::PathScope;
use globset::Glob;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Command-line values. Anything set here wins over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct ResolvedSettings {
    pub concurrency: usize,
    pub timeout: Option<Duration>,
    pub limits: Limits,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ResolvedSettings {
    /// Walk scope built from the validated include/exclude globs.
    pub fn scope(&self) -> anyhow::Result<PathScope> {
        PathScope::new(&self.include, &self.exclude).context("invalid scan scope")
    }
}

pub fn resolve_settings(
    cfg: ComplyguardConfigV1,
    overrides: Overrides,
) -> anyhow::Result<ResolvedSettings> {
    if let Some(schema) = cfg.schema.as_deref()
        && schema != SCHEMA_CONFIG_V1
    {
        anyhow::bail!("unsupported config schema: {schema} (expected {SCHEMA_CONFIG_V1})");
    }

    let concurrency = match overrides.concurrency.or(cfg.concurrency) {
        Some(0) => anyhow::bail!("concurrency must be at least 1"),
        Some(n) => n,
        None => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
    };

    let timeout = match overrides.timeout_secs.or(cfg.timeout_secs) {
        Some(0) => anyhow::bail!("timeout_secs must be at least 1"),
        Some(secs) => Some(Duration::from_secs(secs)),
        None => None,
    };

    let defaults = Limits::default();
    let limits = Limits {
        max_file_bytes: cfg.max_file_bytes.unwrap_or(defaults.max_file_bytes),
        max_evidence_bytes: cfg.max_evidence_bytes.unwrap_or(defaults.max_evidence_bytes),
    };
    if limits.max_evidence_bytes == 0 {
        anyhow::bail!("max_evidence_bytes must be at least 1");
    }

    validate_globs("include", &cfg.include)?;
    validate_globs("exclude", &cfg.exclude)?;

    Ok(ResolvedSettings {
        concurrency,
        timeout,
        limits,
        include: cfg.include,
        exclude: cfg.exclude,
    })
}

fn validate_globs(key: &str, patterns: &[String]) -> anyhow::Result<()> {
    for pattern in patterns {
        Glob::new(pattern).with_context(|| format!("invalid {key} glob: {pattern}"))?;
    }
    Ok(())
}
