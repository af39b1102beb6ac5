//! Scan settings parsing and resolution.
//!
//! This crate is IO-free: it parses and resolves settings provided as strings.

#![forbid(unsafe_code)]

mod model;
mod resolve;

pub use model::{ComplyguardConfigV1, SCHEMA_CONFIG_V1};
pub use resolve::{Overrides, ResolvedSettings};

/// Parse `complyguard.toml` into a typed model.
pub fn parse_config_toml(input: &str) -> anyhow::Result<ComplyguardConfigV1> {
    let cfg: ComplyguardConfigV1 = toml::from_str(input)?;
    Ok(cfg)
}

/// Resolve the effective scan settings (overrides > file > defaults).
pub fn resolve_settings(
    cfg: ComplyguardConfigV1,
    overrides: Overrides,
) -> anyhow::Result<ResolvedSettings> {
    resolve::resolve_settings(cfg, overrides)
}
