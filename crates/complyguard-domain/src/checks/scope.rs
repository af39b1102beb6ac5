use complyguard_rules::{ParamReader, RuleError};
use complyguard_types::RepoPath;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Include/exclude globs. A path is in scope when it matches an include (or there are no
/// includes) and matches no exclude. Globs are tried against the full repo-relative path and
/// against the bare file name.
#[derive(Clone, Debug, Default)]
pub struct PathScope {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl PathScope {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, globset::Error> {
        Ok(Self {
            include: build_globset(include)?,
            exclude: build_globset(exclude)?,
        })
    }

    /// Reads `include` and `exclude` from rule parameters.
    pub fn from_params(params: &ParamReader<'_>, rule_id: &str) -> Result<Self, RuleError> {
        let include = params.str_list("include")?;
        let exclude = params.str_list("exclude")?;
        Self::new(&include, &exclude)
            .map_err(|e| RuleError::invalid_params(rule_id, format!("invalid glob: {e}")))
    }

    /// True when `path` matches an exclude glob. Used to prune whole directories.
    pub fn excludes(&self, path: &RepoPath) -> bool {
        self.exclude
            .as_ref()
            .is_some_and(|set| set.is_match(path.as_str()) || set.is_match(path.file_name()))
    }

    pub fn matches(&self, path: &RepoPath) -> bool {
        let hit = |set: &GlobSet| set.is_match(path.as_str()) || set.is_match(path.file_name());
        let included = self.include.as_ref().is_none_or(hit);
        let excluded = self.exclude.as_ref().is_some_and(hit);
        included && !excluded
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>, globset::Error> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        b.add(Glob::new(p)?);
    }
    Ok(Some(b.build()?))
}
