use camino::{Utf8Path, Utf8PathBuf};
use complyguard_domain::checks::PathScope;
use complyguard_domain::{BINARY_SNIFF_BYTES, SourceUnit, UnitMeta, looks_binary};
use complyguard_types::RepoPath;
use std::fs::File;
use std::io::{self, Read};
use std::sync::Arc;
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("path is not valid UTF-8: {path}")]
    NonUtf8 { path: String },

    #[error("failed to inspect {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A regular file under the scan root. Content is opened on demand.
#[derive(Clone, Debug)]
pub struct FsUnit {
    meta: UnitMeta,
    abs: Utf8PathBuf,
}

impl SourceUnit for FsUnit {
    fn meta(&self) -> &UnitMeta {
        &self.meta
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(&self.abs)?))
    }
}

/// Lazy, sorted walk over regular files under a root.
///
/// `.git` is always skipped. Directories matching an exclude glob are pruned; files must
/// pass the include/exclude scope. Symlinks are not followed.
#[derive(Clone, Debug)]
pub struct FsWalker {
    root: Utf8PathBuf,
    scope: PathScope,
}

impl FsWalker {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            scope: PathScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: PathScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn walk(&self) -> impl Iterator<Item = Result<Arc<dyn SourceUnit>, WalkError>> + '_ {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                if e.file_name() == ".git" {
                    return false;
                }
                match self.relative(e.path()) {
                    Ok(rel) => !self.scope.excludes(&rel),
                    Err(_) => true,
                }
            })
            .filter_map(move |entry| match entry {
                Err(e) => Some(Err(WalkError::from(e))),
                Ok(e) if !e.file_type().is_file() => None,
                Ok(e) => self.unit(&e).transpose(),
            })
    }

    fn relative(&self, path: &std::path::Path) -> Result<RepoPath, WalkError> {
        let utf8 = Utf8Path::from_path(path).ok_or_else(|| WalkError::NonUtf8 {
            path: path.display().to_string(),
        })?;
        let rel = utf8.strip_prefix(&self.root).unwrap_or(utf8);
        Ok(RepoPath::from(rel))
    }

    fn unit(&self, entry: &walkdir::DirEntry) -> Result<Option<Arc<dyn SourceUnit>>, WalkError> {
        let path = self.relative(entry.path())?;
        if !self.scope.matches(&path) {
            return Ok(None);
        }
        let abs = self.root.join(path.as_str());
        let io_err = |source: io::Error| WalkError::Io {
            path: path.to_string(),
            source,
        };

        let metadata = entry.metadata().map_err(WalkError::from)?;
        let binary = sniff_binary(&abs).map_err(io_err)?;

        let unit: Arc<dyn SourceUnit> = Arc::new(FsUnit {
            meta: UnitMeta {
                path,
                size: metadata.len(),
                mode: file_mode(&metadata),
                binary,
            },
            abs,
        });
        Ok(Some(unit))
    }
}

fn sniff_binary(path: &Utf8Path) -> io::Result<bool> {
    let mut prefix = Vec::with_capacity(BINARY_SNIFF_BYTES);
    File::open(path)?
        .take(BINARY_SNIFF_BYTES as u64)
        .read_to_end(&mut prefix)?;
    Ok(looks_binary(&prefix))
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn file_mode(_: &std::fs::Metadata) -> Option<u32> {
    None
}
