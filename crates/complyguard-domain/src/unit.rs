use complyguard_types::RepoPath;
use std::io::{self, Read};

/// How many leading bytes are inspected when deciding whether a unit is binary.
pub const BINARY_SNIFF_BYTES: usize = 8 * 1024;

/// Cheap facts about a unit, known without reading its content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitMeta {
    pub path: RepoPath,
    pub size: u64,
    pub mode: Option<u32>,
    pub binary: bool,
}

/// A scannable item. Content is opened lazily and may be opened more than once, once per
/// rule that applies to the unit.
pub trait SourceUnit: Send + Sync {
    fn meta(&self) -> &UnitMeta;

    fn open(&self) -> io::Result<Box<dyn Read + '_>>;

    fn path(&self) -> &RepoPath {
        &self.meta().path
    }
}

/// A NUL byte in the sniffed prefix marks the unit as binary.
pub fn looks_binary(prefix: &[u8]) -> bool {
    prefix.iter().take(BINARY_SNIFF_BYTES).any(|b| *b == 0)
}

/// In-memory unit, for callers that already hold the bytes.
#[derive(Clone, Debug)]
pub struct MemoryUnit {
    meta: UnitMeta,
    content: Vec<u8>,
}

impl MemoryUnit {
    pub fn new(path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        Self {
            meta: UnitMeta {
                path: RepoPath::new(path),
                size: content.len() as u64,
                mode: None,
                binary: looks_binary(&content),
            },
            content,
        }
    }
}

impl SourceUnit for MemoryUnit {
    fn meta(&self) -> &UnitMeta {
        &self.meta
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self.content.as_slice()))
    }
}
