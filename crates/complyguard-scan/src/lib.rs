//! Scan orchestration: feeds source units from a walker through a bounded pool of workers
//! and collects every finding into a single [`complyguard_domain::FindingSet`].

#![forbid(unsafe_code)]

mod coordinator;
mod walker;

pub use coordinator::{ScanOptions, ScanOutcome, UnitResult, scan};
pub use walker::{FsUnit, FsWalker, WalkError};
