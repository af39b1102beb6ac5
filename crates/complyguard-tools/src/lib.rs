//! External-tool adapter: runs third-party scanners as subprocesses and turns their
//! structured output into findings.

#![forbid(unsafe_code)]

mod adapter;
mod parse;
mod runner;

pub use adapter::{ExternalTool, ExternalToolFactory};
pub use parse::OutputParser;
pub use runner::{CommandRunner, SystemCommandRunner, ToolCommand, ToolError, ToolOutput};
