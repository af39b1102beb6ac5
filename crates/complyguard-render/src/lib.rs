//! Rendering for evidence reports (canonical JSON, Markdown, GitHub annotations).

#![forbid(unsafe_code)]

mod gha;
mod json;
mod markdown;

#[cfg(test)]
mod fixture;

pub use gha::render_github_annotations;
pub use json::{canonicalize, render_json};
pub use markdown::render_markdown;
