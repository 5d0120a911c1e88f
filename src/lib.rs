pub mod admission;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod output;
pub mod search;

pub use crate::config::Config;
pub use crate::error::{Result, RevgrepError};
pub use crate::git::{Git, RevisionSource};
pub use crate::search::{
    file_filter, ContentQuery, ContentSearcher, ContextLine, FileFilter, GitGrep, MatchKind,
    SearchEngine, SearchOptions, SearchOutcome, SearchResult, Span, StreamParser,
};
pub use clap::Parser;
pub use cli::{Cli, Commands, OutputFormat};
use std::path::Path;

/// Searches `repo` at `revision` using the `git` found on `PATH`.
///
/// The revision is checked out into the repository's working tree first.
pub fn search(
    repo: &Path,
    revision: &str,
    query: &str,
    options: &SearchOptions,
) -> Result<SearchOutcome> {
    SearchEngine::new().search(repo, revision, query, options)
}
