//! Revision-scoped search: options, result records and the stages that
//! produce them.
pub mod engine;
pub mod executor;
pub mod highlight;
pub mod path;
pub mod streaming;

use crate::error::{Result, RevgrepError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub use engine::SearchEngine;
pub use executor::{ContentQuery, ContentSearcher, GitGrep};
pub use streaming::{ParsedMatches, StreamParser};

pub const DEFAULT_LIMIT: usize = 100;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Admission predicate applied to every candidate path. `Ok(false)` excludes
/// the file, an error aborts the query.
pub type FileFilter = Arc<dyn Fn(&str) -> std::result::Result<bool, BoxError> + Send + Sync>;

pub fn file_filter<F>(filter: F) -> FileFilter
where
    F: Fn(&str) -> std::result::Result<bool, BoxError> + Send + Sync + 'static,
{
    Arc::new(filter)
}

/// Per-query configuration. Built once and never mutated while a query runs.
#[derive(Clone)]
pub struct SearchOptions {
    /// Restricts the search to files changed between this revision and the
    /// searched one.
    pub base_revision: Option<String>,
    pub case_sensitive: bool,
    pub regex: bool,
    /// Maximum number of results, shared by path and content matches.
    pub limit: usize,
    pub context_lines: usize,
    pub search_path: bool,
    pub search_content: bool,
    pub file_filter: Option<FileFilter>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            base_revision: None,
            case_sensitive: true,
            regex: false,
            limit: DEFAULT_LIMIT,
            context_lines: 0,
            search_path: true,
            search_content: true,
            file_filter: None,
        }
    }
}

impl fmt::Debug for SearchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchOptions")
            .field("base_revision", &self.base_revision)
            .field("case_sensitive", &self.case_sensitive)
            .field("regex", &self.regex)
            .field("limit", &self.limit)
            .field("context_lines", &self.context_lines)
            .field("search_path", &self.search_path)
            .field("search_content", &self.search_content)
            .field("file_filter", &self.file_filter.is_some())
            .finish()
    }
}

impl SearchOptions {
    pub fn with_file_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.file_filter = Some(file_filter(filter));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(RevgrepError::InvalidOptions(
                "limit must be greater than zero".to_string(),
            ));
        }
        if matches!(&self.base_revision, Some(base) if base.is_empty()) {
            return Err(RevgrepError::InvalidOptions(
                "base revision must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    PathMatch,
    ContentMatch,
}

/// Half-open character range inside a snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextLine {
    pub line_number: usize,
    pub text: String,
}

/// One reportable match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub path: String,
    pub kind: MatchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    pub snippet: String,
    pub match_spans: Vec<Span>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context_before: Vec<ContextLine>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context_after: Vec<ContextLine>,
}

impl SearchResult {
    /// A match on the file name; the snippet is the path itself.
    pub fn path_match(path: &str, match_spans: Vec<Span>) -> Self {
        Self {
            path: path.to_string(),
            kind: MatchKind::PathMatch,
            line_number: None,
            snippet: path.to_string(),
            match_spans,
            context_before: Vec::new(),
            context_after: Vec::new(),
        }
    }

    pub fn content_match(
        path: &str,
        line_number: usize,
        snippet: String,
        match_spans: Vec<Span>,
    ) -> Self {
        Self {
            path: path.to_string(),
            kind: MatchKind::ContentMatch,
            line_number: Some(line_number),
            snippet,
            match_spans,
            context_before: Vec::new(),
            context_after: Vec::new(),
        }
    }
}

/// Results of one query plus the number of matches found, which counts
/// matching lines rather than returned records for the content stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub total_matches: usize,
}
