//! Matching the query against file paths.
use crate::error::Result;
use crate::search::{SearchResult, Span};
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: Regex,
}

impl PathMatcher {
    /// Compiles `query` as a regex when `regex` is set, otherwise as a
    /// literal substring. Case folding applies in both modes.
    pub fn compile(query: &str, case_sensitive: bool, regex: bool) -> Result<Self> {
        let source = if regex {
            query.to_string()
        } else {
            regex::escape(query)
        };
        let pattern = RegexBuilder::new(&source)
            .case_insensitive(!case_sensitive)
            .build()?;
        Ok(Self { pattern })
    }

    /// Character spans of every non-empty occurrence in `path`, or `None`
    /// when the path does not match. A pattern that only matches the empty
    /// string (`^`, `\b`) still matches, with no spans.
    pub fn match_spans(&self, path: &str) -> Option<Vec<Span>> {
        if !self.pattern.is_match(path) {
            return None;
        }
        let mut spans = Vec::new();
        let mut chars_before = 0;
        let mut last_byte = 0;
        for m in self.pattern.find_iter(path) {
            if m.is_empty() {
                continue;
            }
            chars_before += path[last_byte..m.start()].chars().count();
            let len = m.as_str().chars().count();
            spans.push(Span::new(chars_before, chars_before + len));
            chars_before += len;
            last_byte = m.end();
        }
        Some(spans)
    }

    /// Path matches over `files` in order, at most `budget` of them.
    pub fn find(&self, files: &[String], budget: usize) -> Vec<SearchResult> {
        files
            .iter()
            .filter_map(|path| {
                self.match_spans(path)
                    .map(|spans| SearchResult::path_match(path, spans))
            })
            .take(budget)
            .collect()
    }
}
