//! Streaming parser for highlight-annotated `git grep` output.
//!
//! The executor runs `git grep -z -n --color=always`, so every output line
//! is one of:
//!
//! * `path NUL lineno NUL text` (or `path NUL text` when numbering is off),
//! * `--` between non-adjacent hunks when context is requested.
//!
//! Matched lines are recognised by their highlighted spans; everything else
//! is context.
use crate::error::{Result, RevgrepError};
use crate::search::highlight::{self, Highlighted};
use crate::search::{ContextLine, SearchResult};
use log::debug;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::io::BufRead;

/// Maximum number of characters in a snippet line. Matched lines longer than
/// this are not returned; context lines are cut down to it.
pub const SNIPPET_LINE_LENGTH_MAX: usize = 300;

const HUNK_SEPARATOR: &str = "--";

/// Content matches parsed from one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMatches {
    pub results: Vec<SearchResult>,
    /// Matched lines seen up to the point where parsing stopped.
    pub matching_lines: usize,
}

#[derive(Debug, Clone)]
pub struct StreamParser {
    budget: usize,
    context_lines: usize,
    max_line_length: usize,
}

enum Record<'a> {
    Blank,
    HunkBreak,
    Line {
        path: Cow<'a, str>,
        number: Option<usize>,
        text: Cow<'a, str>,
    },
}

impl StreamParser {
    pub fn new(budget: usize, context_lines: usize) -> Self {
        Self {
            budget,
            context_lines,
            max_line_length: SNIPPET_LINE_LENGTH_MAX,
        }
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Consumes `reader` until the stream ends or the budget is spent.
    pub fn parse<R: BufRead>(&self, mut reader: R) -> Result<ParsedMatches> {
        let mut state = ParserState::new(self);
        if self.budget == 0 {
            return Ok(state.finish());
        }

        let mut buf = Vec::new();
        let mut raw_line = 0usize;
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| RevgrepError::Execution(format!("failed to read output: {e}")))?;
            if read == 0 {
                break;
            }
            raw_line += 1;

            let record = parse_record(trim_line_ending(&buf), raw_line)?;
            if !state.feed(record, raw_line)? {
                debug!("Stopping after {raw_line} output lines, budget reached");
                break;
            }
        }

        Ok(state.finish())
    }
}

struct ParserState<'p> {
    parser: &'p StreamParser,
    current_file: Option<String>,
    line_number: usize,
    before: VecDeque<ContextLine>,
    /// Results still collecting after-context, by index into `results`.
    pending: Vec<usize>,
    results: Vec<SearchResult>,
    matching_lines: usize,
}

impl<'p> ParserState<'p> {
    fn new(parser: &'p StreamParser) -> Self {
        Self {
            parser,
            current_file: None,
            line_number: 0,
            before: VecDeque::with_capacity(parser.context_lines),
            pending: Vec::new(),
            results: Vec::new(),
            matching_lines: 0,
        }
    }

    fn budget_spent(&self) -> bool {
        self.results.len() >= self.parser.budget
    }

    fn close_hunk(&mut self) {
        self.before.clear();
        self.pending.clear();
    }

    /// Returns false once nothing more needs to be read.
    fn feed(&mut self, record: Record<'_>, raw_line: usize) -> Result<bool> {
        let (path, number, text) = match record {
            Record::Blank => return Ok(true),
            Record::HunkBreak => {
                self.close_hunk();
                return Ok(!self.budget_spent());
            }
            Record::Line { path, number, text } => (path, number, text),
        };

        if self.current_file.as_deref() != Some(&*path) {
            self.close_hunk();
            self.current_file = Some(path.to_string());
            self.line_number = 0;
        }
        self.line_number = number.unwrap_or(self.line_number + 1);

        if self.budget_spent() {
            // Only trailing context for the last matches is still wanted.
            let line = self.context_line(highlight::strip(&text));
            self.attach_after_context(&line);
            return Ok(!self.pending.is_empty());
        }

        let highlighted = highlight::scan(&text)
            .map_err(|e| RevgrepError::parse(raw_line, e.to_string()))?;
        let line = self.context_line(highlighted.text.clone());
        self.attach_after_context(&line);

        if highlighted.is_match() {
            self.record_match(&path, highlighted);
        }

        if self.parser.context_lines > 0 {
            self.before.push_back(line);
            if self.before.len() > self.parser.context_lines {
                self.before.pop_front();
            }
        }

        Ok(!(self.budget_spent() && self.pending.is_empty()))
    }

    fn record_match(&mut self, path: &str, highlighted: Highlighted) {
        let length = highlighted.char_len();
        if length > self.parser.max_line_length {
            debug!(
                "Dropping match at {path}:{} ({length} characters)",
                self.line_number
            );
            return;
        }

        self.matching_lines += 1;
        let mut result = SearchResult::content_match(
            path,
            self.line_number,
            highlighted.text,
            highlighted.spans,
        );
        result.context_before = self.before.iter().cloned().collect();
        self.results.push(result);
        if self.parser.context_lines > 0 {
            self.pending.push(self.results.len() - 1);
        }
    }

    fn attach_after_context(&mut self, line: &ContextLine) {
        let wanted = self.parser.context_lines;
        for &idx in &self.pending {
            self.results[idx].context_after.push(line.clone());
        }
        let results = &self.results;
        self.pending
            .retain(|&idx| results[idx].context_after.len() < wanted);
    }

    fn context_line(&self, text: String) -> ContextLine {
        ContextLine {
            line_number: self.line_number,
            text: truncate_chars(text, self.parser.max_line_length),
        }
    }

    fn finish(self) -> ParsedMatches {
        debug!(
            "Parsed {} content matches from {} matching lines",
            self.results.len(),
            self.matching_lines
        );
        ParsedMatches {
            results: self.results,
            matching_lines: self.matching_lines,
        }
    }
}

fn parse_record(line: &[u8], raw_line: usize) -> Result<Record<'_>> {
    let Some(name_end) = memchr::memchr(0, line) else {
        if line.is_empty() {
            return Ok(Record::Blank);
        }
        let stripped = highlight::strip(&String::from_utf8_lossy(line));
        if stripped == HUNK_SEPARATOR {
            return Ok(Record::HunkBreak);
        }
        return Err(RevgrepError::parse(
            raw_line,
            format!("expected a file record, found {stripped:?}"),
        ));
    };

    let path = decode_field(&line[..name_end]);
    if path.is_empty() {
        return Err(RevgrepError::parse(raw_line, "record without a file name"));
    }

    let rest = &line[name_end + 1..];
    let (number, text) = match memchr::memchr(0, rest) {
        Some(number_end) => {
            let field = decode_field(&rest[..number_end]);
            match field.parse::<usize>() {
                Ok(n) if n > 0 => (Some(n), &rest[number_end + 1..]),
                _ => {
                    return Err(RevgrepError::parse(
                        raw_line,
                        format!("invalid line number {field:?}"),
                    ))
                }
            }
        }
        None => (None, rest),
    };

    Ok(Record::Line {
        path,
        number,
        text: String::from_utf8_lossy(text),
    })
}

/// Decodes a header field, dropping any colour it was wrapped in.
fn decode_field(bytes: &[u8]) -> Cow<'_, str> {
    let text = String::from_utf8_lossy(bytes);
    if text.contains('\u{1b}') {
        Cow::Owned(highlight::strip(&text))
    } else {
        text
    }
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    }
}
