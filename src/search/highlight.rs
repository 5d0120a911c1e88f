//! Extraction of highlighted spans from terminal-annotated text.
//!
//! Matches are delimited by SGR escape sequences (`ESC [ params m`). The
//! scanner does not care which colour is used: a run of adjacent sequences
//! whose last SGR sets any attribute opens a span, a run ending in a reset
//! closes it. Other CSI sequences (`ESC [ K` and friends) are stripped and
//! otherwise ignored.
use crate::search::Span;
use thiserror::Error;

const ESC: char = '\u{1b}';

/// SGR parameters that switch an attribute back off.
const RESET_PARAMS: &[&str] = &["", "0", "00", "22", "23", "24", "25", "27", "28", "29", "39", "49"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HighlightError {
    #[error("unterminated escape sequence at character {0}")]
    UnterminatedEscape(usize),

    #[error("highlight opened at character {0} is never closed")]
    UnclosedHighlight(usize),
}

/// Clean text of an annotated line and the character spans that were
/// highlighted in it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlighted {
    pub text: String,
    pub spans: Vec<Span>,
}

impl Highlighted {
    pub fn is_match(&self) -> bool {
        !self.spans.is_empty()
    }

    /// Length of the clean text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

enum Sequence {
    Sgr { reset: bool },
    Other,
}

pub fn scan(raw: &str) -> Result<Highlighted, HighlightError> {
    let mut out = Highlighted {
        text: String::with_capacity(raw.len()),
        spans: Vec::new(),
    };
    let mut chars = raw.chars().peekable();
    let mut clean_len = 0usize;
    let mut open: Option<usize> = None;
    // Last SGR of the current run of adjacent escapes.
    let mut run_sgr: Option<bool> = None;
    let mut in_run = false;

    while let Some(c) = chars.next() {
        if c == ESC && chars.peek() == Some(&'[') {
            chars.next();
            match read_csi(&mut chars) {
                Some(Sequence::Sgr { reset }) => run_sgr = Some(reset),
                Some(Sequence::Other) => {}
                None => return Err(HighlightError::UnterminatedEscape(clean_len)),
            }
            in_run = true;
            continue;
        }

        if in_run {
            apply_run(&mut out.spans, &mut open, run_sgr.take(), clean_len);
            in_run = false;
        }
        out.text.push(c);
        clean_len += 1;
    }
    if in_run {
        apply_run(&mut out.spans, &mut open, run_sgr.take(), clean_len);
    }

    match open {
        Some(start) => Err(HighlightError::UnclosedHighlight(start)),
        None => Ok(out),
    }
}

/// Strips every escape sequence, ignoring highlight structure.
pub fn strip(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ESC && chars.peek() == Some(&'[') {
            chars.next();
            let _ = read_csi(&mut chars);
            continue;
        }
        text.push(c);
    }
    text
}

fn apply_run(spans: &mut Vec<Span>, open: &mut Option<usize>, sgr: Option<bool>, at: usize) {
    let Some(reset) = sgr else {
        return;
    };
    if let Some(start) = open.take() {
        if start < at {
            spans.push(Span::new(start, at));
        }
    }
    if !reset {
        *open = Some(at);
    }
}

fn read_csi(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<Sequence> {
    let mut params = String::new();
    for c in chars.by_ref() {
        match c {
            '\u{30}'..='\u{3f}' | '\u{20}'..='\u{2f}' => params.push(c),
            'm' => {
                let reset = params
                    .split(';')
                    .all(|p| RESET_PARAMS.contains(&p));
                return Some(Sequence::Sgr { reset });
            }
            '\u{40}'..='\u{7e}' => return Some(Sequence::Other),
            _ => return None,
        }
    }
    None
}
