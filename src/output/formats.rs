//! Individual output format implementations
use crate::output::OutputFormatterTrait;
use crate::search::{MatchKind, SearchOutcome, Span};
use colored::*;
use serde_json::json;

/// Text formatter (default)
pub struct TextFormatter {
    use_color: bool,
}

impl TextFormatter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn highlight(&self, text: &str, spans: &[Span]) -> String {
        if !self.use_color || spans.is_empty() {
            return text.to_string();
        }
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        for span in spans {
            let end = span.end.min(chars.len());
            let start = span.start.min(end);
            out.extend(&chars[pos.min(start)..start]);
            let hit: String = chars[start..end].iter().collect();
            out.push_str(&hit.yellow().bold().to_string());
            pos = end;
        }
        out.extend(&chars[pos.min(chars.len())..]);
        out
    }

    fn dim(&self, text: String) -> String {
        if self.use_color {
            text.dimmed().to_string()
        } else {
            text
        }
    }
}

impl OutputFormatterTrait for TextFormatter {
    fn format(&self, outcome: &SearchOutcome, query: &str, revision: &str) -> String {
        let mut output = String::new();

        for result in &outcome.results {
            let snippet = self.highlight(&result.snippet, &result.match_spans);
            match (result.kind, result.line_number) {
                (MatchKind::ContentMatch, Some(line)) => {
                    for ctx in &result.context_before {
                        output.push_str(&self.dim(format!(
                            "{}-{}- {}",
                            result.path, ctx.line_number, ctx.text
                        )));
                        output.push('\n');
                    }
                    output.push_str(&format!("{}:{}: {snippet}\n", result.path, line));
                    for ctx in &result.context_after {
                        output.push_str(&self.dim(format!(
                            "{}-{}- {}",
                            result.path, ctx.line_number, ctx.text
                        )));
                        output.push('\n');
                    }
                }
                _ => output.push_str(&format!("{snippet}\n")),
            }
        }

        let summary = if outcome.results.is_empty() {
            format!("No matches for {query:?} at {revision}")
        } else {
            format!(
                "Found {} matches ({} shown) for {query:?} at {revision}",
                outcome.total_matches,
                outcome.results.len()
            )
        };
        if self.use_color {
            output.push_str(&summary.green().to_string());
        } else {
            output.push_str(&summary);
        }
        output.push('\n');
        output
    }

    fn name(&self) -> &str {
        "text"
    }
}

/// JSON formatter
pub struct JsonFormatter {
    pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl OutputFormatterTrait for JsonFormatter {
    fn format(&self, outcome: &SearchOutcome, query: &str, revision: &str) -> String {
        let result = json!({
            "query": query,
            "revision": revision,
            "total_matches": outcome.total_matches,
            "results": outcome.results,
        });

        let rendered = if self.pretty {
            serde_json::to_string_pretty(&result)
        } else {
            serde_json::to_string(&result)
        };
        rendered.unwrap_or_else(|_| "{}".to_string())
    }

    fn name(&self) -> &str {
        "json"
    }
}
