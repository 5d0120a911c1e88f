//! Rendering of search outcomes for the command line.
pub mod formats;

use crate::cli::OutputFormat;
use crate::search::SearchOutcome;

pub use formats::{JsonFormatter, TextFormatter};

/// Trait for output formatters
pub trait OutputFormatterTrait {
    fn format(&self, outcome: &SearchOutcome, query: &str, revision: &str) -> String;
    fn name(&self) -> &str;
}

/// Picks the formatter for `format`. Text is coloured only on a terminal.
pub fn formatter_for(format: OutputFormat) -> Box<dyn OutputFormatterTrait> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new(is_terminal::is_terminal(
            std::io::stdout(),
        ))),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
    }
}
