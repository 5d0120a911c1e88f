use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::fmt;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Repository to search. Its working tree is checked out to the searched revision.
    #[clap(long, default_value = ".")]
    pub repo: PathBuf,

    #[clap(long, value_parser, default_value_t = false)]
    pub verbose: bool,

    #[clap(long, value_parser)]
    pub log: Option<PathBuf>,

    /// Config file to use instead of the default locations.
    #[clap(long, value_parser)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search file paths and contents at a revision
    Search {
        query: String,

        /// Revision to search
        #[clap(long, default_value = "HEAD")]
        rev: String,

        /// Only search files changed between this revision and --rev
        #[clap(long)]
        base: Option<String>,

        #[clap(short = 'i', long, default_value_t = false)]
        ignore_case: bool,

        #[clap(long, default_value_t = false)]
        regex: bool,

        #[clap(long)]
        limit: Option<usize>,

        #[clap(short = 'C', long)]
        context: Option<usize>,

        /// Skip matching against file paths
        #[clap(long, default_value_t = false)]
        no_path: bool,

        /// Skip matching against file contents
        #[clap(long, default_value_t = false)]
        no_content: bool,

        /// Exclude paths containing this substring (repeatable)
        #[clap(long, value_parser)]
        exclude: Vec<String>,

        #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print shell completions
    Completions {
        #[clap(value_enum)]
        shell: Shell,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
