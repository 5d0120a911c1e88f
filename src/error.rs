use std::io;
use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum RevgrepError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to stat file '{}': {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to resolve file list for revision '{revision}': {source}")]
    RevisionResolution {
        revision: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to checkout revision '{revision}': {source}")]
    Checkout {
        revision: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to evaluate file '{path}': {source}")]
    Filter {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to compile query: {0}")]
    QueryCompile(#[from] regex::Error),

    #[error("Failed to execute content search: {0}")]
    Execution(String),

    #[error("Malformed search output at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("Invalid search options: {0}")]
    InvalidOptions(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl RevgrepError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        RevgrepError::Parse {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RevgrepError>;
