//! Revision source backed by the `git` command line.

use crate::error::{Result, RevgrepError};
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Access to the files of a repository at a given revision.
#[cfg_attr(test, mockall::automock)]
pub trait RevisionSource {
    /// Lists every file tracked at `revision`, in tree order.
    fn list_files(&self, repo: &Path, revision: &str) -> Result<Vec<String>>;

    /// Lists the files that differ between `base` and `revision` and still
    /// exist at `revision`.
    fn list_changed_files(&self, repo: &Path, revision: &str, base: &str) -> Result<Vec<String>>;

    /// Runs an arbitrary command against the repository and returns its stdout.
    fn run(&self, repo: &Path, args: &[String]) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct Git {
    binary: PathBuf,
}

impl Default for Git {
    fn default() -> Self {
        Self::new()
    }
}

impl Git {
    pub fn new() -> Self {
        Self::with_binary("git")
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub(crate) fn command(&self, repo: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-C").arg(repo);
        cmd
    }

    fn output<S: AsRef<str>>(&self, repo: &Path, args: &[S]) -> Result<Vec<u8>> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        debug!("Running git {} in {}", args.join(" "), repo.display());

        let output = self.command(repo).args(&args).output()?;
        if !output.status.success() {
            return Err(RevgrepError::Git {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl RevisionSource for Git {
    fn list_files(&self, repo: &Path, revision: &str) -> Result<Vec<String>> {
        let stdout = self.output(repo, &ls_tree_args(revision))?;
        Ok(parse_ls_tree(&stdout))
    }

    fn list_changed_files(&self, repo: &Path, revision: &str, base: &str) -> Result<Vec<String>> {
        let stdout = self.output(repo, &diff_args(revision, base))?;
        Ok(split_nul(&stdout))
    }

    fn run(&self, repo: &Path, args: &[String]) -> Result<String> {
        let stdout = self.output(repo, args)?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

// Revisions come after `--end-of-options` so one starting with `-` is never
// read as a flag.
fn ls_tree_args(revision: &str) -> [&str; 6] {
    ["ls-tree", "-r", "-z", "--full-tree", "--end-of-options", revision]
}

fn diff_args<'a>(revision: &'a str, base: &'a str) -> [&'a str; 9] {
    [
        "diff",
        "--name-only",
        "-z",
        "--no-renames",
        "--diff-filter=d",
        "--end-of-options",
        base,
        revision,
        "--",
    ]
}

/// Keeps the blob entries of `git ls-tree -r -z` output. Submodules show up
/// as `commit` entries and are skipped.
fn parse_ls_tree(stdout: &[u8]) -> Vec<String> {
    stdout
        .split(|&b| b == 0)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let tab = memchr::memchr(b'\t', entry)?;
            let (meta, path) = (&entry[..tab], &entry[tab + 1..]);
            let kind = meta.split(|&b| b == b' ').nth(1)?;
            if kind != b"blob" {
                debug!("Skipping non-blob tree entry: {}", String::from_utf8_lossy(path));
                return None;
            }
            Some(String::from_utf8_lossy(path).into_owned())
        })
        .collect()
}

fn split_nul(stdout: &[u8]) -> Vec<String> {
    stdout
        .split(|&b| b == 0)
        .filter(|entry| !entry.is_empty())
        .map(|entry| String::from_utf8_lossy(entry).into_owned())
        .collect()
}
