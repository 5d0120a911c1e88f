//! Content matching through `git grep`.
use crate::error::{Result, RevgrepError};
use crate::git::Git;
use log::{debug, warn};
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Stdio};
use std::thread::{self, JoinHandle};

/// Upper bound on the bytes of file arguments passed to one process.
pub const DEFAULT_MAX_ARGS_BYTES: usize = 128 * 1024;

/// Configuration pinned on every invocation so that user or repository
/// settings cannot change the shape of the stream.
const PINNED_CONFIG: &[&str] = &[
    "grep.column=false",
    "grep.fullName=false",
    "color.grep.matchSelected=bold red",
    "color.grep.matchContext=bold red",
];

/// Colour slots blanked so that only match highlights carry escapes.
const BLANKED_COLOR_SLOTS: &[&str] = &[
    "filename",
    "lineNumber",
    "column",
    "separator",
    "context",
    "selected",
    "function",
];

/// What to look for in file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    pub pattern: String,
    pub case_sensitive: bool,
    pub regex: bool,
    pub context_lines: usize,
}

/// Produces the raw highlight-annotated match stream for a set of files.
pub trait ContentSearcher {
    fn execute(
        &self,
        repo: &Path,
        files: &[String],
        query: &ContentQuery,
    ) -> Result<Box<dyn BufRead>>;
}

#[derive(Debug, Clone)]
pub struct GitGrep {
    git: Git,
    max_args_bytes: usize,
}

impl Default for GitGrep {
    fn default() -> Self {
        Self::new(Git::new())
    }
}

impl GitGrep {
    pub fn new(git: Git) -> Self {
        Self {
            git,
            max_args_bytes: DEFAULT_MAX_ARGS_BYTES,
        }
    }

    pub fn with_max_args_bytes(mut self, max_args_bytes: usize) -> Self {
        self.max_args_bytes = max_args_bytes.max(1);
        self
    }
}

impl ContentSearcher for GitGrep {
    fn execute(
        &self,
        repo: &Path,
        files: &[String],
        query: &ContentQuery,
    ) -> Result<Box<dyn BufRead>> {
        if files.is_empty() {
            return Err(RevgrepError::Execution("no files to search".to_string()));
        }

        let batches = batch_files(files, self.max_args_bytes);
        debug!(
            "Searching {} files in {} git grep invocation(s)",
            files.len(),
            batches.len()
        );

        let mut stream = GrepStream {
            git: self.git.clone(),
            repo: repo.to_path_buf(),
            args: grep_args(query),
            batches,
            current: None,
        };
        stream.start_next().map_err(|e| {
            RevgrepError::Execution(format!(
                "failed to run {}: {e}",
                self.git.binary().display()
            ))
        })?;

        Ok(Box::new(BufReader::new(stream)))
    }
}

/// Arguments up to and including `--`. File names follow as literal
/// pathspecs, so glob characters in a name never widen the searched set.
/// Regex queries use PCRE, the dialect closest to the `regex` crate that
/// the path stage compiles with.
fn grep_args(query: &ContentQuery) -> Vec<String> {
    let mut args = vec!["--literal-pathspecs".to_string()];
    for setting in PINNED_CONFIG {
        args.push("-c".to_string());
        args.push(setting.to_string());
    }
    for slot in BLANKED_COLOR_SLOTS {
        args.push("-c".to_string());
        args.push(format!("color.grep.{slot}="));
    }
    args.extend(
        ["grep", "--color=always", "--no-column", "-z", "-n", "-I"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.push(if query.regex { "-P" } else { "-F" }.to_string());
    if !query.case_sensitive {
        args.push("-i".to_string());
    }
    if query.context_lines > 0 {
        args.push(format!("-C{}", query.context_lines));
    }
    args.push("-e".to_string());
    args.push(query.pattern.clone());
    args.push("--".to_string());
    args
}

fn batch_files(files: &[String], max_bytes: usize) -> VecDeque<Vec<String>> {
    let mut batches = VecDeque::new();
    let mut batch = Vec::new();
    let mut size = 0;
    for file in files {
        let cost = file.len() + 1;
        if !batch.is_empty() && size + cost > max_bytes {
            batches.push_back(std::mem::take(&mut batch));
            size = 0;
        }
        batch.push(file.clone());
        size += cost;
    }
    if !batch.is_empty() {
        batches.push_back(batch);
    }
    batches
}

struct Running {
    child: Child,
    stdout: ChildStdout,
    /// Collects stderr while stdout is read, so a chatty child cannot fill
    /// the pipe and stall.
    stderr: Option<JoinHandle<String>>,
}

impl Running {
    fn finish(mut self) -> io::Result<()> {
        let status = self.child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        // 1 means "no match" for git grep.
        match status.code() {
            Some(0) | Some(1) => Ok(()),
            _ => Err(io::Error::other(format!(
                "git grep exited with {status}: {}",
                stderr.trim()
            ))),
        }
    }
}

fn drain(mut pipe: ChildStderr) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        let _ = pipe.read_to_string(&mut text);
        text
    })
}

/// Output of the batched invocations, chained. Each batch is spawned only
/// once the previous one is exhausted.
struct GrepStream {
    git: Git,
    repo: PathBuf,
    args: Vec<String>,
    batches: VecDeque<Vec<String>>,
    current: Option<Running>,
}

impl GrepStream {
    /// Spawns the next batch. Returns false when none are left.
    fn start_next(&mut self) -> io::Result<bool> {
        let Some(batch) = self.batches.pop_front() else {
            return Ok(false);
        };
        let mut child = self
            .git
            .command(&self.repo)
            .args(&self.args)
            .args(&batch)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("git grep stdout was not captured"))?;
        let stderr = child.stderr.take().map(drain);
        self.current = Some(Running {
            child,
            stdout,
            stderr,
        });
        Ok(true)
    }
}

impl Read for GrepStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if let Some(running) = self.current.as_mut() {
                let n = running.stdout.read(buf)?;
                if n > 0 || buf.is_empty() {
                    return Ok(n);
                }
                if let Some(done) = self.current.take() {
                    done.finish()?;
                }
            }
            if !self.start_next()? {
                return Ok(0);
            }
        }
    }
}

impl Drop for GrepStream {
    fn drop(&mut self) {
        if let Some(mut running) = self.current.take() {
            if let Err(e) = running.child.kill() {
                warn!("Failed to stop git grep: {e}");
            }
            let _ = running.child.wait();
        }
    }
}
