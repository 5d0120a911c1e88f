#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Scratch repository with a fixed committer identity.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        let repo = Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        };
        repo.git(&["init", "-q"]);
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directories");
        }
        fs::write(path, content).expect("Failed to write test file");
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.dir.path().join(rel)).expect("Failed to remove test file");
    }

    #[cfg(unix)]
    pub fn symlink(&self, target: &str, rel: &str) {
        std::os::unix::fs::symlink(target, self.dir.path().join(rel))
            .expect("Failed to create symlink");
    }

    /// Stages everything and commits, returning the new commit id.
    pub fn commit(&self, message: &str) -> String {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "--no-verify", "-m", message]);
        self.git(&["rev-parse", "HEAD"]).trim().to_string()
    }

    pub fn git(&self, args: &[&str]) -> String {
        let out = Command::new("git")
            .arg("-C")
            .arg(self.dir.path())
            .args(["-c", "commit.gpgsign=false", "-c", "core.autocrlf=false"])
            .args(args)
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .output()
            .expect("Failed to run git");
        assert!(
            out.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).into_owned()
    }

    /// Whether this git was built with PCRE support for `grep -P`.
    pub fn supports_pcre(&self) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(self.dir.path())
            .args(["grep", "-q", "-P", "-e", "x"])
            .output()
            .map(|out| matches!(out.status.code(), Some(0) | Some(1)))
            .unwrap_or(false)
    }

    pub fn file(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }
}

/// Two commits: the second edits `src/lib.rs`, adds `src/new_foo.rs` and
/// deletes `README.md`.
pub fn two_commit_repo() -> (TestRepo, String, String) {
    let repo = TestRepo::new();
    repo.write("README.md", "hello world\nfoo bar\n");
    repo.write("src/lib.rs", "fn foo() {}\nlet x = 1;\n");
    repo.write("docs/guide.txt", "nothing to see\n");
    let first = repo.commit("first");

    repo.write("src/lib.rs", "fn foo() {}\nlet x = 1;\nlet foo = 2;\n");
    repo.write("src/new_foo.rs", "// empty\n");
    repo.remove("README.md");
    let second = repo.commit("second");

    (repo, first, second)
}
