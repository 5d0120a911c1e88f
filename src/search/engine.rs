//! Core search engine: resolves the file set of a revision and runs the path
//! and content stages under one result budget.
use crate::admission::admit_files;
use crate::error::{Result, RevgrepError};
use crate::git::{Git, RevisionSource};
use crate::search::executor::{ContentQuery, ContentSearcher, GitGrep};
use crate::search::path::PathMatcher;
use crate::search::streaming::StreamParser;
use crate::search::{SearchOptions, SearchOutcome};
use log::{debug, info};
use std::path::Path;

/// Main search engine that coordinates all search operations.
///
/// A search checks the requested revision out into the repository's working
/// tree. Two searches must never run concurrently against the same
/// repository directory.
pub struct SearchEngine {
    revisions: Box<dyn RevisionSource>,
    content: Box<dyn ContentSearcher>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::with_git(Git::new())
    }

    pub fn with_git(git: Git) -> Self {
        Self::with_collaborators(Box::new(git.clone()), Box::new(GitGrep::new(git)))
    }

    pub fn with_collaborators(
        revisions: Box<dyn RevisionSource>,
        content: Box<dyn ContentSearcher>,
    ) -> Self {
        Self { revisions, content }
    }

    /// Finds `query` in the paths and/or contents of `repo` at `revision`.
    ///
    /// Path matches come first, then content matches, in arrival order. Any
    /// failure aborts the whole search.
    pub fn search(
        &self,
        repo: &Path,
        revision: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchOutcome> {
        options.validate()?;
        if query.is_empty() {
            return Err(RevgrepError::InvalidOptions(
                "query must not be empty".to_string(),
            ));
        }

        // Compiled up front so an invalid pattern fails before any git call,
        // whichever stages are enabled.
        let matcher = PathMatcher::compile(query, options.case_sensitive, options.regex)?;

        let candidates = self.candidate_files(repo, revision, options)?;
        self.checkout(repo, revision)?;
        let files = admit_files(repo, &candidates, options.file_filter.as_ref())?;
        info!(
            "Searching {} of {} files at {revision}",
            files.len(),
            candidates.len()
        );

        let mut outcome = SearchOutcome::default();

        if options.search_path {
            let path_results = matcher.find(&files, options.limit);
            debug!("Found {} path matches", path_results.len());
            outcome.total_matches += path_results.len();
            outcome.results.extend(path_results);
        }

        if options.search_content && outcome.total_matches < options.limit {
            if files.is_empty() {
                debug!("No admitted files, skipping content search");
            } else {
                let budget = options.limit - outcome.total_matches;
                let content_query = ContentQuery {
                    pattern: query.to_string(),
                    case_sensitive: options.case_sensitive,
                    regex: options.regex,
                    context_lines: options.context_lines,
                };
                let stream = self.content.execute(repo, &files, &content_query)?;
                let parsed = StreamParser::new(budget, options.context_lines).parse(stream)?;
                debug!(
                    "Found {} content matches on {} lines",
                    parsed.results.len(),
                    parsed.matching_lines
                );
                outcome.total_matches += parsed.matching_lines;
                outcome.results.extend(parsed.results);
            }
        }

        info!(
            "Search for {query:?} at {revision} returned {} results ({} matches)",
            outcome.results.len(),
            outcome.total_matches
        );
        Ok(outcome)
    }

    fn candidate_files(
        &self,
        repo: &Path,
        revision: &str,
        options: &SearchOptions,
    ) -> Result<Vec<String>> {
        let listed = match &options.base_revision {
            None => self.revisions.list_files(repo, revision),
            Some(base) => self.revisions.list_changed_files(repo, revision, base),
        };
        listed.map_err(|e| RevgrepError::RevisionResolution {
            revision: match &options.base_revision {
                None => revision.to_string(),
                Some(base) => format!("{base}..{revision}"),
            },
            source: Box::new(e),
        })
    }

    fn checkout(&self, repo: &Path, revision: &str) -> Result<()> {
        let args = ["checkout", "--quiet", "--end-of-options", revision].map(String::from);
        self.revisions
            .run(repo, &args)
            .map_err(|e| RevgrepError::Checkout {
                revision: revision.to_string(),
                source: Box::new(e),
            })?;
        debug!("Checked out {revision} in {}", repo.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRevisionSource;
    use crate::search::{MatchKind, SearchResult};
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::io::{BufRead, Cursor};
    use std::rc::Rc;
    use tempfile::{tempdir, TempDir};

    /// Content searcher replaying a canned stream.
    #[derive(Clone, Default)]
    struct FakeGrep {
        output: String,
        fail: bool,
        calls: Rc<Cell<usize>>,
        files: Rc<RefCell<Vec<String>>>,
    }

    impl ContentSearcher for FakeGrep {
        fn execute(
            &self,
            _repo: &Path,
            files: &[String],
            _query: &ContentQuery,
        ) -> Result<Box<dyn BufRead>> {
            self.calls.set(self.calls.get() + 1);
            *self.files.borrow_mut() = files.to_vec();
            if self.fail {
                return Err(RevgrepError::Execution("git grep exited with 128".into()));
            }
            Ok(Box::new(Cursor::new(self.output.clone().into_bytes())))
        }
    }

    fn repo_with(files: &[&str]) -> TempDir {
        let dir = tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, "content").unwrap();
        }
        dir
    }

    fn listing(files: &[&str]) -> MockRevisionSource {
        let files: Vec<String> = files.iter().map(|f| f.to_string()).collect();
        let mut git = MockRevisionSource::new();
        git.expect_list_files()
            .returning(move |_, _| Ok(files.clone()));
        git.expect_list_changed_files().never();
        git.expect_run().returning(|_, _| Ok(String::new()));
        git
    }

    fn matched(path: &str, line: usize) -> String {
        format!("{path}\0{line}\0a \x1b[1;31mfoo\x1b[m b\n")
    }

    fn engine(git: MockRevisionSource, grep: &FakeGrep) -> SearchEngine {
        SearchEngine::with_collaborators(Box::new(git), Box::new(grep.clone()))
    }

    fn options(limit: usize) -> SearchOptions {
        SearchOptions {
            limit,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_matches_anywhere() {
        let repo = repo_with(&["a.txt", "b/c.txt"]);
        let grep = FakeGrep::default();
        let outcome = engine(listing(&["a.txt", "b/c.txt"]), &grep)
            .search(repo.path(), "R", "foo", &options(10))
            .unwrap();

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.total_matches, 0);
        assert_eq!(grep.calls.get(), 1);
        assert_eq!(*grep.files.borrow(), vec!["a.txt", "b/c.txt"]);
    }

    #[test]
    fn test_path_matches_precede_content_matches() {
        let repo = repo_with(&["a.txt", "src/foo.rs"]);
        let grep = FakeGrep {
            output: matched("src/foo.rs", 3) + &matched("a.txt", 1),
            ..Default::default()
        };
        let outcome = engine(listing(&["a.txt", "src/foo.rs"]), &grep)
            .search(repo.path(), "R", "foo", &options(10))
            .unwrap();

        let kinds: Vec<_> = outcome.results.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![MatchKind::PathMatch, MatchKind::ContentMatch, MatchKind::ContentMatch]
        );
        assert_eq!(outcome.results[0].path, "src/foo.rs");
        assert_eq!(outcome.results[1].path, "src/foo.rs");
        assert_eq!(outcome.total_matches, 3);
    }

    #[test]
    fn test_path_matches_exhaust_budget() {
        let repo = repo_with(&["foo1", "foo2", "foo3"]);
        let grep = FakeGrep {
            output: matched("foo1", 1),
            ..Default::default()
        };
        let outcome = engine(listing(&["foo1", "foo2", "foo3"]), &grep)
            .search(repo.path(), "R", "foo", &options(2))
            .unwrap();

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.iter().all(|r| r.kind == MatchKind::PathMatch));
        assert_eq!(outcome.total_matches, 2);
        assert_eq!(grep.calls.get(), 0);
    }

    #[test]
    fn test_content_gets_remaining_budget() {
        let repo = repo_with(&["foo.txt", "a.txt"]);
        let output: String = (1..=5).map(|n| matched("a.txt", n)).collect();
        let grep = FakeGrep {
            output,
            ..Default::default()
        };
        let outcome = engine(listing(&["foo.txt", "a.txt"]), &grep)
            .search(repo.path(), "R", "foo", &options(3))
            .unwrap();

        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.results[0].kind, MatchKind::PathMatch);
        assert_eq!(outcome.results[2].line_number, Some(2));
        assert_eq!(outcome.total_matches, 3);
    }

    #[test]
    fn test_path_search_disabled() {
        let repo = repo_with(&["foo.txt"]);
        let grep = FakeGrep {
            output: matched("foo.txt", 1),
            ..Default::default()
        };
        let opts = SearchOptions {
            search_path: false,
            ..Default::default()
        };
        let outcome = engine(listing(&["foo.txt"]), &grep)
            .search(repo.path(), "R", "foo", &opts)
            .unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.kind == MatchKind::ContentMatch));
    }

    #[test]
    fn test_content_search_disabled() {
        let repo = repo_with(&["foo.txt"]);
        let grep = FakeGrep {
            output: matched("foo.txt", 1),
            ..Default::default()
        };
        let opts = SearchOptions {
            search_content: false,
            ..Default::default()
        };
        let outcome = engine(listing(&["foo.txt"]), &grep)
            .search(repo.path(), "R", "foo", &opts)
            .unwrap();

        assert_eq!(outcome.results, vec![SearchResult::path_match("foo.txt", vec![crate::search::Span::new(0, 3)])]);
        assert_eq!(grep.calls.get(), 0);
    }

    #[test]
    fn test_base_revision_limits_to_changed_files() {
        let repo = repo_with(&["a.txt", "b.txt", "c.txt"]);
        let mut git = MockRevisionSource::new();
        git.expect_list_files().never();
        git.expect_list_changed_files()
            .withf(|_, revision, base| revision == "R" && base == "B")
            .times(1)
            .returning(|_, _, _| Ok(vec!["b.txt".to_string()]));
        git.expect_run().returning(|_, _| Ok(String::new()));
        let grep = FakeGrep::default();

        let opts = SearchOptions {
            base_revision: Some("B".to_string()),
            ..Default::default()
        };
        engine(git, &grep)
            .search(repo.path(), "R", "foo", &opts)
            .unwrap();

        assert_eq!(*grep.files.borrow(), vec!["b.txt"]);
    }

    #[test]
    fn test_checks_out_target_revision() {
        let repo = repo_with(&["a.txt"]);
        let mut git = MockRevisionSource::new();
        git.expect_list_files()
            .returning(|_, _| Ok(vec!["a.txt".to_string()]));
        git.expect_run()
            .withf(|_, args| {
                args.iter()
                    .map(String::as_str)
                    .eq(["checkout", "--quiet", "--end-of-options", "deadbeef"])
            })
            .times(1)
            .returning(|_, _| Ok(String::new()));

        engine(git, &FakeGrep::default())
            .search(repo.path(), "deadbeef", "foo", &options(10))
            .unwrap();
    }

    #[test]
    fn test_bad_revision_is_resolution_error() {
        let repo = repo_with(&[]);
        let mut git = MockRevisionSource::new();
        git.expect_list_files().returning(|_, _| {
            Err(RevgrepError::Git {
                command: "ls-tree".into(),
                stderr: "fatal: Not a valid object name nope".into(),
            })
        });
        git.expect_run().never();
        let grep = FakeGrep::default();

        let err = engine(git, &grep)
            .search(repo.path(), "nope", "foo", &options(10))
            .unwrap_err();
        assert!(matches!(err, RevgrepError::RevisionResolution { .. }), "got {err:?}");
        assert_eq!(grep.calls.get(), 0);
    }

    #[test]
    fn test_checkout_failure_aborts() {
        let repo = repo_with(&["a.txt"]);
        let mut git = MockRevisionSource::new();
        git.expect_list_files()
            .returning(|_, _| Ok(vec!["a.txt".to_string()]));
        git.expect_run().returning(|_, _| {
            Err(RevgrepError::Git {
                command: "checkout".into(),
                stderr: "error: pathspec 'R' did not match".into(),
            })
        });
        let grep = FakeGrep::default();

        let err = engine(git, &grep)
            .search(repo.path(), "R", "a", &options(10))
            .unwrap_err();
        assert!(matches!(err, RevgrepError::Checkout { .. }));
        assert_eq!(grep.calls.get(), 0);
    }

    #[test]
    fn test_invalid_regex_is_compile_error() {
        let repo = repo_with(&["a.txt"]);
        let opts = SearchOptions {
            regex: true,
            ..Default::default()
        };
        let err = engine(listing(&["a.txt"]), &FakeGrep::default())
            .search(repo.path(), "R", "foo(", &opts)
            .unwrap_err();
        assert!(matches!(err, RevgrepError::QueryCompile(_)));
    }

    #[test]
    fn test_invalid_regex_fails_with_path_stage_disabled() {
        let mut git = MockRevisionSource::new();
        git.expect_list_files().never();
        git.expect_run().never();
        let grep = FakeGrep::default();
        let opts = SearchOptions {
            regex: true,
            search_path: false,
            ..Default::default()
        };

        let err = engine(git, &grep)
            .search(Path::new("."), "R", "foo(", &opts)
            .unwrap_err();
        assert!(matches!(err, RevgrepError::QueryCompile(_)), "got {err:?}");
        assert_eq!(grep.calls.get(), 0);
    }

    #[test]
    fn test_filter_error_aborts() {
        let repo = repo_with(&["a.txt"]);
        let grep = FakeGrep::default();
        let opts = SearchOptions::default().with_file_filter(|_| Err("denied".into()));
        let err = engine(listing(&["a.txt"]), &grep)
            .search(repo.path(), "R", "foo", &opts)
            .unwrap_err();
        assert!(matches!(err, RevgrepError::Filter { .. }));
        assert_eq!(grep.calls.get(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_and_reserved_name_never_searched() {
        let repo = repo_with(&["a.txt", "--"]);
        std::os::unix::fs::symlink("a.txt", repo.path().join("link")).unwrap();
        let grep = FakeGrep::default();
        let opts = SearchOptions::default().with_file_filter(|_| Ok(true));

        engine(listing(&["link", "--", "a.txt"]), &grep)
            .search(repo.path(), "R", "link", &opts)
            .unwrap();
        assert_eq!(*grep.files.borrow(), vec!["a.txt"]);
    }

    #[test]
    fn test_execution_failure_returns_no_results() {
        let repo = repo_with(&["a.txt"]);
        let grep = FakeGrep {
            fail: true,
            ..Default::default()
        };
        let err = engine(listing(&["a.txt"]), &grep)
            .search(repo.path(), "R", "foo", &options(10))
            .unwrap_err();
        assert!(matches!(err, RevgrepError::Execution(_)));
    }

    #[test]
    fn test_parse_failure_returns_no_results() {
        let repo = repo_with(&["foo.txt"]);
        let grep = FakeGrep {
            output: "foo.txt\x001\x00\x1b[31munclosed\n".into(),
            ..Default::default()
        };
        let err = engine(listing(&["foo.txt"]), &grep)
            .search(repo.path(), "R", "foo", &options(10))
            .unwrap_err();
        assert!(matches!(err, RevgrepError::Parse { .. }));
    }

    #[test]
    fn test_empty_admitted_set_skips_content() {
        let repo = repo_with(&[]);
        let grep = FakeGrep::default();
        let outcome = engine(listing(&[]), &grep)
            .search(repo.path(), "R", "foo", &options(10))
            .unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(grep.calls.get(), 0);
    }

    #[test]
    fn test_invalid_options_fail_before_git() {
        let mut git = MockRevisionSource::new();
        git.expect_list_files().never();
        git.expect_run().never();

        let err = engine(git, &FakeGrep::default())
            .search(Path::new("."), "R", "foo", &options(0))
            .unwrap_err();
        assert!(matches!(err, RevgrepError::InvalidOptions(_)));
    }

    #[test]
    fn test_case_insensitive_path_match() {
        let repo = repo_with(&["README.md"]);
        let opts = SearchOptions {
            case_sensitive: false,
            search_content: false,
            ..Default::default()
        };
        let outcome = engine(listing(&["README.md"]), &FakeGrep::default())
            .search(repo.path(), "R", "readme", &opts)
            .unwrap();
        assert_eq!(outcome.results.len(), 1);
    }
}
