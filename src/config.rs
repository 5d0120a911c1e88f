use crate::git::Git;
use crate::search::executor::DEFAULT_MAX_ARGS_BYTES;
use crate::search::{file_filter, GitGrep, SearchEngine, SearchOptions, DEFAULT_LIMIT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchDefaults,

    #[serde(default)]
    pub git: GitConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    pub limit: usize,
    pub context_lines: usize,
    pub case_sensitive: bool,
    pub regex: bool,
    /// Paths containing any of these substrings are never searched.
    pub exclude: Vec<String>,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            context_lines: 0,
            case_sensitive: true,
            regex: false,
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_git_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_max_args_bytes")]
    pub max_args_bytes: usize,
}

fn default_git_binary() -> PathBuf {
    PathBuf::from("git")
}
fn default_max_args_bytes() -> usize {
    DEFAULT_MAX_ARGS_BYTES
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            max_args_bytes: default_max_args_bytes(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        match Self::find_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn find_config_path() -> Option<PathBuf> {
        if let Some(xdg_config) = dirs::config_dir() {
            let xdg_path = xdg_config.join("revgrep/config.toml");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let home_path = home.join(".revgrep.toml");
            if home_path.exists() {
                return Some(home_path);
            }
        }

        let current_path = Path::new(".revgrep.toml");
        if current_path.exists() {
            return Some(current_path.to_path_buf());
        }

        None
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Options for one query, seeded from the configured defaults.
    pub fn search_options(&self) -> SearchOptions {
        let mut options = SearchOptions {
            limit: self.search.limit,
            context_lines: self.search.context_lines,
            case_sensitive: self.search.case_sensitive,
            regex: self.search.regex,
            ..Default::default()
        };
        if !self.search.exclude.is_empty() {
            let exclude = self.search.exclude.clone();
            options.file_filter = Some(file_filter(move |path| {
                Ok(!exclude.iter().any(|pattern| path.contains(pattern.as_str())))
            }));
        }
        options
    }

    pub fn engine(&self) -> SearchEngine {
        let git = Git::with_binary(&self.git.binary);
        let grep = GitGrep::new(git.clone()).with_max_args_bytes(self.git.max_args_bytes);
        SearchEngine::with_collaborators(Box::new(git), Box::new(grep))
    }
}
