//! Typed paths into a workspace directory.
//!
//! ```text
//! <root>/config.json
//! <root>/workspace.db
//! <root>/content/          exported articles
//! <root>/stage_log.jsonl
//! ```
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const WORKSPACE_ENV: &str = "SEOWS_WORKSPACE";
const DEFAULT_DIR_NAME: &str = "seo-workspace";

#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `config.json` path.
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Return the SQLite database path.
    pub fn db_path(&self) -> PathBuf {
        self.root.join("workspace.db")
    }

    /// Return the `content/` directory that receives exported articles.
    pub fn content_dir(&self) -> PathBuf {
        self.root.join("content")
    }

    /// Return the `stage_log.jsonl` path.
    pub fn stage_log_path(&self) -> PathBuf {
        self.root.join("stage_log.jsonl")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        let content = self.content_dir();
        fs::create_dir_all(&content)
            .with_context(|| format!("create content dir {}", content.display()))
    }
}

/// Pick the workspace root: explicit flag, then `SEOWS_WORKSPACE`, then the
/// platform data dir, then `./seo-workspace`.
pub fn resolve_workspace_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = std::env::var_os(WORKSPACE_ENV).filter(|value| !value.is_empty()) {
        return PathBuf::from(path);
    }
    dirs::data_local_dir()
        .map(|dir| dir.join(DEFAULT_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR_NAME))
}
