//! Process lifecycle for one workspace directory.
//!
//! Opening a workspace creates its directories, loads `config.json`, and
//! initializes the record store. Nothing is touched until `open` is called.
use crate::config::{self, CapabilityEnv, WorkspaceConfig};
use crate::paths::WorkspacePaths;
use crate::pipeline::Pipeline;
use crate::stage_log::StageLog;
use crate::stages::Stages;
use crate::store::ArticleStore;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub struct Workspace {
    paths: WorkspacePaths,
    config: WorkspaceConfig,
    store: ArticleStore,
}

impl Workspace {
    pub fn open(root: PathBuf) -> Result<Self> {
        let paths = WorkspacePaths::new(root);
        paths.ensure_dirs()?;
        let config = config::load_config(&paths)?;
        let db_path = paths.db_path();
        let store = ArticleStore::open(&db_path)
            .with_context(|| format!("open database {}", db_path.display()))?;
        store.init().context("initialize database schema")?;
        tracing::debug!(root = %paths.root().display(), "workspace opened");
        Ok(Self {
            paths,
            config,
            store,
        })
    }

    /// Write a config stub (unless one exists and `force` is false) and open.
    pub fn init(root: PathBuf, force: bool) -> Result<(Self, bool)> {
        let paths = WorkspacePaths::new(root.clone());
        paths.ensure_dirs()?;
        let wrote_config = force || !paths.config_path().exists();
        if wrote_config {
            config::write_config(&paths, &config::default_config())?;
        }
        Ok((Self::open(root)?, wrote_config))
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn store(&self) -> &ArticleStore {
        &self.store
    }

    /// Wire stages from config plus environment. `lm_override` is the `--lm` flag.
    pub fn stages(&self, lm_override: Option<&str>) -> Result<Stages> {
        config::build_stages(&self.config, lm_override, &CapabilityEnv::from_env())
    }

    pub fn pipeline(&self, stages: Stages) -> Pipeline<'_> {
        Pipeline::new(&self.store, stages, self.paths.content_dir())
            .with_stage_log(StageLog::new(self.paths.stage_log_path()))
    }
}
