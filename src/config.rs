//! Workspace configuration (`config.json`) and capability wiring.
//!
//! The config names the LM command for each stage and the image providers to
//! try. Secrets never live in the file: image credentials come from the
//! environment, and a provider without credentials is simply not wired.
use crate::paths::WorkspacePaths;
use crate::stages::{
    DataForSeoSearch, Enrichment, FreepikSearch, ImageEnricher, ImageSearch, LmCommand,
    LmOutline, LmResearch, LmWrite, Stage, Stages,
};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const LM_COMMAND_ENV: &str = "SEOWS_LM_COMMAND";
pub const FREEPIK_KEY_ENV: &str = "FREEPIK_API_KEY";
pub const DATAFORSEO_KEY_ENV: &str = "DATA_FOR_SEO_API_KEY";

fn default_outline_retries() -> usize {
    2
}

fn default_max_images() -> usize {
    5
}

fn default_providers() -> Vec<ImageProvider> {
    vec![ImageProvider::Freepik, ImageProvider::Dataforseo]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub schema_version: u32,
    /// Default LM command for every stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_command: Option<String>,
    #[serde(default)]
    pub stages: StageCommands,
    #[serde(default = "default_outline_retries")]
    pub outline_retries: usize,
    #[serde(default)]
    pub images: ImageConfig,
}

/// Per-stage LM command overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageCommands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<String>,
}

impl StageCommands {
    fn for_stage(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::Research => self.research.as_deref(),
            Stage::Outline => self.outline.as_deref(),
            Stage::Write => self.write.as_deref(),
            Stage::Enrich => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    /// Providers in the order they are tried.
    #[serde(default = "default_providers")]
    pub providers: Vec<ImageProvider>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_images: default_max_images(),
            providers: default_providers(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    Freepik,
    Dataforseo,
}

/// Values read from the process environment, kept apart so wiring is testable.
#[derive(Debug, Clone, Default)]
pub struct CapabilityEnv {
    pub lm_command: Option<String>,
    pub freepik_key: Option<String>,
    pub dataforseo_key: Option<String>,
}

impl CapabilityEnv {
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.trim().is_empty())
        };
        Self {
            lm_command: read(LM_COMMAND_ENV),
            freepik_key: read(FREEPIK_KEY_ENV),
            dataforseo_key: read(DATAFORSEO_KEY_ENV),
        }
    }
}

pub fn default_config() -> WorkspaceConfig {
    WorkspaceConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        lm_command: None,
        stages: StageCommands::default(),
        outline_retries: default_outline_retries(),
        images: ImageConfig::default(),
    }
}

/// Load `config.json`, falling back to defaults when the file is absent.
pub fn load_config(paths: &WorkspacePaths) -> Result<WorkspaceConfig> {
    let path = paths.config_path();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return Ok(default_config());
    }
    let bytes = fs::read(&path).with_context(|| format!("read config {}", path.display()))?;
    let config: WorkspaceConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

pub fn write_config(paths: &WorkspacePaths, config: &WorkspaceConfig) -> Result<()> {
    let path = paths.config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create workspace dir")?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize config")?;
    fs::write(&path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn validate_config(config: &WorkspaceConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    let commands = [
        ("lm_command", config.lm_command.as_deref()),
        ("stages.research", config.stages.research.as_deref()),
        ("stages.outline", config.stages.outline.as_deref()),
        ("stages.write", config.stages.write.as_deref()),
    ];
    for (label, command) in commands {
        if let Some(command) = command {
            if command.trim().is_empty() {
                return Err(anyhow!("{label} must be non-empty when set"));
            }
            shell_words::split(command)
                .with_context(|| format!("{label} is not a valid command line"))?;
        }
    }
    if config.images.max_images == 0 {
        return Err(anyhow!(
            "images.max_images must be at least 1 (remove providers to disable images)"
        ));
    }
    Ok(())
}

/// LM command for `stage`, highest priority first: CLI override, per-stage
/// config, workspace default, environment.
pub fn lm_command_for(
    config: &WorkspaceConfig,
    stage: Stage,
    cli_override: Option<&str>,
    env: &CapabilityEnv,
) -> Option<String> {
    cli_override
        .or_else(|| config.stages.for_stage(stage))
        .or(config.lm_command.as_deref())
        .or(env.lm_command.as_deref())
        .map(str::to_string)
}

fn resolve_lm_command(
    config: &WorkspaceConfig,
    stage: Stage,
    cli_override: Option<&str>,
    env: &CapabilityEnv,
) -> Result<LmCommand> {
    let command = lm_command_for(config, stage, cli_override, env).ok_or_else(|| {
        anyhow!(
            "no LM command configured for the {stage} stage; pass --lm, set lm_command in \
             config.json, or export {LM_COMMAND_ENV}"
        )
    })?;
    let args = shell_words::split(&command)
        .with_context(|| format!("parse LM command for {stage}: {command:?}"))?;
    let program = args
        .first()
        .ok_or_else(|| anyhow!("LM command for the {stage} stage is empty"))?;
    which::which(program)
        .with_context(|| format!("LM command {program:?} for the {stage} stage not found"))?;
    Ok(LmCommand::new(command))
}

/// Image providers with credentials, in configured order. None wired means
/// enrichment is absent.
pub fn build_enrichment(config: &WorkspaceConfig, env: &CapabilityEnv) -> Enrichment {
    let mut providers: Vec<Box<dyn ImageSearch>> = Vec::new();
    for provider in &config.images.providers {
        match provider {
            ImageProvider::Freepik => {
                if let Some(key) = env.freepik_key.as_deref() {
                    providers.push(Box::new(FreepikSearch::new(key)));
                }
            }
            ImageProvider::Dataforseo => {
                if let Some(key) = env.dataforseo_key.as_deref() {
                    match DataForSeoSearch::from_credentials(key) {
                        Ok(search) => providers.push(Box::new(search)),
                        Err(err) => tracing::warn!(
                            env = DATAFORSEO_KEY_ENV,
                            error = %format!("{err:#}"),
                            "ignoring malformed DataForSEO credentials"
                        ),
                    }
                }
            }
        }
    }
    if providers.is_empty() {
        tracing::debug!("no image provider credentials; enrichment disabled");
        return Enrichment::Absent;
    }
    let enricher = ImageEnricher::new(providers, config.images.max_images);
    tracing::debug!(providers = ?enricher.provider_names(), "image enrichment enabled");
    Enrichment::Configured(Box::new(enricher))
}

/// Wire every stage from config and environment.
pub fn build_stages(
    config: &WorkspaceConfig,
    cli_override: Option<&str>,
    env: &CapabilityEnv,
) -> Result<Stages> {
    let research = resolve_lm_command(config, Stage::Research, cli_override, env)?;
    let outline = resolve_lm_command(config, Stage::Outline, cli_override, env)?;
    let write = resolve_lm_command(config, Stage::Write, cli_override, env)?;
    Ok(Stages {
        research: Box::new(LmResearch::new(research)),
        outline: Box::new(LmOutline::new(outline, config.outline_retries)),
        write: Box::new(LmWrite::new(write)),
        enrich: build_enrichment(config, env),
    })
}
