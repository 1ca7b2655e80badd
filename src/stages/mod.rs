//! Content-generation stages.
//!
//! Each stage is an opaque, blocking call that either returns its output or a
//! [`StageFailure`]. The orchestrator only sees these traits; the concrete
//! providers (local LM commands, image search APIs) live in submodules.
mod images;
mod lm;
pub mod outline;

pub use images::{DataForSeoSearch, FreepikSearch, ImageEnricher, ImageSearch};
pub use lm::{LmCommand, LmOutline, LmResearch, LmWrite};
pub use outline::ContentOutline;

pub use crate::error::StageFailure;

use serde::{Deserialize, Serialize};
use std::fmt;

pub type StageResult<T> = Result<T, StageFailure>;

/// The four externally delegated steps, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Research,
    Outline,
    Write,
    Enrich,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Research => "research",
            Stage::Outline => "outline",
            Stage::Write => "write",
            Stage::Enrich => "enrich",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the research stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchRequest {
    pub topic: String,
    pub keywords: Vec<String>,
}

/// Metadata for one image inserted into an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSuggestion {
    pub section_heading: String,
    pub search_query: String,
    pub image_url: String,
    pub alt_text: String,
    pub source: String,
}

/// Output of the enrich stage. `images` is empty when nothing suitable was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedContent {
    pub markdown_content: String,
    #[serde(default)]
    pub images: Vec<ImageSuggestion>,
}

impl EnrichedContent {
    pub fn unchanged(content: &str) -> Self {
        Self {
            markdown_content: content.to_string(),
            images: Vec::new(),
        }
    }
}

pub trait ResearchStage {
    /// Topic in, research notes out.
    fn research(&self, request: &ResearchRequest) -> StageResult<String>;
}

pub trait OutlineStage {
    /// Research notes in, validated outline out.
    fn outline(&self, research_notes: &str) -> StageResult<ContentOutline>;
}

pub trait WriteStage {
    /// Outline in, markdown article out.
    fn write(&self, outline: &ContentOutline) -> StageResult<String>;
}

pub trait EnrichStage {
    /// Article in, article with images out.
    fn enrich(&self, content: &str) -> StageResult<EnrichedContent>;
}

impl<F> ResearchStage for F
where
    F: Fn(&ResearchRequest) -> StageResult<String>,
{
    fn research(&self, request: &ResearchRequest) -> StageResult<String> {
        self(request)
    }
}

impl<F> OutlineStage for F
where
    F: Fn(&str) -> StageResult<ContentOutline>,
{
    fn outline(&self, research_notes: &str) -> StageResult<ContentOutline> {
        self(research_notes)
    }
}

impl<F> WriteStage for F
where
    F: Fn(&ContentOutline) -> StageResult<String>,
{
    fn write(&self, outline: &ContentOutline) -> StageResult<String> {
        self(outline)
    }
}

impl<F> EnrichStage for F
where
    F: Fn(&str) -> StageResult<EnrichedContent>,
{
    fn enrich(&self, content: &str) -> StageResult<EnrichedContent> {
        self(content)
    }
}

/// The optional enrich capability. `Absent` is a normal configuration, not an
/// error: the pipeline passes content through unchanged.
pub enum Enrichment {
    Configured(Box<dyn EnrichStage>),
    Absent,
}

impl Enrichment {
    #[cfg(test)]
    pub fn is_configured(&self) -> bool {
        matches!(self, Enrichment::Configured(_))
    }
}

/// One implementation per stage, handed to the orchestrator.
pub struct Stages {
    pub research: Box<dyn ResearchStage>,
    pub outline: Box<dyn OutlineStage>,
    pub write: Box<dyn WriteStage>,
    pub enrich: Enrichment,
}
