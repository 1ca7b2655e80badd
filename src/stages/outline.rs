//! Structured article outline produced by the outline stage.
use serde::{Deserialize, Serialize};

/// Search snippets are cut beyond this length.
pub const MAX_META_DESCRIPTION_CHARS: usize = 160;

fn default_tone() -> String {
    "informative".to_string()
}

/// One H2 section of the outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineSection {
    pub heading: String,
    #[serde(default)]
    pub subheadings: Vec<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub seo_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentOutline {
    pub title: String,
    pub meta_description: String,
    #[serde(default)]
    pub target_keywords: Vec<String>,
    pub sections: Vec<OutlineSection>,
    #[serde(default = "default_tone")]
    pub tone: String,
}

impl ContentOutline {
    /// Check the shape the write stage relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("outline title must be non-empty".to_string());
        }
        let meta_chars = self.meta_description.chars().count();
        if self.meta_description.trim().is_empty() {
            return Err("outline meta_description must be non-empty".to_string());
        }
        if meta_chars > MAX_META_DESCRIPTION_CHARS {
            return Err(format!(
                "outline meta_description is {meta_chars} characters (max {MAX_META_DESCRIPTION_CHARS})"
            ));
        }
        if self.sections.is_empty() {
            return Err("outline must contain at least one section".to_string());
        }
        if let Some(index) = self
            .sections
            .iter()
            .position(|section| section.heading.trim().is_empty())
        {
            return Err(format!("outline section {} has an empty heading", index + 1));
        }
        Ok(())
    }
}
