//! Article records and the status state machine.
use crate::stages::{ContentOutline, ImageSuggestion};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ArticleId = i64;

/// Pipeline status of an article.
///
/// Order: `queued → researching → outlining → writing → enriching → review`,
/// with `error` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Queued,
    Researching,
    Outlining,
    Writing,
    Enriching,
    Review,
    Error,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 7] = [
        ArticleStatus::Queued,
        ArticleStatus::Researching,
        ArticleStatus::Outlining,
        ArticleStatus::Writing,
        ArticleStatus::Enriching,
        ArticleStatus::Review,
        ArticleStatus::Error,
    ];

    /// Return the stable string stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Queued => "queued",
            ArticleStatus::Researching => "researching",
            ArticleStatus::Outlining => "outlining",
            ArticleStatus::Writing => "writing",
            ArticleStatus::Enriching => "enriching",
            ArticleStatus::Review => "review",
            ArticleStatus::Error => "error",
        }
    }

    fn position(&self) -> Option<usize> {
        match self {
            ArticleStatus::Queued => Some(0),
            ArticleStatus::Researching => Some(1),
            ArticleStatus::Outlining => Some(2),
            ArticleStatus::Writing => Some(3),
            ArticleStatus::Enriching => Some(4),
            ArticleStatus::Review => Some(5),
            ArticleStatus::Error => None,
        }
    }

    /// `review` and `error` end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ArticleStatus::Review | ArticleStatus::Error)
    }

    /// True while a stage is executing for the article.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            ArticleStatus::Researching
                | ArticleStatus::Outlining
                | ArticleStatus::Writing
                | ArticleStatus::Enriching
        )
    }

    /// Whether the orchestrator may write `next` over `self`.
    ///
    /// Forward moves advance exactly one step. An in-progress state may be
    /// rewritten with itself to record progress fields.
    pub fn can_transition_to(&self, next: ArticleStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == ArticleStatus::Error {
            return true;
        }
        if *self == next {
            return self.is_in_progress();
        }
        match (self.position(), next.position()) {
            (Some(from), Some(to)) => to == from + 1,
            _ => false,
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ArticleStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value.trim())
            .ok_or_else(|| {
                let known = ArticleStatus::ALL.map(|status| status.as_str()).join(", ");
                format!("unknown status {value:?} (expected one of: {known})")
            })
    }
}

/// One article row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: ArticleId,
    pub topic: String,
    pub target_keywords: Vec<String>,
    pub status: ArticleStatus,
    pub outline: Option<ContentOutline>,
    pub meta_description: Option<String>,
    pub content: Option<String>,
    pub output_path: Option<String>,
    pub word_count: Option<i64>,
    pub images: Vec<ImageSuggestion>,
    pub batch_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Immutable content snapshot of an article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleVersion {
    pub id: i64,
    pub article_id: ArticleId,
    pub version_number: i64,
    pub content: String,
    pub change_summary: Option<String>,
    pub created_at: String,
}

/// Tagged write request: a status plus the optional fields allowed to change
/// with it. Unset fields keep their stored value. `word_count` is derived from
/// `content` by the store and cannot be set directly.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: ArticleStatus,
    pub outline: Option<ContentOutline>,
    pub meta_description: Option<String>,
    pub content: Option<String>,
    pub output_path: Option<String>,
    pub images: Option<Vec<ImageSuggestion>>,
    pub error_message: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: ArticleStatus) -> Self {
        Self {
            status,
            outline: None,
            meta_description: None,
            content: None,
            output_path: None,
            images: None,
            error_message: None,
        }
    }

    /// Attach the outline and its meta description.
    pub fn with_outline(mut self, outline: ContentOutline) -> Self {
        self.meta_description = Some(outline.meta_description.clone());
        self.outline = Some(outline);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_images(mut self, images: Vec<ImageSuggestion>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Optional filters for listing articles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub status: Option<ArticleStatus>,
    pub batch_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_advance_one_step() {
        use ArticleStatus::*;
        assert!(Queued.can_transition_to(Researching));
        assert!(Researching.can_transition_to(Outlining));
        assert!(Enriching.can_transition_to(Review));
        assert!(!Queued.can_transition_to(Writing));
        assert!(!Writing.can_transition_to(Outlining));
    }

    #[test]
    fn error_is_reachable_from_non_terminal_states_only() {
        use ArticleStatus::*;
        for status in [Queued, Researching, Outlining, Writing, Enriching] {
            assert!(status.can_transition_to(Error), "{status} -> error");
        }
        assert!(!Review.can_transition_to(Error));
        assert!(!Error.can_transition_to(Queued));
        assert!(!Error.can_transition_to(Error));
    }

    #[test]
    fn progress_writes_only_within_in_progress_states() {
        use ArticleStatus::*;
        assert!(Outlining.can_transition_to(Outlining));
        assert!(Writing.can_transition_to(Writing));
        assert!(!Queued.can_transition_to(Queued));
        assert!(!Review.can_transition_to(Review));
    }

    #[test]
    fn status_parses_from_stored_strings() {
        for status in ArticleStatus::ALL {
            assert_eq!(status.as_str().parse::<ArticleStatus>(), Ok(status));
        }
        let err = "drafting".parse::<ArticleStatus>().unwrap_err();
        assert!(err.contains("unknown status"));
    }
}
