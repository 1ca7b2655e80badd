//! Read-only views over the record store.
//!
//! Safe to call while a pipeline run is in flight: partially filled articles
//! come back with their unset fields as `None`.
use crate::error::StoreError;
use crate::stages::ImageSuggestion;
use crate::store::{Article, ArticleFilter, ArticleId, ArticleStatus, ArticleStore};
use crate::util::word_count;
use serde::Serialize;

/// One row of the article list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleSummary {
    pub id: ArticleId,
    pub topic: String,
    pub status: ArticleStatus,
    pub word_count: Option<i64>,
    pub batch_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Article> for ArticleSummary {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            topic: article.topic,
            status: article.status,
            word_count: article.word_count,
            batch_id: article.batch_id,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

/// Everything about an article except its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleDetails {
    pub id: ArticleId,
    pub topic: String,
    pub status: ArticleStatus,
    pub word_count: Option<i64>,
    pub target_keywords: Vec<String>,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub output_path: Option<String>,
    pub images: Vec<ImageSuggestion>,
    pub batch_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Article> for ArticleDetails {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            topic: article.topic,
            status: article.status,
            word_count: article.word_count,
            target_keywords: article.target_keywords,
            title: article.outline.map(|outline| outline.title),
            meta_description: article.meta_description,
            output_path: article.output_path,
            images: article.images,
            batch_id: article.batch_id,
            error_message: article.error_message,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleContent {
    Ready(String),
    /// No content has been written yet.
    Pending { status: ArticleStatus },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionSummary {
    pub version: i64,
    pub created_at: String,
    pub change_summary: Option<String>,
    pub word_count: i64,
}

pub struct ArticleQuery<'a> {
    store: &'a ArticleStore,
}

impl<'a> ArticleQuery<'a> {
    pub fn new(store: &'a ArticleStore) -> Self {
        Self { store }
    }

    pub fn list_articles(&self, filter: &ArticleFilter) -> Result<Vec<ArticleSummary>, StoreError> {
        Ok(self
            .store
            .list_articles(filter)?
            .into_iter()
            .map(ArticleSummary::from)
            .collect())
    }

    pub fn article_details(&self, id: ArticleId) -> Result<ArticleDetails, StoreError> {
        self.store.get_article(id).map(ArticleDetails::from)
    }

    pub fn article_content(&self, id: ArticleId) -> Result<ArticleContent, StoreError> {
        let article = self.store.get_article(id)?;
        Ok(match article.content {
            Some(content) if !content.is_empty() => ArticleContent::Ready(content),
            _ => ArticleContent::Pending {
                status: article.status,
            },
        })
    }

    /// Versions oldest first, with word counts derived from each snapshot.
    pub fn version_history(&self, id: ArticleId) -> Result<Vec<VersionSummary>, StoreError> {
        self.store.get_article(id)?;
        Ok(self
            .store
            .get_versions(id)?
            .into_iter()
            .map(|version| VersionSummary {
                version: version.version_number,
                word_count: word_count(&version.content),
                created_at: version.created_at,
                change_summary: version.change_summary,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::outline::OutlineSection;
    use crate::stages::ContentOutline;
    use crate::store::StatusUpdate;

    fn store() -> ArticleStore {
        let store = ArticleStore::open_in_memory().expect("open");
        store.init().expect("init");
        store
    }

    #[test]
    fn in_flight_article_reads_without_error() {
        let store = store();
        let id = store
            .create_article("In Flight", &["kw".to_string()], Some("b1"))
            .expect("create");
        let outline = ContentOutline {
            title: "In Flight, Explained".to_string(),
            meta_description: "meta".to_string(),
            target_keywords: Vec::new(),
            sections: vec![OutlineSection {
                heading: "One".to_string(),
                subheadings: Vec::new(),
                key_points: Vec::new(),
                seo_keywords: Vec::new(),
            }],
            tone: "informative".to_string(),
        };
        store
            .update_status(
                id,
                &StatusUpdate::to(ArticleStatus::Outlining).with_outline(outline),
            )
            .expect("update");

        let query = ArticleQuery::new(&store);
        let details = query.article_details(id).expect("details");
        assert_eq!(details.status, ArticleStatus::Outlining);
        assert_eq!(details.title.as_deref(), Some("In Flight, Explained"));
        assert_eq!(details.meta_description.as_deref(), Some("meta"));
        assert_eq!(details.word_count, None);
        assert_eq!(details.target_keywords, vec!["kw"]);
        assert_eq!(
            query.article_content(id).expect("content"),
            ArticleContent::Pending {
                status: ArticleStatus::Outlining
            }
        );
    }

    #[test]
    fn list_maps_filters_through() {
        let store = store();
        let a = store.create_article("A", &[], Some("b1")).expect("create");
        store.create_article("B", &[], Some("b2")).expect("create");
        store
            .update_status(a, &StatusUpdate::to(ArticleStatus::Error).with_error("x"))
            .expect("update");

        let query = ArticleQuery::new(&store);
        let errors = query
            .list_articles(&ArticleFilter {
                status: Some(ArticleStatus::Error),
                batch_id: None,
            })
            .expect("list");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].topic, "A");
        assert_eq!(errors[0].batch_id.as_deref(), Some("b1"));
        assert_eq!(query.list_articles(&ArticleFilter::default()).expect("list").len(), 2);
    }

    #[test]
    fn content_is_ready_once_written() {
        let store = store();
        let id = store.create_article("Done", &[], None).expect("create");
        store
            .update_status(
                id,
                &StatusUpdate::to(ArticleStatus::Writing).with_content("# Done\n\nbody"),
            )
            .expect("update");
        assert_eq!(
            ArticleQuery::new(&store).article_content(id).expect("content"),
            ArticleContent::Ready("# Done\n\nbody".to_string())
        );
    }

    #[test]
    fn history_derives_word_counts() {
        let store = store();
        let id = store.create_article("History", &[], None).expect("create");
        store
            .save_version(id, "one two three", "Initial generation")
            .expect("v1");
        store.save_version(id, "one two", "Trimmed").expect("v2");

        let history = ArticleQuery::new(&store).version_history(id).expect("history");
        let rows: Vec<_> = history
            .iter()
            .map(|v| (v.version, v.word_count, v.change_summary.as_deref()))
            .collect();
        assert_eq!(
            rows,
            vec![(1, 3, Some("Initial generation")), (2, 2, Some("Trimmed"))]
        );
    }

    #[test]
    fn missing_article_is_not_found_everywhere() {
        let store = store();
        let query = ArticleQuery::new(&store);
        assert!(matches!(query.article_details(42), Err(StoreError::NotFound(42))));
        assert!(matches!(query.article_content(42), Err(StoreError::NotFound(42))));
        assert!(matches!(query.version_history(42), Err(StoreError::NotFound(42))));
    }

    #[test]
    fn article_without_versions_has_empty_history() {
        let store = store();
        let id = store.create_article("Fresh", &[], None).expect("create");
        assert!(ArticleQuery::new(&store)
            .version_history(id)
            .expect("history")
            .is_empty());
    }
}
