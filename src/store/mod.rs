//! Durable record store for articles and their version snapshots.
//!
//! Every write is a single autocommitted statement, so an observer in another
//! process sees each status change as soon as the call returns and never sees a
//! half-applied update.
mod schema;
mod types;

pub use types::{
    Article, ArticleFilter, ArticleId, ArticleStatus, ArticleVersion, StatusUpdate,
};

use crate::error::StoreError;
use crate::util::word_count;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed store. Open it, then call [`ArticleStore::init`] once before use.
pub struct ArticleStore {
    conn: Connection,
}

impl ArticleStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Create tables and indexes. Idempotent.
    pub fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(schema::CREATE_ARTICLES_TABLE)?;
        self.conn.execute_batch(schema::CREATE_VERSIONS_TABLE)?;
        self.conn.execute_batch(schema::CREATE_INDEXES)?;
        debug!("article store initialised");
        Ok(())
    }

    /// Insert a new article in `queued` status and return its id.
    pub fn create_article(
        &self,
        topic: &str,
        keywords: &[String],
        batch_id: Option<&str>,
    ) -> Result<ArticleId, StoreError> {
        let keywords_json = if keywords.is_empty() {
            None
        } else {
            Some(serde_json::to_string(keywords)?)
        };
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO articles (topic, target_keywords, status, batch_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                topic,
                keywords_json,
                ArticleStatus::Queued.as_str(),
                batch_id,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(article_id = id, "article created");
        Ok(id)
    }

    /// Write a status and any fields carried by the update, unconditionally.
    /// Tests use it to put an article into an arbitrary state.
    #[cfg(test)]
    pub fn update_status(&self, id: ArticleId, update: &StatusUpdate) -> Result<(), StoreError> {
        self.apply_update(id, None, update)
    }

    /// Write a status and any fields carried by the update, but only if the
    /// article is currently in `expected`.
    pub fn transition(
        &self,
        id: ArticleId,
        expected: ArticleStatus,
        update: &StatusUpdate,
    ) -> Result<(), StoreError> {
        self.apply_update(id, Some(expected), update)
    }

    fn apply_update(
        &self,
        id: ArticleId,
        expected: Option<ArticleStatus>,
        update: &StatusUpdate,
    ) -> Result<(), StoreError> {
        let outline_json = update
            .outline
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let images_json = update
            .images
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let words = update.content.as_deref().map(word_count);

        let changed = self.conn.execute(
            "UPDATE articles
             SET status = ?1,
                 updated_at = ?2,
                 outline_json = COALESCE(?3, outline_json),
                 meta_description = COALESCE(?4, meta_description),
                 content = COALESCE(?5, content),
                 word_count = COALESCE(?6, word_count),
                 output_path = COALESCE(?7, output_path),
                 images_json = COALESCE(?8, images_json),
                 error_message = COALESCE(?9, error_message)
             WHERE id = ?10
               AND (?11 IS NULL OR status = ?11)",
            params![
                update.status.as_str(),
                now_timestamp(),
                outline_json,
                update.meta_description,
                update.content,
                words,
                update.output_path,
                images_json,
                update.error_message,
                id,
                expected.map(|status| status.as_str()),
            ],
        )?;

        if changed > 0 {
            debug!(article_id = id, status = %update.status, "article updated");
            return Ok(());
        }
        match (self.current_status(id)?, expected) {
            (Some(actual), Some(expected)) => Err(StoreError::StatusConflict {
                id,
                expected,
                actual,
            }),
            _ => Err(StoreError::NotFound(id)),
        }
    }

    pub fn get_article(&self, id: ArticleId) -> Result<Article, StoreError> {
        self.find_article(id)?.ok_or(StoreError::NotFound(id))
    }

    pub fn find_article(&self, id: ArticleId) -> Result<Option<Article>, StoreError> {
        let sql = format!(
            "SELECT {} FROM articles WHERE id = ?1",
            schema::ARTICLE_COLUMNS
        );
        let raw = self
            .conn
            .query_row(&sql, params![id], RawArticle::from_row)
            .optional()?;
        raw.map(RawArticle::decode).transpose()
    }

    /// List articles ordered by id, optionally filtered by status and batch.
    pub fn list_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>, StoreError> {
        let sql = format!(
            "SELECT {} FROM articles
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 IS NULL OR batch_id = ?2)
             ORDER BY id",
            schema::ARTICLE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                filter.status.map(|status| status.as_str()),
                filter.batch_id
            ],
            RawArticle::from_row,
        )?;
        let mut articles = Vec::new();
        for row in rows {
            articles.push(row?.decode()?);
        }
        Ok(articles)
    }

    /// Snapshot `content` as the next version of the article.
    ///
    /// The number is MAX(existing) + 1, computed inside the insert itself.
    /// Returns the new version row id.
    pub fn save_version(
        &self,
        id: ArticleId,
        content: &str,
        change_summary: &str,
    ) -> Result<i64, StoreError> {
        if self.current_status(id)?.is_none() {
            return Err(StoreError::NotFound(id));
        }
        self.conn.execute(
            "INSERT INTO article_versions (article_id, version_number, content, change_summary, created_at)
             SELECT ?1, COALESCE(MAX(version_number), 0) + 1, ?2, ?3, ?4
             FROM article_versions
             WHERE article_id = ?1",
            params![id, content, change_summary, now_timestamp()],
        )?;
        let version_id = self.conn.last_insert_rowid();
        debug!(article_id = id, version_id, "version saved");
        Ok(version_id)
    }

    /// All versions of an article, oldest first.
    pub fn get_versions(&self, id: ArticleId) -> Result<Vec<ArticleVersion>, StoreError> {
        let sql = format!(
            "SELECT {} FROM article_versions WHERE article_id = ?1 ORDER BY version_number",
            schema::VERSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(ArticleVersion {
                id: row.get(0)?,
                article_id: row.get(1)?,
                version_number: row.get(2)?,
                content: row.get(3)?,
                change_summary: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// Administrative removal of one version. The pipeline never calls this.
    pub fn delete_version(&self, id: ArticleId, version_number: i64) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "DELETE FROM article_versions WHERE article_id = ?1 AND version_number = ?2",
            params![id, version_number],
        )?;
        Ok(changed > 0)
    }

    fn current_status(&self, id: ArticleId) -> Result<Option<ArticleStatus>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM articles WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|value| decode_status(id, &value)).transpose()
    }
}

/// Column values as stored, before JSON and enum decoding.
struct RawArticle {
    id: ArticleId,
    topic: String,
    target_keywords: Option<String>,
    status: String,
    outline_json: Option<String>,
    meta_description: Option<String>,
    content: Option<String>,
    output_path: Option<String>,
    word_count: Option<i64>,
    images_json: Option<String>,
    batch_id: Option<String>,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawArticle {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            topic: row.get(1)?,
            target_keywords: row.get(2)?,
            status: row.get(3)?,
            outline_json: row.get(4)?,
            meta_description: row.get(5)?,
            content: row.get(6)?,
            output_path: row.get(7)?,
            word_count: row.get(8)?,
            images_json: row.get(9)?,
            batch_id: row.get(10)?,
            error_message: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn decode(self) -> Result<Article, StoreError> {
        let id = self.id;
        Ok(Article {
            id,
            topic: self.topic,
            target_keywords: decode_json_opt(id, self.target_keywords.as_deref())?
                .unwrap_or_default(),
            status: decode_status(id, &self.status)?,
            outline: decode_json_opt(id, self.outline_json.as_deref())?,
            meta_description: self.meta_description,
            content: self.content,
            output_path: self.output_path,
            word_count: self.word_count,
            images: decode_json_opt(id, self.images_json.as_deref())?.unwrap_or_default(),
            batch_id: self.batch_id,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn decode_status(id: ArticleId, value: &str) -> Result<ArticleStatus, StoreError> {
    value
        .parse()
        .map_err(|detail| StoreError::Corrupt { id, detail })
}

fn decode_json_opt<T: serde::de::DeserializeOwned>(
    id: ArticleId,
    value: Option<&str>,
) -> Result<Option<T>, StoreError> {
    value
        .map(|text| {
            serde_json::from_str(text).map_err(|err| StoreError::Corrupt {
                id,
                detail: err.to_string(),
            })
        })
        .transpose()
}

fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
