// Status flows queued -> researching -> outlining -> writing -> enriching -> review.
// Any in-flight step may instead land on error, with error_message set.
pub const CREATE_ARTICLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    topic            TEXT NOT NULL,
    target_keywords  TEXT,
    status           TEXT NOT NULL DEFAULT 'queued',
    outline_json     TEXT,
    meta_description TEXT,
    content          TEXT,
    output_path      TEXT,
    word_count       INTEGER,
    images_json      TEXT,
    batch_id         TEXT,
    error_message    TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
)
"#;

// version_number is allocated as MAX + 1 per article, so numbers are never
// reused even when a version row is removed out of band.
pub const CREATE_VERSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS article_versions (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    article_id     INTEGER NOT NULL REFERENCES articles (id),
    version_number INTEGER NOT NULL,
    content        TEXT NOT NULL,
    change_summary TEXT,
    created_at     TEXT NOT NULL,
    UNIQUE (article_id, version_number)
)
"#;

pub const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_articles_status ON articles (status);
CREATE INDEX IF NOT EXISTS idx_articles_batch ON articles (batch_id);
"#;

pub const ARTICLE_COLUMNS: &str = "id, topic, target_keywords, status, outline_json, \
    meta_description, content, output_path, word_count, images_json, batch_id, \
    error_message, created_at, updated_at";

pub const VERSION_COLUMNS: &str =
    "id, article_id, version_number, content, change_summary, created_at";
