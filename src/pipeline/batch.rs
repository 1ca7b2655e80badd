//! Batch runs: create every article up front, then run them one at a time.
use super::{Pipeline, RunOutcome};
use crate::error::RunError;
use crate::store::ArticleId;
use crate::util::split_keywords;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub topic: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl BatchEntry {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub batch_id: String,
    /// Created article ids, in entry order.
    pub article_ids: Vec<ArticleId>,
    pub succeeded: usize,
    pub failed: usize,
}

pub fn generate_batch_id() -> String {
    format!("batch-{}", chrono::Local::now().format("%Y%m%d-%H%M%S-%3f"))
}

impl Pipeline<'_> {
    /// Queue every entry under one batch id, then run each article in
    /// creation order. A failed article is counted and the batch moves on;
    /// only storage failures abort it.
    pub fn run_batch(
        &self,
        entries: &[BatchEntry],
        batch_id: Option<&str>,
    ) -> Result<BatchSummary, RunError> {
        if entries.is_empty() {
            return Err(RunError::InvalidBatch("no topics given".to_string()));
        }
        if let Some(index) = entries.iter().position(|entry| entry.topic.trim().is_empty()) {
            return Err(RunError::InvalidBatch(format!(
                "topic {} is blank",
                index + 1
            )));
        }
        let batch_id = match batch_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            Some(_) => return Err(RunError::InvalidBatch("batch id is blank".to_string())),
            None => generate_batch_id(),
        };

        let mut article_ids = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = self.store.create_article(
                entry.topic.trim(),
                &entry.keywords,
                Some(&batch_id),
            )?;
            article_ids.push(id);
        }
        info!(batch_id = %batch_id, articles = article_ids.len(), "batch queued");

        let mut succeeded = 0;
        let mut failed = 0;
        let total = entries.len();
        for (index, (id, entry)) in article_ids.iter().zip(entries).enumerate() {
            info!(
                batch_id = %batch_id,
                article_id = *id,
                position = index + 1,
                total,
                "batch item started"
            );
            match self.run(*id, entry.topic.trim()) {
                Ok(RunOutcome::Completed(_)) => succeeded += 1,
                Ok(RunOutcome::Failed(_)) => failed += 1,
                Err(err) if err.is_storage_failure() => return Err(err),
                Err(err) => {
                    warn!(article_id = *id, error = %err, "batch item skipped");
                    failed += 1;
                }
            }
        }

        info!(batch_id = %batch_id, succeeded, failed, "batch complete");
        Ok(BatchSummary {
            batch_id,
            article_ids,
            succeeded,
            failed,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    topic: String,
    #[serde(default)]
    keywords: Option<String>,
}

/// Read `topic,keywords` rows. Keywords are comma-separated inside one
/// (quoted) field and may be omitted.
pub fn load_topics_from_csv(path: &Path) -> Result<Vec<BatchEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open topics CSV {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("read CSV header of {}", path.display()))?;
    if !headers.iter().any(|name| name == "topic") {
        return Err(anyhow!(
            "{} has no `topic` column (expected header `topic,keywords`)",
            path.display()
        ));
    }

    let mut entries = Vec::new();
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = row.with_context(|| format!("parse {} line {line}", path.display()))?;
        if row.topic.is_empty() {
            return Err(anyhow!("{} line {line}: topic is blank", path.display()));
        }
        entries.push(BatchEntry {
            topic: row.topic,
            keywords: row.keywords.as_deref().map(split_keywords).unwrap_or_default(),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::outline::OutlineSection;
    use crate::stages::{
        ContentOutline, Enrichment, ResearchRequest, Stage, StageFailure, StageResult, Stages,
    };
    use crate::store::{ArticleFilter, ArticleStatus, ArticleStore};
    use std::cell::Cell;
    use std::rc::Rc;

    fn outline() -> ContentOutline {
        ContentOutline {
            title: "T".to_string(),
            meta_description: "M".to_string(),
            target_keywords: Vec::new(),
            sections: vec![OutlineSection {
                heading: "H".to_string(),
                subheadings: Vec::new(),
                key_points: Vec::new(),
                seo_keywords: Vec::new(),
            }],
            tone: "informative".to_string(),
        }
    }

    /// Research fails for any topic containing "broken".
    fn stages() -> Stages {
        Stages {
            research: Box::new(|request: &ResearchRequest| -> StageResult<String> {
                if request.topic.contains("broken") {
                    Err(StageFailure::new(Stage::Research, "no sources"))
                } else {
                    Ok(format!("notes on {}", request.topic))
                }
            }),
            outline: Box::new(|_: &str| -> StageResult<ContentOutline> { Ok(outline()) }),
            write: Box::new(|_: &ContentOutline| -> StageResult<String> {
                Ok("# Article\n\nbody text".to_string())
            }),
            enrich: Enrichment::Absent,
        }
    }

    fn entries(topics: &[&str]) -> Vec<BatchEntry> {
        topics.iter().map(|topic| BatchEntry::new(*topic)).collect()
    }

    #[test]
    fn all_articles_are_queued_before_any_stage_runs() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("workspace.db");
        let store = ArticleStore::open(&db_path).expect("open");
        store.init().expect("init");

        let first_call = Rc::new(Cell::new(true));
        let flag = Rc::clone(&first_call);
        let observer_path = db_path.clone();
        let stages = Stages {
            research: Box::new(move |_: &ResearchRequest| -> StageResult<String> {
                if flag.replace(false) {
                    let observer = ArticleStore::open(&observer_path).expect("observer");
                    let roster = observer
                        .list_articles(&ArticleFilter {
                            status: None,
                            batch_id: Some("launch".to_string()),
                        })
                        .expect("list");
                    let statuses: Vec<_> = roster.iter().map(|a| a.status).collect();
                    assert_eq!(
                        statuses,
                        vec![
                            ArticleStatus::Researching,
                            ArticleStatus::Queued,
                            ArticleStatus::Queued
                        ]
                    );
                }
                Ok("notes".to_string())
            }),
            ..stages()
        };

        let pipeline = Pipeline::new(&store, stages, dir.path().join("content"));
        let summary = pipeline
            .run_batch(&entries(&["alpha", "beta", "gamma"]), Some("launch"))
            .expect("batch");
        assert!(!first_call.get());
        assert_eq!(summary.batch_id, "launch");
        assert_eq!(summary.article_ids.len(), 3);
        assert_eq!((summary.succeeded, summary.failed), (3, 0));
    }

    #[test]
    fn one_failure_does_not_stop_the_batch() {
        let store = ArticleStore::open_in_memory().expect("open");
        store.init().expect("init");
        let dir = tempfile::tempdir().expect("temp dir");
        let pipeline = Pipeline::new(&store, stages(), dir.path().to_path_buf());

        let summary = pipeline
            .run_batch(&entries(&["first", "broken second", "third"]), None)
            .expect("batch");
        assert_eq!((summary.succeeded, summary.failed), (2, 1));

        let articles = store
            .list_articles(&ArticleFilter {
                status: None,
                batch_id: Some(summary.batch_id.clone()),
            })
            .expect("list");
        let ids: Vec<_> = articles.iter().map(|a| a.id).collect();
        assert_eq!(ids, summary.article_ids);
        let statuses: Vec<_> = articles.iter().map(|a| a.status).collect();
        assert_eq!(
            statuses,
            vec![
                ArticleStatus::Review,
                ArticleStatus::Error,
                ArticleStatus::Review
            ]
        );
        assert!(regex::Regex::new(r"^batch-\d{8}-\d{6}-\d{3}$")
            .expect("regex")
            .is_match(&summary.batch_id));
    }

    #[test]
    fn rejects_invalid_batches_before_creating_rows() {
        let store = ArticleStore::open_in_memory().expect("open");
        store.init().expect("init");
        let dir = tempfile::tempdir().expect("temp dir");
        let pipeline = Pipeline::new(&store, stages(), dir.path().to_path_buf());

        assert!(matches!(
            pipeline.run_batch(&[], None),
            Err(RunError::InvalidBatch(_))
        ));
        assert!(matches!(
            pipeline.run_batch(&entries(&["ok", "  "]), None),
            Err(RunError::InvalidBatch(reason)) if reason.contains("topic 2")
        ));
        assert!(matches!(
            pipeline.run_batch(&entries(&["ok"]), Some(" ")),
            Err(RunError::InvalidBatch(_))
        ));
        assert!(store
            .list_articles(&ArticleFilter::default())
            .expect("list")
            .is_empty());
    }

    #[test]
    fn keywords_are_stored_per_entry() {
        let store = ArticleStore::open_in_memory().expect("open");
        store.init().expect("init");
        let dir = tempfile::tempdir().expect("temp dir");
        let pipeline = Pipeline::new(&store, stages(), dir.path().to_path_buf());
        let batch = vec![BatchEntry {
            topic: "  Trail Running  ".to_string(),
            keywords: vec!["trail".to_string(), "shoes".to_string()],
        }];
        let summary = pipeline.run_batch(&batch, Some("kw")).expect("batch");
        let article = store.get_article(summary.article_ids[0]).expect("get");
        assert_eq!(article.topic, "Trail Running");
        assert_eq!(article.target_keywords, vec!["trail", "shoes"]);
        assert_eq!(article.batch_id.as_deref(), Some("kw"));
    }

    fn write_csv(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("topics.csv");
        std::fs::write(&path, contents).expect("write csv");
        (dir, path)
    }

    #[test]
    fn csv_keywords_are_split_and_optional() {
        let (_dir, path) = write_csv(
            "topic,keywords\n\
             How to train for a marathon,\"marathon training, running plan\"\n\
             Best running shoes 2026,\n\
             Recovery days\n",
        );
        let entries = load_topics_from_csv(&path).expect("load");
        assert_eq!(
            entries,
            vec![
                BatchEntry {
                    topic: "How to train for a marathon".to_string(),
                    keywords: vec!["marathon training".to_string(), "running plan".to_string()],
                },
                BatchEntry::new("Best running shoes 2026"),
                BatchEntry::new("Recovery days"),
            ]
        );
    }

    #[test]
    fn csv_without_keywords_column() {
        let (_dir, path) = write_csv("topic\nOnly topics\n");
        let entries = load_topics_from_csv(&path).expect("load");
        assert_eq!(entries, vec![BatchEntry::new("Only topics")]);
    }

    #[test]
    fn csv_blank_topic_names_the_line() {
        let (_dir, path) = write_csv("topic,keywords\nFine,a\n  ,b\n");
        let err = load_topics_from_csv(&path).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn csv_requires_topic_header() {
        let (_dir, path) = write_csv("title,keywords\nSomething,a\n");
        let err = load_topics_from_csv(&path).unwrap_err();
        assert!(err.to_string().contains("no `topic` column"), "{err}");
    }
}
