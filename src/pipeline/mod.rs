//! Article pipeline orchestration.
//!
//! One run drives a queued article through
//! `researching → outlining → writing → enriching → review`. Every status
//! write is a guarded transition from the state the run last wrote, so an
//! observer sees progress as it happens and a second run against the same
//! article is rejected by the store.
//!
//! A stage failure ends the run: the article moves to `error` with the
//! message and fields persisted by earlier stages stay as they are. Store
//! failures are not article state and propagate to the caller.
pub mod batch;
pub mod export;

pub use batch::{load_topics_from_csv, BatchEntry};

use crate::error::{RunError, StoreError};
use crate::stage_log::{StageLog, StageLogEntry, StageTimer};
use crate::stages::{
    ContentOutline, EnrichedContent, Enrichment, ImageSuggestion, ResearchRequest, Stage,
    StageFailure, StageResult, Stages,
};
use crate::store::{ArticleId, ArticleStatus, ArticleStore, StatusUpdate};
use crate::util::word_count;
use std::path::PathBuf;
use tracing::{info, warn};

pub const INITIAL_VERSION_SUMMARY: &str = "Initial generation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRun {
    pub article_id: ArticleId,
    pub word_count: i64,
    pub output_path: PathBuf,
    pub version_id: i64,
    pub images: Vec<ImageSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRun {
    pub article_id: ArticleId,
    /// Status the article was in when the failure happened.
    pub failed_status: ArticleStatus,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(CompletedRun),
    Failed(FailedRun),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

/// Why a run stopped early.
enum Halt {
    Failed { at: ArticleStatus, message: String },
    Store(StoreError),
}

impl From<StoreError> for Halt {
    fn from(err: StoreError) -> Self {
        Halt::Store(err)
    }
}

pub struct Pipeline<'a> {
    store: &'a ArticleStore,
    stages: Stages,
    export_dir: PathBuf,
    stage_log: Option<StageLog>,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a ArticleStore, stages: Stages, export_dir: PathBuf) -> Self {
        Self {
            store,
            stages,
            export_dir,
            stage_log: None,
        }
    }

    pub fn with_stage_log(mut self, stage_log: StageLog) -> Self {
        self.stage_log = Some(stage_log);
        self
    }

    /// Run every stage for a queued article.
    ///
    /// `Ok(RunOutcome::Failed)` means a stage failed and the article is now
    /// `error`. `Err` means the article could not be run or the store failed.
    pub fn run(&self, article_id: ArticleId, topic: &str) -> Result<RunOutcome, RunError> {
        let article = self.store.get_article(article_id)?;
        if article.status != ArticleStatus::Queued {
            return Err(RunError::NotRunnable {
                id: article_id,
                status: article.status,
            });
        }
        info!(article_id, topic, "pipeline run started");

        match self.run_stages(article_id, topic, article.target_keywords) {
            Ok(completed) => {
                info!(
                    article_id,
                    word_count = completed.word_count,
                    output_path = %completed.output_path.display(),
                    images = completed.images.len(),
                    "pipeline run completed"
                );
                Ok(RunOutcome::Completed(completed))
            }
            Err(Halt::Failed { at, message }) => {
                warn!(article_id, status = %at, error = %message, "pipeline run failed");
                self.store.transition(
                    article_id,
                    at,
                    &StatusUpdate::to(ArticleStatus::Error).with_error(message.clone()),
                )?;
                Ok(RunOutcome::Failed(FailedRun {
                    article_id,
                    failed_status: at,
                    message,
                }))
            }
            Err(Halt::Store(err)) => Err(err.into()),
        }
    }

    fn run_stages(
        &self,
        id: ArticleId,
        topic: &str,
        keywords: Vec<String>,
    ) -> Result<CompletedRun, Halt> {
        let request = ResearchRequest {
            topic: topic.to_string(),
            keywords,
        };
        let mut status = self.advance(
            id,
            ArticleStatus::Queued,
            StatusUpdate::to(ArticleStatus::Researching),
        )?;
        let notes = self.invoke(
            id,
            Stage::Research,
            status,
            || self.stages.research.research(&request),
            String::len,
        )?;

        status = self.advance(id, status, StatusUpdate::to(ArticleStatus::Outlining))?;
        let outline = self.invoke(
            id,
            Stage::Outline,
            status,
            || {
                let outline = self.stages.outline.outline(&notes)?;
                outline
                    .validate()
                    .map_err(|err| StageFailure::new(Stage::Outline, err))?;
                Ok(outline)
            },
            |outline: &ContentOutline| outline.sections.len(),
        )?;
        self.advance(
            id,
            status,
            StatusUpdate::to(ArticleStatus::Outlining).with_outline(outline.clone()),
        )?;

        status = self.advance(id, status, StatusUpdate::to(ArticleStatus::Writing))?;
        let content = self.invoke(
            id,
            Stage::Write,
            status,
            || self.stages.write.write(&outline),
            String::len,
        )?;
        self.advance(
            id,
            status,
            StatusUpdate::to(ArticleStatus::Writing).with_content(content.clone()),
        )?;

        status = self.advance(id, status, StatusUpdate::to(ArticleStatus::Enriching))?;
        let enriched = match &self.stages.enrich {
            Enrichment::Configured(enrich) => self.invoke(
                id,
                Stage::Enrich,
                status,
                || enrich.enrich(&content),
                |enriched: &EnrichedContent| enriched.markdown_content.len(),
            )?,
            Enrichment::Absent => {
                self.log_stage(StageTimer::start(id, Stage::Enrich).skipped());
                EnrichedContent::unchanged(&content)
            }
        };
        let EnrichedContent {
            markdown_content: content,
            images,
        } = enriched;

        let output_path = export::export_article(&self.export_dir, topic, &content).map_err(
            |err| Halt::Failed {
                at: status,
                message: format!("export failed: {err:#}"),
            },
        )?;

        let words = word_count(&content);
        self.advance(
            id,
            status,
            StatusUpdate::to(ArticleStatus::Review)
                .with_content(content.clone())
                .with_output_path(output_path.display().to_string())
                .with_images(images.clone()),
        )?;
        let version_id = self
            .store
            .save_version(id, &content, INITIAL_VERSION_SUMMARY)?;

        Ok(CompletedRun {
            article_id: id,
            word_count: words,
            output_path,
            version_id,
            images,
        })
    }

    /// Guarded write from `from` to `update.status`; returns the new status.
    fn advance(
        &self,
        id: ArticleId,
        from: ArticleStatus,
        update: StatusUpdate,
    ) -> Result<ArticleStatus, Halt> {
        debug_assert!(
            from.can_transition_to(update.status),
            "illegal transition {from} -> {}",
            update.status
        );
        self.store.transition(id, from, &update)?;
        Ok(update.status)
    }

    fn invoke<T>(
        &self,
        id: ArticleId,
        stage: Stage,
        status: ArticleStatus,
        call: impl FnOnce() -> StageResult<T>,
        output_size: impl Fn(&T) -> usize,
    ) -> Result<T, Halt> {
        let timer = StageTimer::start(id, stage);
        match call() {
            Ok(output) => {
                info!(
                    article_id = id,
                    stage = %stage,
                    elapsed_ms = timer.elapsed_ms(),
                    "stage complete"
                );
                self.log_stage(timer.success(output_size(&output)));
                Ok(output)
            }
            Err(failure) => {
                self.log_stage(timer.failed(failure.message.clone()));
                Err(Halt::Failed {
                    at: status,
                    message: failure.to_string(),
                })
            }
        }
    }

    fn log_stage(&self, entry: StageLogEntry) {
        if let Some(log) = &self.stage_log {
            log.record(&entry);
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
