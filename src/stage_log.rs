//! Append-only record of stage invocations.
//!
//! Every stage call the pipeline makes is appended to `stage_log.jsonl`:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"article_id":1,"stage":"research","duration_ms":4200,"outcome":"success","output_bytes":5120}
//! {"schema_version":1,"ts":1707900004200,"article_id":1,"stage":"outline","duration_ms":900,"outcome":"failed","error":"..."}
//! ```
//!
//! The log is diagnostic only; article state lives in the store.
use crate::stages::Stage;
use crate::store::ArticleId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub const STAGE_LOG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Success,
    Failed,
    /// Enrich with no image provider configured.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLogEntry {
    pub schema_version: u32,
    /// Unix timestamp in milliseconds when the entry was written.
    pub ts: u64,
    pub article_id: ArticleId,
    pub stage: Stage,
    pub duration_ms: u64,
    pub outcome: StageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<usize>,
}

/// Times one stage call and finishes into a [`StageLogEntry`].
pub struct StageTimer {
    start: Instant,
    article_id: ArticleId,
    stage: Stage,
}

impl StageTimer {
    pub fn start(article_id: ArticleId, stage: Stage) -> Self {
        Self {
            start: Instant::now(),
            article_id,
            stage,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn success(self, output_bytes: usize) -> StageLogEntry {
        self.build(StageOutcome::Success, None, Some(output_bytes))
    }

    pub fn failed(self, error: impl Into<String>) -> StageLogEntry {
        self.build(StageOutcome::Failed, Some(error.into()), None)
    }

    pub fn skipped(self) -> StageLogEntry {
        self.build(StageOutcome::Skipped, None, None)
    }

    fn build(
        self,
        outcome: StageOutcome,
        error: Option<String>,
        output_bytes: Option<usize>,
    ) -> StageLogEntry {
        StageLogEntry {
            schema_version: STAGE_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            article_id: self.article_id,
            stage: self.stage,
            duration_ms: self.elapsed_ms(),
            outcome,
            error,
            output_bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageLog {
    path: PathBuf,
}

impl StageLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, entry: &StageLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("create directory for stage log")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open stage log for append: {}", self.path.display()))?;
        let line = serde_json::to_string(entry).context("serialize stage log entry")?;
        writeln!(file, "{line}").context("write stage log entry")?;
        Ok(())
    }

    /// Append, downgrading any failure to a warning.
    pub fn record(&self, entry: &StageLogEntry) {
        if let Err(err) = self.append(entry) {
            tracing::warn!(
                path = %self.path.display(),
                error = %format!("{err:#}"),
                "stage log write failed"
            );
        }
    }

    pub fn load(&self) -> Result<Vec<StageLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("open stage log: {}", self.path.display()))?;
        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("read line {} of stage log", line_num + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StageLogEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => tracing::warn!(
                    line = line_num + 1,
                    error = %err,
                    "skip corrupt stage log entry"
                ),
            }
        }
        Ok(entries)
    }
}

fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let log = StageLog::new(dir.path().join("nested").join("stage_log.jsonl"));

        log.record(&StageTimer::start(7, Stage::Research).success(120));
        log.record(&StageTimer::start(7, Stage::Outline).failed("bad json"));
        log.record(&StageTimer::start(7, Stage::Enrich).skipped());

        let entries = log.load().expect("load");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].stage, Stage::Research);
        assert_eq!(entries[0].output_bytes, Some(120));
        assert_eq!(entries[1].outcome, StageOutcome::Failed);
        assert_eq!(entries[1].error.as_deref(), Some("bad json"));
        assert_eq!(entries[2].outcome, StageOutcome::Skipped);
        assert!(entries.iter().all(|entry| entry.article_id == 7));
    }

    #[test]
    fn skips_corrupt_lines() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("stage_log.jsonl");
        let good = serde_json::to_string(&StageTimer::start(1, Stage::Write).success(1))
            .expect("serialize");
        std::fs::write(&path, format!("not json\n\n{good}\n")).expect("write log");

        let entries = StageLog::new(path).load().expect("load");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].stage, Stage::Write);
    }

    #[test]
    fn missing_log_is_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let log = StageLog::new(dir.path().join("absent.jsonl"));
        assert!(log.load().expect("load").is_empty());
    }

    #[test]
    fn record_swallows_write_errors() {
        let dir = tempfile::tempdir().expect("temp dir");
        // A directory where the file should be makes the open fail.
        let log = StageLog::new(dir.path().to_path_buf());
        log.record(&StageTimer::start(1, Stage::Research).success(0));
        assert!(log.append(&StageTimer::start(1, Stage::Research).success(0)).is_err());
    }
}
