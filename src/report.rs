//! Plain-text rendering for the CLI.
use crate::query::{ArticleDetails, ArticleSummary, VersionSummary};
use crate::stage_log::{StageLogEntry, StageOutcome};
use crate::store::ArticleId;
use crate::util::ellipsize;
use std::fmt::Write;

const TOPIC_WIDTH: usize = 40;
const SUMMARY_WIDTH: usize = 40;

/// `1800` -> `1,800`.
pub fn thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn words(count: Option<i64>) -> String {
    match count {
        Some(count) if count > 0 => thousands(count),
        _ => "-".to_string(),
    }
}

pub fn articles_table(articles: &[ArticleSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4} | {:<40} | {:<12} | {:>7} | Updated",
        "ID", "Topic", "Status", "Words"
    );
    let _ = writeln!(
        out,
        "{}-|-{}-|-{}-|-{}-|{}",
        "-".repeat(4),
        "-".repeat(TOPIC_WIDTH),
        "-".repeat(12),
        "-".repeat(7),
        "-".repeat(20)
    );
    for article in articles {
        let _ = writeln!(
            out,
            "{:>4} | {:<40} | {:<12} | {:>7} | {}",
            article.id,
            ellipsize(&article.topic, TOPIC_WIDTH),
            article.status.as_str(),
            words(article.word_count),
            article.updated_at
        );
    }
    out
}

pub fn article_detail(article: &ArticleDetails) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Article #{}", article.id);
    let _ = writeln!(out, "  Topic:    {}", article.topic);
    let _ = writeln!(out, "  Status:   {}", article.status);
    let _ = writeln!(out, "  Words:    {}", words(article.word_count));
    if !article.target_keywords.is_empty() {
        let _ = writeln!(out, "  Keywords: {}", article.target_keywords.join(", "));
    }
    if let Some(title) = &article.title {
        let _ = writeln!(out, "  Title:    {title}");
    }
    if let Some(meta) = &article.meta_description {
        let _ = writeln!(out, "  Meta:     {meta}");
    }
    if let Some(path) = &article.output_path {
        let _ = writeln!(out, "  File:     {path}");
    }
    if !article.images.is_empty() {
        let _ = writeln!(out, "  Images:   {}", article.images.len());
    }
    if let Some(batch) = &article.batch_id {
        let _ = writeln!(out, "  Batch:    {batch}");
    }
    if let Some(error) = &article.error_message {
        let _ = writeln!(out, "  Error:    {error}");
    }
    let _ = writeln!(out, "  Created:  {}", article.created_at);
    let _ = writeln!(out, "  Updated:  {}", article.updated_at);
    out
}

/// Stage timings for one article, oldest first.
pub fn stage_history(entries: &[StageLogEntry]) -> String {
    let mut out = String::new();
    if entries.is_empty() {
        return out;
    }
    let _ = writeln!(out, "  Stages:");
    for entry in entries {
        let outcome = match entry.outcome {
            StageOutcome::Success => "ok",
            StageOutcome::Failed => "failed",
            StageOutcome::Skipped => "skipped",
        };
        let seconds = format!("{:.1}s", entry.duration_ms as f64 / 1000.0);
        let _ = writeln!(
            out,
            "    {:<8} {:>7}  {}",
            entry.stage.as_str(),
            seconds,
            outcome
        );
    }
    out
}

pub fn history_table(article_id: ArticleId, versions: &[VersionSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Article {article_id} -- Version History\n");
    let _ = writeln!(
        out,
        "{:<5} | {:<20} | {:<40} | Words",
        "Ver", "Date", "Summary"
    );
    let _ = writeln!(
        out,
        "{}-|-{}-|-{}-|{}",
        "-".repeat(5),
        "-".repeat(20),
        "-".repeat(SUMMARY_WIDTH),
        "-".repeat(7)
    );
    for version in versions {
        let summary: String = version
            .change_summary
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(SUMMARY_WIDTH)
            .collect();
        let label = format!("v{}", version.version);
        let _ = writeln!(
            out,
            "{:<5} | {:<20} | {:<40} | {}",
            label,
            version.created_at,
            summary,
            thousands(version.word_count)
        );
    }
    out
}
