//! Article artifact export.
//!
//! Artifacts are named `<slug>-<YYYYmmdd-HHMMSS>.md`. An existing file is never
//! overwritten: a same-second repeat of a topic gets `-2`, `-3`, ... appended.
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const MAX_SLUG_CHARS: usize = 50;
const FALLBACK_SLUG: &str = "article";

/// Lowercase ASCII alphanumerics, every other run of characters collapsed to a
/// single `-`.
pub fn slugify(topic: &str) -> String {
    let mut slug = String::with_capacity(topic.len());
    let mut pending_dash = false;
    for ch in topic.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(MAX_SLUG_CHARS);
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

fn artifact_stem(topic: &str, at: DateTime<Local>) -> String {
    format!("{}-{}", slugify(topic), at.format("%Y%m%d-%H%M%S"))
}

/// Write `content` into `dir` and return the artifact path.
pub fn export_article(dir: &Path, topic: &str, content: &str) -> Result<PathBuf> {
    export_article_at(dir, topic, content, Local::now())
}

fn export_article_at(
    dir: &Path,
    topic: &str,
    content: &str,
    at: DateTime<Local>,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create export dir {}", dir.display()))?;
    let stem = artifact_stem(topic, at);
    let mut suffix = 1u32;
    loop {
        let name = if suffix == 1 {
            format!("{stem}.md")
        } else {
            format!("{stem}-{suffix}.md")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(content.as_bytes())
                    .with_context(|| format!("write article {}", path.display()))?;
                return Ok(path);
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => suffix += 1,
            Err(err) => {
                return Err(err).with_context(|| format!("create article {}", path.display()))
            }
        }
    }
}
