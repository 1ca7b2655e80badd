//! Stages backed by a local LM command.
//!
//! The command is any tool that reads a prompt on stdin and writes its answer
//! on stdout (`llm -m ...`, `ollama run ...`, a wrapper script). Model choice,
//! API keys, and caching stay with the user's command.
use super::{ContentOutline, OutlineStage, ResearchRequest, ResearchStage, Stage, StageFailure};
use super::{StageResult, WriteStage};
use crate::util::{extract_json, truncate_string};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

const RESEARCH_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/research.md"
));
const OUTLINE_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/outline.md"
));
const OUTLINE_RETRY_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/outline_retry.md"
));
const WRITE_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/write.md"
));

const RESPONSE_PREVIEW_BYTES: usize = 1000;

/// A shell-style command line that answers prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmCommand {
    command: String,
}

impl LmCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Send `prompt` on stdin and return stdout.
    ///
    /// Spawn errors, non-zero exits, non-UTF-8 output, and blank output all
    /// become a [`StageFailure`] for `stage`.
    pub fn invoke(&self, stage: Stage, prompt: &str) -> StageResult<String> {
        let fail = |message: String| StageFailure::new(stage, message);
        let args = shell_words::split(&self.command)
            .map_err(|err| fail(format!("parse LM command {:?}: {err}", self.command)))?;
        let Some((program, rest)) = args.split_first() else {
            return Err(fail("LM command is empty".to_string()));
        };

        let start = Instant::now();
        let mut child = Command::new(program)
            .args(rest)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| fail(format!("spawn LM command {program}: {err}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .map_err(|err| fail(format!("write prompt to LM stdin: {err}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|err| fail(format!("wait for LM command: {err}")))?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            stage = %stage,
            elapsed_ms,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "lm invoke complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!(
                "LM command failed with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8(output.stdout)
            .map_err(|err| fail(format!("decode LM stdout as UTF-8: {err}")))?;
        if text.trim().is_empty() {
            return Err(fail("LM returned an empty response".to_string()));
        }
        Ok(text)
    }
}

pub struct LmResearch {
    client: LmCommand,
}

impl LmResearch {
    pub fn new(client: LmCommand) -> Self {
        Self { client }
    }
}

impl ResearchStage for LmResearch {
    fn research(&self, request: &ResearchRequest) -> StageResult<String> {
        let keywords = if request.keywords.is_empty() {
            "(none given)".to_string()
        } else {
            request.keywords.join(", ")
        };
        let prompt = RESEARCH_PROMPT
            .replace("{topic}", &request.topic)
            .replace("{keywords}", &keywords);
        let notes = self.client.invoke(Stage::Research, &prompt)?;
        Ok(notes.trim().to_string())
    }
}

/// Outline stage that decodes a JSON outline, re-prompting with the decode or
/// validation error up to `retries` times.
pub struct LmOutline {
    client: LmCommand,
    retries: usize,
}

impl LmOutline {
    pub fn new(client: LmCommand, retries: usize) -> Self {
        Self { client, retries }
    }
}

impl OutlineStage for LmOutline {
    fn outline(&self, research_notes: &str) -> StageResult<ContentOutline> {
        let original_prompt = OUTLINE_PROMPT.replace("{research_notes}", research_notes);
        let mut prompt = original_prompt.clone();
        let mut last_error = String::new();

        for attempt in 0..=self.retries {
            if attempt > 0 {
                tracing::warn!(
                    attempt,
                    retries = self.retries,
                    error = %last_error,
                    "outline response unusable; retrying"
                );
            }
            let response = self.client.invoke(Stage::Outline, &prompt)?;
            match parse_outline(&response) {
                Ok(outline) => return Ok(outline),
                Err(err) => {
                    prompt = OUTLINE_RETRY_PROMPT
                        .replace("{error}", &err)
                        .replace(
                            "{previous_response}",
                            &truncate_string(&response, RESPONSE_PREVIEW_BYTES),
                        )
                        .replace("{original_prompt}", &original_prompt);
                    last_error = err;
                }
            }
        }

        Err(StageFailure::new(
            Stage::Outline,
            format!(
                "no usable outline after {} attempts: {last_error}",
                self.retries + 1
            ),
        ))
    }
}

fn parse_outline(response: &str) -> Result<ContentOutline, String> {
    let json = extract_json(response).ok_or("response contains no JSON object")?;
    let outline: ContentOutline = serde_json::from_str(json).map_err(|err| {
        format!(
            "parse outline JSON: {err} (line {}, column {})",
            err.line(),
            err.column()
        )
    })?;
    outline.validate()?;
    Ok(outline)
}

pub struct LmWrite {
    client: LmCommand,
}

impl LmWrite {
    pub fn new(client: LmCommand) -> Self {
        Self { client }
    }
}

impl WriteStage for LmWrite {
    fn write(&self, outline: &ContentOutline) -> StageResult<String> {
        let outline_json = serde_json::to_string_pretty(outline)
            .map_err(|err| StageFailure::new(Stage::Write, format!("encode outline: {err}")))?;
        let prompt = WRITE_PROMPT.replace("{outline_json}", &outline_json);
        let article = self.client.invoke(Stage::Write, &prompt)?;
        Ok(article.trim().to_string())
    }
}
