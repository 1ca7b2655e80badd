//! Tool-call boundary for a conversational front-end.
//!
//! Each tool takes a JSON object of arguments and returns a JSON value.
//! Failures come back as `{"error": "..."}` rather than as a Rust error, so a
//! caller can hand the result straight back to the model.
use crate::pipeline::{BatchEntry, RunOutcome};
use crate::query::{ArticleContent, ArticleQuery};
use crate::store::{ArticleFilter, ArticleId, ArticleStatus};
use crate::util::split_keywords;
use crate::workspace::Workspace;
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

pub const TOOL_NAMES: [&str; 6] = [
    "create_article",
    "create_article_batch",
    "list_all_articles",
    "get_article_details",
    "get_article_content",
    "get_version_history",
];

/// Keywords as a JSON list or a comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeywordsArg {
    List(Vec<String>),
    Text(String),
}

impl KeywordsArg {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeywordsArg::List(list) => list
                .into_iter()
                .map(|keyword| keyword.trim().to_string())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
            KeywordsArg::Text(text) => split_keywords(&text),
        }
    }
}

fn keywords(arg: Option<KeywordsArg>) -> Vec<String> {
    arg.map(KeywordsArg::into_vec).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct CreateArticleArgs {
    topic: String,
    #[serde(default)]
    keywords: Option<KeywordsArg>,
}

#[derive(Debug, Deserialize)]
struct BatchEntryArg {
    topic: String,
    #[serde(default)]
    keywords: Option<KeywordsArg>,
}

#[derive(Debug, Deserialize)]
struct CreateBatchArgs {
    entries: Vec<BatchEntryArg>,
    #[serde(default)]
    batch_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListArgs {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    batch_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleArgs {
    article_id: ArticleId,
}

fn parse_args<T: DeserializeOwned>(name: &str, args: &Value) -> Result<T> {
    serde_json::from_value(args.clone()).with_context(|| format!("invalid arguments for {name}"))
}

/// Run tool `name`. `lm_override` is the `--lm` flag, used by the tools that
/// generate content.
pub fn dispatch(
    workspace: &Workspace,
    lm_override: Option<&str>,
    name: &str,
    args: &Value,
) -> Value {
    tracing::debug!(tool = name, "tool call");
    match call(workspace, lm_override, name, args) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(tool = name, error = %format!("{err:#}"), "tool call failed");
            json!({ "error": format!("{err:#}") })
        }
    }
}

fn call(
    workspace: &Workspace,
    lm_override: Option<&str>,
    name: &str,
    args: &Value,
) -> Result<Value> {
    let query = ArticleQuery::new(workspace.store());
    match name {
        "create_article" => {
            let args: CreateArticleArgs = parse_args(name, args)?;
            let topic = args.topic.trim();
            if topic.is_empty() {
                return Err(anyhow!("topic must be non-empty"));
            }
            let stages = workspace.stages(lm_override)?;
            let id = workspace
                .store()
                .create_article(topic, &keywords(args.keywords), None)?;
            let outcome = workspace.pipeline(stages).run(id, topic)?;
            let failed_status = match &outcome {
                RunOutcome::Failed(failed) => Some(failed.failed_status),
                RunOutcome::Completed(_) => None,
            };
            let details = query.article_details(id)?;
            Ok(json!({
                "article_id": id,
                "topic": details.topic,
                "status": details.status,
                "word_count": details.word_count,
                "output_path": details.output_path,
                "error_message": details.error_message,
                "failed_status": failed_status,
                "completed": outcome.is_completed(),
            }))
        }
        "create_article_batch" => {
            // A bare array is shorthand for `{"entries": [...]}`.
            let args: CreateBatchArgs = if args.is_array() {
                CreateBatchArgs {
                    entries: parse_args(name, args)?,
                    batch_id: None,
                }
            } else {
                parse_args(name, args)?
            };
            let entries: Vec<BatchEntry> = args
                .entries
                .into_iter()
                .map(|entry| BatchEntry {
                    topic: entry.topic,
                    keywords: keywords(entry.keywords),
                })
                .collect();
            let stages = workspace.stages(lm_override)?;
            let summary = workspace
                .pipeline(stages)
                .run_batch(&entries, args.batch_id.as_deref())?;
            Ok(json!({
                "batch_id": summary.batch_id,
                "topic_count": entries.len(),
                "article_ids": summary.article_ids,
                "succeeded": summary.succeeded,
                "failed": summary.failed,
            }))
        }
        "list_all_articles" => {
            let args: ListArgs = if args.is_null() {
                ListArgs::default()
            } else {
                parse_args(name, args)?
            };
            let status = args
                .status
                .as_deref()
                .map(str::trim)
                .filter(|status| !status.is_empty())
                .map(str::parse::<ArticleStatus>)
                .transpose()
                .map_err(|err| anyhow!(err))?;
            let filter = ArticleFilter {
                status,
                batch_id: args.batch_id.filter(|batch| !batch.trim().is_empty()),
            };
            Ok(serde_json::to_value(query.list_articles(&filter)?)?)
        }
        "get_article_details" => {
            let args: ArticleArgs = parse_args(name, args)?;
            Ok(serde_json::to_value(query.article_details(args.article_id)?)?)
        }
        "get_article_content" => {
            let args: ArticleArgs = parse_args(name, args)?;
            Ok(match query.article_content(args.article_id)? {
                ArticleContent::Ready(content) => json!({
                    "article_id": args.article_id,
                    "content": content,
                }),
                ArticleContent::Pending { status } => json!({
                    "article_id": args.article_id,
                    "status": status,
                    "message": format!("Article {} has no content yet.", args.article_id),
                }),
            })
        }
        "get_version_history" => {
            let args: ArticleArgs = parse_args(name, args)?;
            let history = query.version_history(args.article_id)?;
            if history.is_empty() {
                return Ok(json!({
                    "article_id": args.article_id,
                    "versions": [],
                    "message": format!("No versions found for article {}.", args.article_id),
                }));
            }
            Ok(json!({
                "article_id": args.article_id,
                "versions": history,
            }))
        }
        other => Err(anyhow!(
            "unknown tool {other:?} (known: {})",
            TOOL_NAMES.join(", ")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StatusUpdate;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().expect("temp dir");
        let workspace = Workspace::open(dir.path().to_path_buf()).expect("open workspace");
        (dir, workspace)
    }

    #[test]
    fn unknown_tool_is_an_error_value() {
        let (_dir, ws) = workspace();
        let result = dispatch(&ws, None, "delete_everything", &json!({}));
        let message = result["error"].as_str().expect("error string");
        assert!(message.contains("unknown tool"), "{message}");
    }

    #[test]
    fn details_for_missing_article() {
        let (_dir, ws) = workspace();
        let result = dispatch(&ws, None, "get_article_details", &json!({ "article_id": 7 }));
        assert_eq!(result, json!({ "error": "article 7 not found" }));
    }

    #[test]
    fn content_reports_no_content_yet() {
        let (_dir, ws) = workspace();
        let id = ws.store().create_article("Queued", &[], None).expect("create");
        let result = dispatch(&ws, None, "get_article_content", &json!({ "article_id": id }));
        assert_eq!(result["status"], "queued");
        assert_eq!(
            result["message"],
            format!("Article {id} has no content yet.")
        );

        ws.store()
            .update_status(
                id,
                &StatusUpdate::to(ArticleStatus::Writing).with_content("# Body"),
            )
            .expect("update");
        let result = dispatch(&ws, None, "get_article_content", &json!({ "article_id": id }));
        assert_eq!(result["content"], "# Body");
    }

    #[test]
    fn list_filters_by_status_and_rejects_unknown_status() {
        let (_dir, ws) = workspace();
        let first = ws.store().create_article("First", &[], Some("b")).expect("create");
        ws.store().create_article("Second", &[], None).expect("create");
        ws.store()
            .update_status(first, &StatusUpdate::to(ArticleStatus::Error).with_error("boom"))
            .expect("update");

        let all = dispatch(&ws, None, "list_all_articles", &Value::Null);
        assert_eq!(all.as_array().expect("array").len(), 2);

        let errors = dispatch(&ws, None, "list_all_articles", &json!({ "status": "error" }));
        let errors = errors.as_array().expect("array");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["topic"], "First");
        assert_eq!(errors[0]["batch_id"], "b");

        let bad = dispatch(&ws, None, "list_all_articles", &json!({ "status": "done" }));
        assert!(bad["error"].as_str().expect("error").contains("unknown status"));
    }

    #[test]
    fn history_lists_versions_with_word_counts() {
        let (_dir, ws) = workspace();
        let id = ws.store().create_article("Versions", &[], None).expect("create");
        let empty = dispatch(&ws, None, "get_version_history", &json!({ "article_id": id }));
        assert_eq!(empty["versions"], json!([]));
        assert!(empty["message"].as_str().expect("message").contains("No versions"));

        ws.store()
            .save_version(id, "a b c d", "Initial generation")
            .expect("save");
        let history = dispatch(&ws, None, "get_version_history", &json!({ "article_id": id }));
        assert_eq!(history["versions"][0]["version"], 1);
        assert_eq!(history["versions"][0]["word_count"], 4);
        assert_eq!(history["versions"][0]["change_summary"], "Initial generation");
    }

    #[test]
    fn create_without_lm_command_creates_nothing() {
        let (_dir, ws) = workspace();
        if std::env::var_os(crate::config::LM_COMMAND_ENV).is_some() {
            return;
        }
        let result = dispatch(
            &ws,
            None,
            "create_article",
            &json!({ "topic": "No Model", "keywords": "a, b" }),
        );
        assert!(result["error"].as_str().expect("error").contains("no LM command"));
        assert!(ws
            .store()
            .list_articles(&ArticleFilter::default())
            .expect("list")
            .is_empty());
    }

    #[test]
    fn create_runs_pipeline_with_lm_override() {
        let (_dir, ws) = workspace();
        // `false` exits non-zero, so the run stops at research.
        let result = dispatch(
            &ws,
            Some("false"),
            "create_article",
            &json!({ "topic": "Echo", "keywords": ["x", " "] }),
        );
        assert_eq!(result["status"], "error");
        assert_eq!(result["failed_status"], "researching");
        assert_eq!(result["completed"], false);
        let id = result["article_id"].as_i64().expect("id");
        let article = ws.store().get_article(id).expect("get");
        assert_eq!(article.target_keywords, vec!["x"]);
        assert!(article
            .error_message
            .expect("error message")
            .contains("research failed"));
    }

    #[test]
    fn batch_accepts_bare_array_and_string_keywords() {
        let (_dir, ws) = workspace();
        let result = dispatch(
            &ws,
            Some("false"),
            "create_article_batch",
            &json!([{ "topic": "One", "keywords": "k1,k2" }, { "topic": "Two" }]),
        );
        assert_eq!(result["topic_count"], 2);
        assert_eq!(result["failed"], 2);
        let ids = result["article_ids"].as_array().expect("ids");
        let first = ws
            .store()
            .get_article(ids[0].as_i64().expect("id"))
            .expect("get");
        assert_eq!(first.target_keywords, vec!["k1", "k2"]);
        assert_eq!(first.batch_id.as_deref(), result["batch_id"].as_str());
    }

    #[test]
    fn keyword_args_normalise() {
        let list: KeywordsArg = serde_json::from_value(json!([" a ", "", "b"])).expect("list");
        assert_eq!(list.into_vec(), vec!["a", "b"]);
        let text: KeywordsArg = serde_json::from_value(json!("a, ,b")).expect("text");
        assert_eq!(text.into_vec(), vec!["a", "b"]);
    }
}
