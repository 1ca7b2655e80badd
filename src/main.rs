use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::Write;
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

mod cli;
mod config;
mod error;
mod paths;
mod pipeline;
mod query;
mod report;
mod stage_log;
mod stages;
mod store;
mod tools;
mod util;
mod workspace;

use cli::{
    Command, CreateArgs, CreateBatchArgs, DeleteVersionArgs, HistoryArgs, InitArgs, RootArgs,
    ShowArgs, StatusArgs, ToolArgs,
};
use pipeline::{load_topics_from_csv, BatchEntry, RunOutcome};
use query::{ArticleContent, ArticleQuery};
use stage_log::StageLog;
use store::ArticleFilter;
use workspace::Workspace;

const LOG_ENV: &str = "SEOWS_LOG";

fn main() -> Result<()> {
    init_tracing();
    let args = RootArgs::parse();
    let root = paths::resolve_workspace_root(args.workspace.as_deref());
    let lm = args.lm.as_deref();

    match args.command {
        Command::Init(cmd) => cmd_init(root, &cmd),
        Command::Create(cmd) => cmd_create(&Workspace::open(root)?, lm, &cmd),
        Command::CreateBatch(cmd) => cmd_create_batch(&Workspace::open(root)?, lm, &cmd),
        Command::Status(cmd) => cmd_status(&Workspace::open(root)?, &cmd),
        Command::History(cmd) => cmd_history(&Workspace::open(root)?, &cmd),
        Command::DeleteVersion(cmd) => cmd_delete_version(&Workspace::open(root)?, &cmd),
        Command::Show(cmd) => cmd_show(&Workspace::open(root)?, &cmd),
        Command::Tool(cmd) => cmd_tool(&Workspace::open(root)?, lm, &cmd),
    }
}

/// Logs go to stderr so stdout stays clean for `--json` and `show`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_env_filter(filter)
        .init();
}

fn cmd_init(root: std::path::PathBuf, args: &InitArgs) -> Result<()> {
    let (workspace, wrote_config) = Workspace::init(root, args.force)?;
    let paths = workspace.paths();
    if wrote_config {
        println!("wrote {}", paths.config_path().display());
    } else {
        println!(
            "kept existing {} (use --force to overwrite)",
            paths.config_path().display()
        );
    }
    println!("database {}", paths.db_path().display());
    match workspace.config().lm_command.as_deref() {
        Some(command) => println!("lm command: {command}"),
        None => println!("lm command: not set (use --lm or SEOWS_LM_COMMAND)"),
    }
    println!("articles export to {}", paths.content_dir().display());
    Ok(())
}

fn cmd_create(workspace: &Workspace, lm: Option<&str>, args: &CreateArgs) -> Result<()> {
    let topic = args.topic.trim();
    if topic.is_empty() {
        return Err(anyhow!("topic must be non-empty"));
    }
    let keywords = args
        .keywords
        .as_deref()
        .map(util::split_keywords)
        .unwrap_or_default();
    let stages = workspace.stages(lm)?;
    let id = workspace
        .store()
        .create_article(topic, &keywords, None)
        .context("create article")?;
    println!("Article {id} queued: {topic}");

    match workspace.pipeline(stages).run(id, topic)? {
        RunOutcome::Completed(done) => {
            println!(
                "Article {id} ready for review: {} words, {} image(s)",
                report::thousands(done.word_count),
                done.images.len()
            );
            println!("Saved to {}", done.output_path.display());
            Ok(())
        }
        RunOutcome::Failed(failed) => Err(anyhow!(
            "article {id} failed while {}: {}",
            failed.failed_status,
            failed.message
        )),
    }
}

fn cmd_create_batch(workspace: &Workspace, lm: Option<&str>, args: &CreateBatchArgs) -> Result<()> {
    let entries = match &args.file {
        Some(path) => load_topics_from_csv(path)?,
        None => args.topics.iter().map(BatchEntry::new).collect(),
    };
    let stages = workspace.stages(lm)?;
    let summary = workspace
        .pipeline(stages)
        .run_batch(&entries, args.batch_id.as_deref())?;

    println!("Batch {}: {} topic(s)", summary.batch_id, summary.article_ids.len());
    println!("  succeeded: {}", summary.succeeded);
    println!("  failed:    {}", summary.failed);
    println!("Check progress with: seows status --batch {}", summary.batch_id);
    Ok(())
}

fn cmd_status(workspace: &Workspace, args: &StatusArgs) -> Result<()> {
    let query = ArticleQuery::new(workspace.store());
    if let Some(id) = args.article {
        let details = query.article_details(id)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&details)?);
        } else {
            let stages: Vec<_> = StageLog::new(workspace.paths().stage_log_path())
                .load()?
                .into_iter()
                .filter(|entry| entry.article_id == id)
                .collect();
            print!("{}", report::article_detail(&details));
            print!("{}", report::stage_history(&stages));
        }
        return Ok(());
    }

    let filter = ArticleFilter {
        status: args.filter,
        batch_id: args.batch.clone(),
    };
    let articles = query.list_articles(&filter)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&articles)?);
    } else if articles.is_empty() {
        println!("No articles found.");
    } else {
        print!("{}", report::articles_table(&articles));
    }
    Ok(())
}

fn cmd_history(workspace: &Workspace, args: &HistoryArgs) -> Result<()> {
    let versions = ArticleQuery::new(workspace.store()).version_history(args.article_id)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
    } else if versions.is_empty() {
        println!("No versions found for article {}.", args.article_id);
    } else {
        print!("{}", report::history_table(args.article_id, &versions));
    }
    Ok(())
}

fn cmd_delete_version(workspace: &Workspace, args: &DeleteVersionArgs) -> Result<()> {
    let store = workspace.store();
    store.get_article(args.article_id)?;
    if !store.delete_version(args.article_id, args.version)? {
        return Err(anyhow!(
            "article {} has no version {}",
            args.article_id,
            args.version
        ));
    }
    tracing::info!(
        article_id = args.article_id,
        version = args.version,
        "version deleted"
    );
    println!("Deleted version {} of article {}", args.version, args.article_id);
    Ok(())
}

fn cmd_show(workspace: &Workspace, args: &ShowArgs) -> Result<()> {
    match ArticleQuery::new(workspace.store()).article_content(args.article_id)? {
        ArticleContent::Ready(content) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            Ok(())
        }
        ArticleContent::Pending { status } => Err(anyhow!(
            "article {} has no content yet (status: {status})",
            args.article_id
        )),
    }
}

fn cmd_tool(workspace: &Workspace, lm: Option<&str>, args: &ToolArgs) -> Result<()> {
    let tool_args: serde_json::Value =
        serde_json::from_str(&args.args).context("parse --args as JSON")?;
    let result = tools::dispatch(workspace, lm, &args.name, &tool_args);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
