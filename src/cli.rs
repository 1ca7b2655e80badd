//! CLI argument parsing for the article workspace.
use crate::store::{ArticleId, ArticleStatus};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "seows",
    version,
    about = "Research, outline, write and export SEO articles with an LM",
    after_help = "Commands:\n  init                             Write config.json and create the database\n  create <topic>                   Generate one article\n  create-batch [topics..]          Generate several articles under one batch id\n  status                           List articles or show one\n  history <id>                     Show saved versions of an article\n  delete-version <id> <version>    Remove one saved version\n  show <id>                        Print an article's markdown\n  tool <name>                      Call a conversational tool with JSON arguments\n\nExamples:\n  seows init\n  seows --lm 'llm -m gpt-4o' create \"Marathon training\" --keywords \"running,endurance\"\n  seows create-batch --file topics.csv --batch-id spring\n  seows status --filter error\n  seows status --article 3 --json\n  seows tool list_all_articles --args '{\"status\":\"review\"}'",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Workspace directory (database, config.json, exported articles)
    #[arg(long, global = true, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// LM command for every stage; prompt on stdin, answer on stdout
    #[arg(long, global = true, value_name = "CMD")]
    pub lm: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Create(CreateArgs),
    CreateBatch(CreateBatchArgs),
    Status(StatusArgs),
    History(HistoryArgs),
    DeleteVersion(DeleteVersionArgs),
    Show(ShowArgs),
    Tool(ToolArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Write a config stub and initialize the database")]
pub struct InitArgs {
    /// Overwrite an existing config.json
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Generate one article end to end")]
pub struct CreateArgs {
    pub topic: String,

    /// Comma-separated target keywords
    #[arg(long, value_name = "LIST")]
    pub keywords: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Generate several articles under one batch id")]
pub struct CreateBatchArgs {
    /// Topics given directly on the command line
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub topics: Vec<String>,

    /// CSV with a `topic` column and an optional `keywords` column
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Batch id to record instead of a generated one
    #[arg(long, value_name = "ID")]
    pub batch_id: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "List articles, or show one article's details")]
pub struct StatusArgs {
    /// Show a single article
    #[arg(long, value_name = "ID", conflicts_with_all = ["filter", "batch"])]
    pub article: Option<ArticleId>,

    /// Only list articles in this status
    #[arg(long, value_name = "STATUS")]
    pub filter: Option<ArticleStatus>,

    /// Only list articles from this batch
    #[arg(long, value_name = "ID")]
    pub batch: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Show the saved versions of an article")]
pub struct HistoryArgs {
    pub article_id: ArticleId,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Remove one saved version of an article")]
pub struct DeleteVersionArgs {
    pub article_id: ArticleId,

    /// Version number as shown by `history`
    pub version: i64,
}

#[derive(Parser, Debug)]
#[command(about = "Print an article's markdown")]
pub struct ShowArgs {
    pub article_id: ArticleId,
}

#[derive(Parser, Debug)]
#[command(about = "Call a conversational tool and print its JSON result")]
pub struct ToolArgs {
    /// One of: create_article, create_article_batch, list_all_articles,
    /// get_article_details, get_article_content, get_version_history
    pub name: String,

    /// Tool arguments as a JSON value
    #[arg(long, value_name = "JSON", default_value = "{}")]
    pub args: String,
}
