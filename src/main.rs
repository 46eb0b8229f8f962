// ABOUTME: Entry point for the gohanlog binary.
// ABOUTME: Parses CLI arguments, initializes tracing, opens the store, and prints results as JSON.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use gohanlog_core::{LogDraft, LogFilter, TagType};
use gohanlog_store::{
    BackupCodec, ChangeFeed, DebugSnapshot, DeliveryOutcome, DownloadTarget, GohanConfig,
    LogRepository, Store,
};
use serde_json::json;

#[derive(Parser)]
#[command(name = "gohanlog")]
#[command(about = "Dining memory log with tag frequency suggestions and JSON backups", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List logs newest first.
    Logs {
        /// Case-insensitive text matched against place and people
        #[arg(short, long)]
        query: Option<String>,
        /// Only logs with this person
        #[arg(long)]
        person: Option<String>,
        /// Only logs at this place
        #[arg(long)]
        place: Option<String>,
        /// Maximum number of results (default: GOHANLOG_PAGE_SIZE)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Record a meal.
    AddLog {
        place: String,
        /// Companions (repeatable)
        #[arg(short, long = "person")]
        people: Vec<String>,
        /// Day of the meal, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Delete one log.
    DeleteLog { id: i64 },

    /// List tags of one type, most used first.
    Tags { tag_type: TagType },

    /// Add a tag suggestion without a log.
    AddTag {
        tag_type: TagType,
        name: String,
        #[arg(long)]
        emoji: Option<String>,
    },

    /// Rename a tag everywhere, merging into an existing tag of that name.
    RenameTag {
        id: i64,
        old: String,
        new: String,
        tag_type: TagType,
    },

    /// Set or clear a tag's emoji.
    TagEmoji { id: i64, emoji: Option<String> },

    /// Delete a tag suggestion. Logs keep their text.
    DeleteTag { id: i64 },

    /// Write a backup document to the export directory.
    Export {
        /// Directory to save into (default: GOHANLOG_EXPORT_DIR)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Merge a backup document into the store.
    Import { file: PathBuf },

    /// Print a diagnostic snapshot of the store.
    Debug {
        /// Also save the snapshot into the export directory
        #[arg(long)]
        save: bool,
    },
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn saved_path(outcome: DeliveryOutcome) -> serde_json::Value {
    match outcome {
        DeliveryOutcome::Shared => json!({ "shared": true }),
        DeliveryOutcome::Saved(path) => json!({ "saved": path }),
    }
}

async fn run(command: Command, config: GohanConfig, store: Store) -> anyhow::Result<()> {
    let feed = ChangeFeed::default();
    let repo = LogRepository::with_config(store.clone(), feed.clone(), &config);

    match command {
        Command::Logs {
            query,
            person,
            place,
            limit,
        } => {
            let filter = LogFilter {
                query,
                person,
                place,
                limit,
            };
            print_json(&repo.list_logs(filter).await?)?;
        }
        Command::AddLog {
            place,
            people,
            date,
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let id = repo.create_log(LogDraft::new(date, place, people)).await?;
            print_json(&repo.get_log(id).await?)?;
        }
        Command::DeleteLog { id } => {
            repo.delete_log(id).await?;
            print_json(&json!({ "deleted": id }))?;
        }
        Command::Tags { tag_type } => {
            print_json(&repo.list_tags(tag_type).await?)?;
        }
        Command::AddTag {
            tag_type,
            name,
            emoji,
        } => {
            let id = repo.create_tag(&name, tag_type, emoji.as_deref()).await?;
            print_json(&json!({ "id": id }))?;
        }
        Command::RenameTag {
            id,
            old,
            new,
            tag_type,
        } => {
            print_json(&repo.rename_tag(id, &old, &new, tag_type).await?)?;
        }
        Command::TagEmoji { id, emoji } => {
            repo.set_tag_emoji(id, emoji.as_deref()).await?;
            print_json(&json!({ "id": id, "emoji": emoji }))?;
        }
        Command::DeleteTag { id } => {
            repo.delete_tag(id).await?;
            print_json(&json!({ "deleted": id }))?;
        }
        Command::Export { dir } => {
            let codec = BackupCodec::with_config(store, feed, &config);
            let download = DownloadTarget::new(dir.unwrap_or(config.export_dir));
            let outcome = codec.export_backup(None, &download).await?;
            print_json(&saved_path(outcome))?;
        }
        Command::Import { file } => {
            let codec = BackupCodec::with_config(store, feed, &config);
            let summary = codec
                .import_file(&file)
                .await
                .with_context(|| format!("importing {}", file.display()))?;
            print_json(&summary)?;
        }
        Command::Debug { save } => {
            let snapshot = DebugSnapshot::collect(&store).await;
            print_json(&snapshot)?;
            if save {
                let outcome = snapshot
                    .export(None, &DownloadTarget::new(config.export_dir))
                    .await?;
                eprintln!("{}", saved_path(outcome));
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gohanlog=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = GohanConfig::from_env()?;
    let store = Store::open(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))?;

    let result = run(cli.command, config, store.clone()).await;
    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    store.close()?;
    result
}
