use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use promptkeep_store::Prompt;
use promptkeep_store::PromptStore;
use promptkeep_store::StorageType;
use promptkeep_store::StoreConfig;
use promptkeep_store::search::search;
use promptkeep_store::store::SaveReport;
use promptkeep_store::transfer;
use promptkeep_store::types::NotionConfig;
use uuid::Uuid;

/// Manage a prompt library stored across a compact and a bulk backend.
#[derive(Debug, Parser)]
#[command(name = "promptkeep", version)]
pub struct PromptCli {
    /// Directory holding the backend files. Defaults to `data_dir` from
    /// `config.toml` under the promptkeep home.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: PromptCommand,
}

/// Prompt subcommands.
#[derive(Debug, clap::Subcommand)]
pub enum PromptCommand {
    /// Add a new prompt. Pass `-` as content to read it from stdin.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        content: String,
    },
    /// Edit an existing prompt.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        /// Replace the prompt's tags.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Remove a prompt by id.
    Rm { id: String },
    /// List prompts.
    List,
    /// Print one prompt as JSON.
    Show { id: String },
    /// Search titles and content, optionally restricted to tags.
    Search {
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(default_value = "")]
        query: String,
    },
    /// Print the tag index.
    Tags,
    /// Export all prompts as a JSON array.
    Export {
        /// Write `prompts-export-<timestamp>.json` into this directory
        /// instead of printing to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Merge prompts from a JSON array file (`-` for stdin).
    Import { file: PathBuf },
    /// Re-save the collection under another storage type.
    Migrate { storage: StorageType },
    /// Show collection and backend statistics.
    Stats,
    /// Store the third-party sync credential.
    NotionConfig {
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        page_id: String,
    },
    /// Show the last sync outcome.
    SyncStatus,
}

/// `PROMPTKEEP_HOME`, or `~/.promptkeep`.
pub fn resolve_home() -> anyhow::Result<PathBuf> {
    if let Some(home) = std::env::var_os("PROMPTKEEP_HOME") {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|h| h.join(".promptkeep"))
        .context("cannot determine home directory; set PROMPTKEEP_HOME")
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}

fn print_row(prompt: &Prompt) {
    println!("{}\t{}\t{}", prompt.id, prompt.title, prompt.tags.join(", "));
}

fn report_fallback(report: &SaveReport) {
    if report.fallback {
        eprintln!(
            "warning: collection too large for sync storage, saved to {} storage",
            report.backend
        );
    }
}

/// Execute the prompt command.
pub fn run(cli: PromptCli) -> anyhow::Result<()> {
    let home = resolve_home()?;
    let mut config = StoreConfig::load(&home)?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    tracing::debug!(data_dir = %config.data_dir.display(), "opening prompt store");

    let mut store = PromptStore::open(&config)?;
    let loaded = store.load()?;
    if !loaded.degraded.is_empty() {
        eprintln!(
            "warning: {} prompt(s) could not be fully reassembled: {}",
            loaded.degraded.len(),
            loaded.degraded.join(", ")
        );
    }

    match cli.cmd {
        PromptCommand::Add {
            title,
            tags,
            content,
        } => {
            let content = if content == "-" {
                read_input(Path::new("-"))?
            } else {
                content
            };
            let now = Utc::now().timestamp_millis();
            let prompt = Prompt {
                id: Uuid::new_v4().to_string(),
                title,
                content,
                tags,
                created_at: now,
                updated_at: now,
            };
            let id = prompt.id.clone();
            report_fallback(&store.upsert(prompt)?);
            println!("{id}");
        }
        PromptCommand::Edit {
            id,
            title,
            content,
            tags,
        } => {
            let Some(mut prompt) = store.get(&id).cloned() else {
                anyhow::bail!("prompt id not found: {id}");
            };
            if let Some(title) = title {
                prompt.title = title;
            }
            if let Some(content) = content {
                prompt.content = content;
            }
            if !tags.is_empty() {
                prompt.tags = tags;
            }
            prompt.updated_at = Utc::now().timestamp_millis();
            report_fallback(&store.upsert(prompt)?);
        }
        PromptCommand::Rm { id } => {
            store.delete(&id)?;
        }
        PromptCommand::List => {
            for prompt in store.prompts() {
                print_row(prompt);
            }
        }
        PromptCommand::Show { id } => {
            let Some(prompt) = store.get(&id) else {
                anyhow::bail!("prompt id not found: {id}");
            };
            println!("{}", serde_json::to_string_pretty(prompt)?);
        }
        PromptCommand::Search { tags, query } => {
            for prompt in search(store.prompts(), &query, tags.as_slice()) {
                print_row(prompt);
            }
        }
        PromptCommand::Tags => {
            for tag in store.tags() {
                println!("{tag}");
            }
        }
        PromptCommand::Export { out: Some(dir) } => {
            let path = transfer::export_to_dir(&store, &dir, Utc::now())?;
            println!(
                "Exported {} prompts to {}",
                store.prompts().len(),
                path.display()
            );
        }
        PromptCommand::Export { out: None } => {
            println!("{}", transfer::export_json(store.prompts())?);
        }
        PromptCommand::Import { file } => {
            let text = read_input(&file)?;
            let imported = transfer::import_json(&mut store, &text)?;
            report_fallback(&imported.report);
            println!(
                "Imported {} prompts ({} total)",
                imported.count,
                imported.prompts.len()
            );
        }
        PromptCommand::Migrate { storage } => {
            let report = store.migrate(storage)?;
            report_fallback(&report);
            println!(
                "Migrated {} prompts to {storage} ({} backend)",
                store.prompts().len(),
                report.backend
            );
        }
        PromptCommand::Stats => {
            println!("{}", serde_json::to_string_pretty(&store.stats()?)?);
        }
        PromptCommand::NotionConfig { api_key, page_id } => {
            store.set_notion_config(&NotionConfig { api_key, page_id })?;
            println!("Saved Notion configuration");
        }
        PromptCommand::SyncStatus => {
            println!("{}", serde_json::to_string_pretty(&store.sync_status()?)?);
        }
    }
    Ok(())
}
