//! # Notegraph CLI (`note`)
//!
//! The `note` binary is the interface to the knowledge graph. It provides
//! commands for database initialization, vault scanning, LLM-driven
//! extraction, entity inspection, search, and question answering.
//!
//! ## Usage
//!
//! ```bash
//! note --config ~/.config/notegraph/config.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `note init` | Create the SQLite database and run schema migrations |
//! | `note scan` | Sync vault files into the document store |
//! | `note process` | Extract entities and relationships from pending documents |
//! | `note add "<text>"` | Add a quick note without touching the vault |
//! | `note entity <name>` | Show an entity, its aliases, relations, and documents |
//! | `note search "<query>"` | Search entities and documents |
//! | `note ask "<question>"` | Answer a question from the graph |
//! | `note status` | Show document, entity, and relationship counts |
//! | `note rebuild` | Wipe the graph and re-queue every document |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use notegraph::{
    ask, config, db, documents, entities, llm, migrate, models::Direction, process, scan, status,
};

/// Notegraph — a personal knowledge graph built from your notes.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; without it the default config location and built-in defaults apply.
#[derive(Parser)]
#[command(
    name = "note",
    about = "Notegraph — a personal knowledge graph built from your notes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `<config_dir>/notegraph/config.toml`. Vault location and
    /// LLM settings are read from this file; environment variables prefixed
    /// `NOTEGRAPH_` override individual values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates `.notegraph/index.db` inside the vault with all required
    /// tables. Idempotent — running it multiple times is safe.
    Init,

    /// Show document, entity, and relationship counts.
    Status,

    /// Add a quick note directly to the store.
    ///
    /// The first line becomes the title; the note is queued for the next
    /// `note process` run.
    Add {
        /// The note text.
        text: String,
    },

    /// Sync vault files into the document store.
    ///
    /// Walks the vault, fingerprints every supported file, and creates,
    /// updates, or deletes documents to match what's on disk. Changed files
    /// are re-queued for processing.
    Scan,

    /// Extract entities and relationships from pending documents.
    ///
    /// Requires a running LLM server (see `[llm]` in the config). Documents
    /// that fail are marked errored and retried on the next run.
    Process {
        /// Reset every document to pending and re-extract the whole vault
        /// against the current graph.
        #[arg(long)]
        relink: bool,
    },

    /// Show an entity with its aliases, relationships, and documents.
    Entity {
        /// Entity name or id.
        query: String,
    },

    /// Search entities and documents.
    Search {
        /// The search query string.
        query: String,
    },

    /// Answer a question from the knowledge graph.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Wipe all entities, relationships, and links, and re-queue every
    /// document for processing. Documents themselves are kept.
    Rebuild,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized at {}", db::db_path(&cfg).display());
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Add { text } => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            let id = documents::create_entry(&pool, &text).await?;
            println!("Added note {}", id);
        }
        Commands::Scan => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            let summary = scan::run_scan(&pool, &cfg.vault.path).await?;
            println!(
                "Scan complete: {} new, {} modified, {} unchanged, {} deleted",
                summary.new, summary.modified, summary.unchanged, summary.deleted
            );
        }
        Commands::Process { relink } => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            let client = llm::HttpChatClient::new(&cfg)?;
            let summary = process::run_process(&pool, &client, &cfg, relink).await?;
            if summary.processed == 0 && summary.errored == 0 {
                println!("Nothing to process.");
            } else {
                println!(
                    "Linked {} entity mention(s), created {} relationship(s)",
                    summary.entities_linked, summary.relationships_created
                );
            }
        }
        Commands::Entity { query } => {
            let pool = db::connect(&cfg).await?;
            show_entity(&pool, &query).await?;
        }
        Commands::Search { query } => {
            let pool = db::connect(&cfg).await?;
            run_search(&pool, &query).await?;
        }
        Commands::Ask { question } => {
            let pool = db::connect(&cfg).await?;
            let client = llm::HttpChatClient::new(&cfg)?;
            let result = ask::answer_question(&pool, &client, &cfg, &question).await?;
            println!("{}", result.answer);
        }
        Commands::Rebuild => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            migrate::reset_graph(&pool).await?;
            println!("Graph cleared. Run `note process` to re-extract.");
        }
    }

    Ok(())
}

async fn show_entity(pool: &sqlx::SqlitePool, query: &str) -> anyhow::Result<()> {
    let Some(entity) = entities::get_by_name_or_id(pool, query).await? else {
        println!("No entity found for '{}'", query);
        return Ok(());
    };

    println!("{} ({})", entity.name, entity.entity_type);
    println!("  id: {}", entity.id);
    let aliases = entity.alias_list();
    if !aliases.is_empty() {
        println!("  also known as: {}", aliases.join(", "));
    }

    let related = entities::related_entities(pool, &entity.id).await?;
    if !related.is_empty() {
        println!();
        println!("Relationships:");
        for rel in &related {
            match rel.direction {
                Direction::Outgoing => println!(
                    "  {} -> {} ({})",
                    rel.rel_type, rel.entity.name, rel.entity.entity_type
                ),
                Direction::Incoming => println!(
                    "  {} <- {} ({})",
                    rel.rel_type, rel.entity.name, rel.entity.entity_type
                ),
            }
        }
    }

    let docs = entities::documents_for_entity(pool, &entity.id).await?;
    if !docs.is_empty() {
        println!();
        println!("Mentioned in:");
        for doc in &docs {
            let label = doc
                .title
                .as_deref()
                .or(doc.file_path.as_deref())
                .unwrap_or(&doc.document_id);
            match &doc.date {
                Some(date) => println!("  {} ({})", label, date),
                None => println!("  {}", label),
            }
        }
    }

    Ok(())
}

async fn run_search(pool: &sqlx::SqlitePool, query: &str) -> anyhow::Result<()> {
    let entity_hits = entities::search_entities(pool, query).await?;
    if !entity_hits.is_empty() {
        println!("Entities:");
        for entity in &entity_hits {
            println!("  {} ({})", entity.name, entity.entity_type);
        }
    }

    let doc_hits = documents::search_documents(pool, query, 10).await?;
    if !doc_hits.is_empty() {
        if !entity_hits.is_empty() {
            println!();
        }
        println!("Documents:");
        for doc in &doc_hits {
            let label = doc
                .title
                .as_deref()
                .or(doc.file_path.as_deref())
                .unwrap_or(&doc.id);
            match &doc.date {
                Some(date) => println!("  {} ({})", label, date),
                None => println!("  {}", label),
            }
        }
    }

    if entity_hits.is_empty() && doc_hits.is_empty() {
        println!("No matches for '{}'", query);
    }

    Ok(())
}
