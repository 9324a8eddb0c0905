//! # Syllabus CLI (`syllabus`)
//!
//! Ingest educational resources, search them, and assemble workshop
//! curricula from the command line or over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! syllabus --config ./config/syllabus.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `syllabus init` | Create the SQLite database and run schema migrations |
//! | `syllabus ingest` | Index the resource directory |
//! | `syllabus search "<query>"` | Filtered semantic search |
//! | `syllabus resources` | List indexed resources |
//! | `syllabus curriculum` | Assemble a workshop curriculum |
//! | `syllabus prompt "<request>"` | Cited markdown workshop from a free-form request |
//! | `syllabus dedupe` | Remove records that duplicate another resource |
//! | `syllabus serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! syllabus ingest --root ./resources
//! syllabus search "bias in hiring" --audience undergraduate --tag ethics
//! syllabus curriculum --institution Ethika --audience undergraduate \
//!     --topics bias,privacy --duration 3 --advanced --save plan.txt
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use syllabus::config;
use syllabus::prompt::PromptRequest;
use syllabus::report;
use syllabus::service::{SearchRequest, Syllabus};
use syllabus::{db, ingest, migrate, server};
use syllabus_core::assembler::CurriculumRequest;

/// Syllabus: retrieval-augmented curriculum builder for educational resources.
#[derive(Parser)]
#[command(name = "syllabus", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/syllabus.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Index resource files into the configured collection.
    ///
    /// Re-ingesting the same files overwrites their records in place.
    Ingest {
        /// Resource directory (defaults to `[ingest].root`).
        #[arg(long)]
        root: Option<PathBuf>,

        /// Show counts without embedding or writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Delete the whole collection, including its model tag, first.
        #[arg(long)]
        reset: bool,
    },

    /// Semantic search with optional attribute filters.
    ///
    /// Repeated values of one filter are alternatives; different filters
    /// must all match.
    Search {
        query: String,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long)]
        institution: Option<String>,

        #[arg(long = "audience", value_delimiter = ',')]
        target_audience: Vec<String>,

        #[arg(long = "tag", value_delimiter = ',')]
        tags: Vec<String>,

        #[arg(long = "type", value_delimiter = ',')]
        resource_type: Vec<String>,

        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// List indexed resources in insertion order.
    Resources {
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Assemble a workshop curriculum.
    Curriculum {
        #[arg(long)]
        institution: String,

        #[arg(long = "audience", value_delimiter = ',', required = true)]
        target_audience: Vec<String>,

        #[arg(long, value_delimiter = ',', required = true)]
        topics: Vec<String>,

        /// Workshop length in hours.
        #[arg(long, default_value_t = 2.0)]
        duration: f64,

        #[arg(long = "types", value_delimiter = ',')]
        preferred_types: Vec<String>,

        #[arg(long = "objective")]
        learning_objectives: Vec<String>,

        /// Free-text description of the institution.
        #[arg(long)]
        context: Option<String>,

        /// Also produce detailed workshop content.
        #[arg(long)]
        advanced: bool,

        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,

        /// Also write the output to this file.
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Generate a cited markdown workshop from a free-form request.
    Prompt {
        prompt: String,

        /// Skip the language model and return the resource digest.
        #[arg(long)]
        no_llm: bool,

        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Remove records that duplicate another resource's title and author.
    Dedupe {
        #[arg(long)]
        dry_run: bool,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "syllabus=warn,syllabus_core=warn",
        1 => "syllabus=info,syllabus_core=info",
        _ => "syllabus=debug,syllabus_core=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            root,
            dry_run,
            reset,
        } => {
            if dry_run {
                let root = root.unwrap_or_else(|| cfg.ingest.root.clone());
                ingest::preview_root(&cfg.ingest, &root)?.print();
            } else {
                let service = Syllabus::open_with(cfg, reset).await?;
                service.ingest(root.as_deref(), false).await?.print();
            }
        }
        Commands::Search {
            query,
            limit,
            institution,
            target_audience,
            tags,
            resource_type,
            output,
        } => {
            let limit = limit.unwrap_or(cfg.retrieval.default_limit);
            let service = Syllabus::open(cfg).await?;
            let request = SearchRequest {
                query,
                limit,
                institution,
                target_audience,
                tags,
                resource_type,
            };
            let response = service.search(&request).await?;
            match output {
                OutputFormat::Json => print_json(&response)?,
                OutputFormat::Text => print!("{}", report::format_search(&response)),
            }
        }
        Commands::Resources { limit, output } => {
            let service = Syllabus::open(cfg).await?;
            let resources = service.resources(limit).await?;
            match output {
                OutputFormat::Json => print_json(&resources)?,
                OutputFormat::Text => print!("{}", report::format_resources(&resources)),
            }
        }
        Commands::Curriculum {
            institution,
            target_audience,
            topics,
            duration,
            preferred_types,
            learning_objectives,
            context,
            advanced,
            output,
            save,
        } => {
            let request = CurriculumRequest {
                institution,
                target_audience,
                topics,
                duration_hours: duration,
                preferred_types,
                resources_per_topic: None,
                learning_objectives,
                institution_context: context,
                use_advanced: advanced,
            };
            request.validate()?;

            let service = Syllabus::open(cfg).await?;
            let curriculum = service.curriculum(&request).await?;
            let rendered = match output {
                OutputFormat::Json => serde_json::to_string_pretty(&curriculum)?,
                OutputFormat::Text => report::format_curriculum(&curriculum),
            };
            println!("{}", rendered);
            if let Some(path) = save {
                std::fs::write(&path, &rendered)?;
                println!("\nCurriculum saved to: {}", path.display());
            }
        }
        Commands::Prompt {
            prompt,
            no_llm,
            output,
        } => {
            let mut request = PromptRequest::new(prompt);
            request.use_llm = !no_llm;
            request.validate()?;

            let service = Syllabus::open(cfg).await?;
            let response = service.generate_from_prompt(&request).await?;
            match output {
                OutputFormat::Json => print_json(&response)?,
                OutputFormat::Text => {
                    if let Some(error) = &response.error {
                        println!("{}", error);
                    }
                    if let Some(content) = &response.content {
                        println!("{}", content);
                    }
                    if let Some(note) = &response.note {
                        eprintln!("note: {}", note);
                    }
                }
            }
        }
        Commands::Dedupe { dry_run } => {
            let service = Syllabus::open(cfg).await?;
            let report = service.remove_duplicates(dry_run).await?;
            print!("{}", report::format_dedupe(&report));
        }
        Commands::Serve => {
            let service = Syllabus::open(cfg).await?;
            server::run_server(Arc::new(service)).await?;
        }
    }

    Ok(())
}
