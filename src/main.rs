//! # elasticutils CLI (`esu`)
//!
//! Build queries, search, and stream whole result sets out of an
//! Elasticsearch-compatible cluster.
//!
//! ## Usage
//!
//! ```bash
//! esu --config ./config/esu.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `esu query` | Print the query built from the flags (no network) |
//! | `esu search <index>` | One-shot search |
//! | `esu scan <index>` | Stream all matches as NDJSON via a point-in-time snapshot |
//! | `esu pit open <index>` / `esu pit close <id>...` | Manage snapshots |
//! | `esu get <index> <id>` | Fetch one document |
//! | `esu put <index> <json>` / `esu update <index> <id> <json>` | Write one document |
//! | `esu index exists\|create\|delete <index>` | Index management |
//! | `esu completions <shell>` | Shell completion script |
//!
//! ## Examples
//!
//! ```bash
//! # Inspect the query before running it
//! esu query --match message=timeout --term service=api --since 2024-05-01
//!
//! # Export a day of errors, 5000 per page
//! esu scan logs --term level=error --since 2024-05-01 --until 2024-05-01 \
//!     --batch-size 5000 > errors.ndjson
//!
//! # Resume from the cursor printed by an interrupted scan
//! esu scan logs --term level=error --after '[1714521600000, 8812]'
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use elasticutils::config::{self, Config};
use elasticutils::query_args::QueryArgs;
use elasticutils::scan_cmd::ScanArgs;
use elasticutils::{get, index_cmd, logging, pit, scan_cmd, search};
use elasticutils_core::scan::DEFAULT_SORT_FIELD;

/// elasticutils: query building and point-in-time scanning for
/// Elasticsearch-compatible clusters.
///
/// Cluster and scan settings are read from a TOML file given with
/// `--config`. See `config/esu.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "esu",
    about = "Query building and point-in-time scanning for Elasticsearch-compatible clusters",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/esu.toml")]
    config: PathBuf,

    /// Debug-level logging on stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the query the flags produce, without contacting the cluster.
    ///
    /// Uses `[scan].date_field` from the config for `--since`/`--until`
    /// when the config can be read, `timestamp` otherwise.
    Query {
        #[command(flatten)]
        query: QueryArgs,

        /// Single-line JSON instead of pretty-printed.
        #[arg(long)]
        compact: bool,
    },

    /// Run a one-shot search and print the response.
    Search {
        index: String,

        #[command(flatten)]
        query: QueryArgs,

        /// Print only each hit's `_source`, one per line.
        #[arg(long)]
        hits_only: bool,
    },

    /// Stream every match through a point-in-time snapshot as NDJSON.
    ///
    /// The final cursor is printed to stderr; pass it to `--after` to resume.
    Scan {
        index: String,

        #[command(flatten)]
        args: ScanArgs,
    },

    /// Open or close point-in-time snapshots.
    Pit {
        #[command(subcommand)]
        action: PitAction,
    },

    /// Print the `_source` of one document.
    Get { index: String, id: String },

    /// Index a document given as JSON (`-` reads stdin).
    Put {
        index: String,
        document: String,

        /// Document id; generated by the cluster when omitted.
        #[arg(long)]
        id: Option<String>,
    },

    /// Merge JSON fields into an existing document (`-` reads stdin).
    Update {
        index: String,
        id: String,
        document: String,
    },

    /// Check, create, or delete an index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum PitAction {
    /// Open a snapshot and print its id.
    Open {
        index: String,

        /// Keep-alive, e.g. `5m`; defaults to `[scan].keep_alive`.
        #[arg(long)]
        keep_alive: Option<String>,
    },
    /// Release one or more snapshots.
    Close {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Print whether the index exists; exit status 1 when it does not.
    Exists { index: String },
    /// Create the index with one shard and one replica.
    Create {
        index: String,

        /// JSON file holding the `mappings` object.
        #[arg(long)]
        mappings: Option<PathBuf>,
    },
    /// Delete the index.
    Delete { index: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Commands that don't require config
    match cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "esu", &mut std::io::stdout());
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Query {
            ref query,
            compact,
        } => {
            let date_field = config::load_config(&cli.config)
                .map(|c| c.scan.date_field)
                .unwrap_or_else(|_| DEFAULT_SORT_FIELD.to_string());
            let built = query.build(&date_field)?;
            if compact {
                println!("{}", serde_json::to_string(&built.to_value())?);
            } else {
                println!("{}", built.to_json_pretty());
            }
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let cfg: Config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Search {
            index,
            query,
            hits_only,
        } => search::run_search(&cfg, &index, &query, hits_only)?,
        Commands::Scan { index, args } => scan_cmd::run_scan(&cfg, &index, &args)?,
        Commands::Pit { action } => match action {
            PitAction::Open { index, keep_alive } => {
                pit::run_open(&cfg, &index, keep_alive.as_deref())?
            }
            PitAction::Close { ids } => pit::run_close(&cfg, &ids)?,
        },
        Commands::Get { index, id } => get::run_get(&cfg, &index, &id)?,
        Commands::Put {
            index,
            document,
            id,
        } => get::run_put(&cfg, &index, id.as_deref(), &document)?,
        Commands::Update {
            index,
            id,
            document,
        } => get::run_update(&cfg, &index, &id, &document)?,
        Commands::Index { action } => match action {
            IndexAction::Exists { index } => {
                if !index_cmd::run_exists(&cfg, &index)? {
                    return Ok(ExitCode::FAILURE);
                }
            }
            IndexAction::Create { index, mappings } => {
                index_cmd::run_create(&cfg, &index, mappings.as_deref())?
            }
            IndexAction::Delete { index } => index_cmd::run_delete(&cfg, &index)?,
        },
        Commands::Completions { .. } | Commands::Query { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(ExitCode::SUCCESS)
}
