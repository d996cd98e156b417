//! erbind CLI
//!
//! Command-line access to the configuration and diagnostic services.
//!
//! # Commands
//!
//! - `config` - Create, edit and list configuration documents
//! - `diag` - Inspect a resolution repository
//! - `seed` - Write a sample repository snapshot
//!
//! The repository is selected with `--database-url` (`memory://<name>` or
//! `file://<path>`), falling back to `ERBIND_DATABASE_URL`.

mod commands;

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Entity resolution configuration and diagnostic tools.
#[derive(Parser)]
#[command(name = "erbind")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Repository URL (memory://NAME or file://PATH)
    #[arg(global = true, short, long)]
    database_url: Option<String>,

    /// Enable verbose output and engine logging
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration documents
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Repository diagnostics
    #[command(subcommand)]
    Diag(DiagCommands),

    /// Write a sample repository snapshot
    Seed {
        /// Snapshot file to write
        output: PathBuf,

        /// Number of entities to generate
        #[arg(short, long, default_value_t = 10)]
        entities: i64,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the default configuration document
    Show,

    /// Add data sources to a configuration document
    AddDataSource {
        /// Data source codes
        #[arg(required = true)]
        codes: Vec<String>,

        /// Saved document to start from (default template otherwise)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// File to write the updated document to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the data sources of a configuration document
    ListDataSources {
        /// Saved document (default template otherwise)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum DiagCommands {
    /// Show cores and memory
    System,

    /// Describe the repository database
    DbInfo,

    /// Show record and entity counts per data source
    DataSources,

    /// Show resolution statistics
    Stats {
        /// Show feature mapping statistics instead
        #[arg(short, long)]
        mapping: bool,
    },

    /// Show an entity's records and relationships
    Entity {
        /// Entity ID
        id: i64,

        /// Include internal features
        #[arg(short, long)]
        internal: bool,
    },

    /// List entities with at least SIZE records
    EntitiesBySize {
        /// Minimum number of records
        size: i32,

        /// Maximum number of rows to print
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// Run the engine's write benchmark
    Perf {
        /// Seconds to run
        #[arg(short, long, default_value_t = 1)]
        seconds: i32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let out = &mut stdout.lock();
    let url = cli.database_url.as_deref();
    let verbose = cli.verbose;
    let format = cli.format.as_str();

    match cli.command {
        Commands::Config(command) => match command {
            ConfigCommands::Show => commands::config::show(out, url, verbose, format)?,
            ConfigCommands::AddDataSource {
                codes,
                input,
                output,
            } => commands::config::add_data_source(
                out,
                url,
                verbose,
                &codes,
                input.as_deref(),
                output.as_deref(),
                format,
            )?,
            ConfigCommands::ListDataSources { input } => {
                commands::config::list_data_sources(out, url, verbose, input.as_deref(), format)?
            }
        },
        Commands::Diag(command) => match command {
            DiagCommands::System => commands::diag::system(out, url, verbose, format)?,
            DiagCommands::DbInfo => commands::diag::db_info(out, url, verbose, format)?,
            DiagCommands::DataSources => commands::diag::data_sources(out, url, verbose, format)?,
            DiagCommands::Stats { mapping } => {
                commands::diag::stats(out, url, verbose, mapping, format)?
            }
            DiagCommands::Entity { id, internal } => {
                commands::diag::entity(out, url, verbose, id, internal, format)?
            }
            DiagCommands::EntitiesBySize { size, limit } => {
                commands::diag::entities_by_size(out, url, verbose, size, limit, format)?
            }
            DiagCommands::Perf { seconds } => {
                commands::diag::perf(out, url, verbose, seconds, format)?
            }
        },
        Commands::Seed { output, entities } => {
            commands::seed::run(out, &output, entities, format)?
        }
        Commands::Version => {
            println!("erbind CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("erbind core v{}", erbind_core::VERSION);
        }
    }

    Ok(())
}
