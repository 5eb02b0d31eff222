//! Bookflow CLI - Command-line interface for ebook metadata workflows

mod commands;
mod progress;

use anyhow::Result;
use bookflow_core::SourceType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bookflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow between any source and target
    Run {
        /// Workflow config file (JSON); replaces the type and path options
        #[arg(short, long, conflicts_with_all = ["source", "target", "target_path"])]
        config: Option<PathBuf>,

        /// Source type (calibre, local, csv, json)
        #[arg(short, long, required_unless_present = "config")]
        source: Option<SourceType>,

        /// Calibre database to read from
        #[arg(long)]
        source_db: Option<PathBuf>,

        /// Target type (calibre, csv, json)
        #[arg(short, long, required_unless_present = "config")]
        target: Option<SourceType>,

        /// Target database, file or directory
        #[arg(long, required_unless_present = "config")]
        target_path: Option<PathBuf>,

        /// Base directory of the source
        #[arg(short, long, default_value = ".")]
        base: PathBuf,

        /// Path below the base directory
        #[arg(short, long, default_value = "")]
        local: String,

        /// Create the target if it does not exist
        #[arg(long)]
        create: bool,

        /// Id mapping file
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// File name pattern for local books
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Import books into a Calibre database
    Import {
        /// Source type (local, csv, json, calibre)
        source: SourceType,

        /// Source directory or file
        source_path: PathBuf,

        /// Calibre database file
        #[arg(short, long)]
        db: PathBuf,

        /// Create the database if it does not exist
        #[arg(long)]
        create: bool,

        /// Id mapping file
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// File name pattern for local books
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Export a Calibre database to CSV or JSON
    Export {
        /// Calibre database file
        #[arg(short, long)]
        db: PathBuf,

        /// Target type (csv, json)
        target: SourceType,

        /// Target file or directory
        target_path: PathBuf,

        /// Create the target if it does not exist
        #[arg(long)]
        create: bool,

        /// Write the export as a download response to stdout
        #[arg(long)]
        stdout: bool,
    },

    /// List the authors of a Calibre database
    Authors {
        /// Calibre database file
        #[arg(short, long)]
        db: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set the external link of an author
    LinkAuthor {
        /// Calibre database file
        #[arg(short, long)]
        db: PathBuf,

        /// Author id
        author_id: i64,

        /// Link to store, e.g. a Wikipedia or OpenLibrary URL
        link: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "bookflow_cli=debug,bookflow_core=debug"
    } else {
        "bookflow_cli=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run {
            config,
            source,
            source_db,
            target,
            target_path,
            base,
            local,
            create,
            mapping,
            pattern,
        } => {
            let config = match config {
                Some(path) => commands::load_config(&path)?,
                None => commands::config_from_args(source, source_db, target, target_path, create, mapping)?,
            };
            commands::run(&config, &base, &local, pattern.as_deref())
        }

        Commands::Import {
            source,
            source_path,
            db,
            create,
            mapping,
            pattern,
        } => commands::import(source, &source_path, &db, create, mapping, pattern.as_deref()),

        Commands::Export {
            db,
            target,
            target_path,
            create,
            stdout,
        } => commands::export(&db, target, &target_path, create, stdout),

        Commands::Authors { db, json } => commands::authors(&db, json),

        Commands::LinkAuthor {
            db,
            author_id,
            link,
        } => commands::link_author(&db, author_id, &link),
    }
}
