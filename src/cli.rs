use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mdb")]
#[command(author, version, about = "Studio media archive lineage and metadata tool")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a pipeline event to the archive
    Process {
        /// Event type (capture_start, capture_stop, demux, trim, send, ...)
        event_type: String,

        /// JSON payload file, or "-" to read stdin
        #[arg(default_value = "-")]
        payload: String,

        /// Print the operation and its events as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create the database and apply pending migrations
    Migrate,

    /// Show the ancestry of a file
    Lineage {
        /// SHA-1 of the file
        sha1: String,
    },

    /// List content units attached to files derived from a file
    Descendants {
        /// SHA-1 of the file
        sha1: String,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
