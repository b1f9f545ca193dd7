//! CLI commands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pit-db CLI
#[derive(Parser, Debug)]
#[command(name = "pit-db")]
#[command(about = "Point-in-time versioned record store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the demonstration scenario
    Demo {
        /// Save the resulting table to this file
        #[arg(short, long)]
        save: Option<PathBuf>,
        /// Default overlap mode (raise, skip, replace)
        #[arg(short, long, default_value = "replace")]
        mode: String,
    },
    /// Upsert a JSON array of records into a table file
    Import {
        /// Table file; created when it does not exist
        #[arg(short, long)]
        file: PathBuf,
        /// JSON file holding an array of record objects
        #[arg(short, long)]
        records: PathBuf,
        /// Store configuration; creates a new table, or must match the schema
        /// of an existing one and then sets the overlap mode
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Overlap mode for this import (defaults to the table's mode)
        #[arg(short, long)]
        mode: Option<String>,
    },
    /// Records active at an instant (AS OF)
    AsOf {
        /// Table file
        #[arg(short, long)]
        file: PathBuf,
        /// Instant to query
        #[arg(short, long)]
        timestamp: String,
    },
    /// Current version of every live key
    Latest {
        /// Table file
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Full version history
    History {
        /// Table file
        #[arg(short, long)]
        file: PathBuf,
        /// Exact-match filter as name=value; repeatable
        #[arg(long = "filter")]
        filters: Vec<String>,
    },
    /// Active records at several instants, tagged by instant
    Snapshot {
        /// Table file
        #[arg(short, long)]
        file: PathBuf,
        /// Instants to query
        #[arg(short, long, num_args = 1..)]
        timestamps: Vec<String>,
    },
}
