//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::enums::StatusArg;

/// Scan ISBN barcodes into your reading library
#[derive(Parser, Debug)]
#[command(name = "shelfscan")]
#[command(version, about = "Scan ISBN barcodes into your reading library", long_about = None)]
pub struct Args {
    /// Subcommand to run (default: scan)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scan barcodes and add the books to your library
    Scan {
        /// Scanner device path, or "-" for standard input
        #[arg(long, short)]
        device: Option<String>,

        /// Look up several scanned books at once
        #[arg(long)]
        concurrent: bool,
    },
    /// Look up a book by ISBN
    Lookup {
        isbn: String,
    },
    /// List the books in your library
    Library {
        /// Only show books with this status
        #[arg(long, short)]
        status: Option<StatusArg>,
    },
    /// Remove books from your library
    Remove {
        #[arg(required = true)]
        isbns: Vec<String>,
    },
    /// Change the reading status of a book
    Status {
        isbn: String,
        status: StatusArg,
    },
    /// Check ISBN checksums without contacting the service
    Validate {
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}
