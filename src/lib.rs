//! shelfscan library crate.
//!
//! Scans ISBN barcodes, validates and de-duplicates them, looks the books up
//! in a library service and adds the confirmed ones in one batch.

pub mod api;
pub mod book;
pub mod cli;
pub mod config;
pub mod isbn;
pub mod scanner;
pub mod session;
