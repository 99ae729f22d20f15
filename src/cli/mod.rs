//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;

pub use args::{Args, Command, ConfigAction};
pub use commands::{
    build_client, handle_config_action, library, library_rows, lookup, remove, run_scan,
    set_status, summary_line, validate_codes, CommandError,
};
pub use enums::StatusArg;
