//! Operator input during a scan session.
//!
//! Lines typed on the terminal (or read from the scanner stream when the
//! scanner itself is standard input) are parsed into [`ScanCommand`]s.
//! Slash commands drive the session; any other text is treated as a code,
//! which lets ISBNs be typed by hand when a barcode will not scan.

use std::io::{self, BufRead, Write};
use std::thread;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::book::ReadingStatus;

/// Usage line shown for `/help` and unknown commands.
pub const COMMAND_HELP: &str =
    "Commands: /to-read, /reading, /read, /discard, /remove <isbn>, /submit, /batch, /retry, /quit";

/// A parsed line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanCommand {
    /// A code typed or scanned
    Code(String),
    /// Accept the pending book with a status
    Confirm(ReadingStatus),
    /// Reject the pending book
    Discard,
    /// Drop a book from the batch
    Remove(String),
    /// Send the batch to the library
    Submit,
    /// Print the batch
    ShowBatch,
    /// Restart the scanner after a device error
    Retry,
    Help,
    Quit,
}

impl ScanCommand {
    /// Parse a line of input.
    ///
    /// Returns `None` for blank input and for slash commands that are
    /// unknown or missing an argument (a usage hint is printed).
    pub fn parse(input: &str) -> Option<ScanCommand> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('/') {
            return Self::parse_command(trimmed);
        }
        Some(ScanCommand::Code(trimmed.to_string()))
    }

    fn parse_command(input: &str) -> Option<ScanCommand> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let name = parts.first()?.to_lowercase();

        let command = match name.as_str() {
            "/to-read" | "/toread" | "/to_read" | "/t" => {
                ScanCommand::Confirm(ReadingStatus::ToRead)
            }
            "/reading" => ScanCommand::Confirm(ReadingStatus::Reading),
            "/read" | "/r" => ScanCommand::Confirm(ReadingStatus::Read),
            "/discard" | "/d" => ScanCommand::Discard,
            "/remove" | "/rm" => match parts.get(1) {
                Some(isbn) => ScanCommand::Remove((*isbn).to_string()),
                None => {
                    print_status("Usage: /remove <isbn>");
                    return None;
                }
            },
            "/submit" | "/s" => ScanCommand::Submit,
            "/batch" | "/b" => ScanCommand::ShowBatch,
            "/retry" => ScanCommand::Retry,
            "/help" | "/?" => ScanCommand::Help,
            "/quit" | "/q" | "/exit" => ScanCommand::Quit,
            _ => {
                print_status(&format!("Unknown command: {}", parts[0]));
                print_status(COMMAND_HELP);
                return None;
            }
        };
        Some(command)
    }
}

/// Read operator commands from stdin on a background thread.
///
/// The thread ends at EOF, on a read error, or once the receiver is dropped
/// and the next line arrives.
pub fn spawn_listener() -> UnboundedReceiver<ScanCommand> {
    let (tx, rx) = unbounded_channel();

    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(input) = line else {
                break;
            };
            if let Some(command) = ScanCommand::parse(&input) {
                if tx.send(command).is_err() {
                    break;
                }
            }
        }
        log::debug!("Command listener finished");
    });

    rx
}

/// Print a status line for the operator.
pub fn print_status(message: &str) {
    println!("{}", message);
    let _ = io::stdout().flush();
}
