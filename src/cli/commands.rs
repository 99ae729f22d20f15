//! Subcommand handlers.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::args::ConfigAction;
use crate::api::{ApiError, LibraryApi, LibraryClient};
use crate::book::{LibraryEntry, ReadingStatus};
use crate::config::{self, default_path as get_config_path, Config, ConfigError};
use crate::isbn;
use crate::scanner::BarcodeScanner;
use crate::session::{spawn_listener, ScanController, ScanScreen};

/// Errors reported by subcommands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("'{0}' is not a valid ISBN-10 or ISBN-13")]
    InvalidIsbn(String),

    #[error("{0} of the given codes are not valid ISBNs")]
    InvalidCodes(usize),
}

/// Build the HTTP client described by the configuration.
pub fn build_client(config: &Config) -> Result<LibraryClient, ApiError> {
    LibraryClient::with_settings(
        config.api.base_url.clone(),
        config.api.token.clone(),
        config.api.timeout(),
        config.api.retry_policy(),
    )
}

/// Run the interactive scan screen until the operator quits or `shutdown`
/// is raised.
pub async fn run_scan(
    config: &Config,
    api: Arc<dyn LibraryApi>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), CommandError> {
    let session = config.session.session_config();
    let controller = Arc::new(ScanController::new(api, session));
    let scanner = BarcodeScanner::new(config.scanner.settings());

    let mut screen =
        ScanScreen::new(scanner, controller).with_concurrent_lookups(session.concurrent_lookups);
    let commands = if screen.inline_commands() {
        None
    } else {
        Some(spawn_listener())
    };
    screen.run(commands, shutdown).await;
    Ok(())
}

/// Look up one ISBN and print its metadata.
pub async fn lookup(api: &dyn LibraryApi, code: &str) -> Result<(), CommandError> {
    let cleaned = isbn::clean(code);
    if !isbn::validate(&cleaned) {
        return Err(CommandError::InvalidIsbn(code.to_string()));
    }

    let book = api.lookup_book(&cleaned).await?;
    println!("{}", book.title);
    println!("  Authors:   {}", book.author_line());
    println!("  ISBN:      {}", isbn::format(&book.isbn));
    if let Some(publisher) = &book.publisher {
        println!("  Publisher: {}", publisher);
    }
    if let Some(date) = &book.published_date {
        println!("  Published: {}", date);
    }
    if let Some(pages) = book.page_count {
        println!("  Pages:     {}", pages);
    }
    if let Some(categories) = book.categories.as_ref().filter(|c| !c.is_empty()) {
        println!("  Subjects:  {}", categories.join(", "));
    }
    if let Some(description) = &book.description {
        println!();
        println!("{}", description);
    }
    Ok(())
}

/// Print the library, newest first, optionally filtered by status.
pub async fn library(
    api: &dyn LibraryApi,
    status: Option<ReadingStatus>,
) -> Result<(), CommandError> {
    let entries = api.list_library().await?;
    println!("{}", summary_line(&entries));

    let rows = library_rows(&entries, status);
    if rows.is_empty() {
        match status {
            Some(status) => println!("No books marked {}.", status.label().to_lowercase()),
            None => println!("Your library is empty. Run 'shelfscan scan' to add books."),
        }
        return Ok(());
    }
    println!();
    for row in rows {
        println!("  {}", row);
    }
    Ok(())
}

/// Remove books from the library.
pub async fn remove(api: &dyn LibraryApi, codes: &[String]) -> Result<(), CommandError> {
    let isbns: Vec<String> = codes.iter().map(|c| isbn::clean(c)).collect();
    let response = api.remove_books(&isbns).await?;

    for removed in &response.removed {
        println!("Removed {}", isbn::format(removed));
    }
    for error in &response.errors {
        eprintln!("  ! {}", error);
    }
    if response.removed.is_empty() {
        println!("No books were removed.");
    }
    Ok(())
}

/// Change the reading status of one book.
pub async fn set_status(
    api: &dyn LibraryApi,
    code: &str,
    status: ReadingStatus,
) -> Result<(), CommandError> {
    let change = api.update_status(&isbn::clean(code), status).await?;
    println!(
        "{} is now marked {}",
        isbn::format(&change.isbn),
        change.new_status.label().to_lowercase()
    );
    Ok(())
}

/// Check codes offline. Fails if any code is invalid.
pub fn validate_codes(codes: &[String]) -> Result<(), CommandError> {
    let mut invalid = 0;
    for code in codes {
        let cleaned = isbn::clean(code);
        if isbn::validate(&cleaned) {
            println!("valid    {}", isbn::format(&cleaned));
        } else {
            invalid += 1;
            println!("invalid  {}", code);
        }
    }
    if invalid > 0 {
        return Err(CommandError::InvalidCodes(invalid));
    }
    Ok(())
}

/// Handle config subcommand actions.
pub fn handle_config_action(
    action: ConfigAction,
    explicit_path: Option<&Path>,
    config: &Config,
) -> Result<(), CommandError> {
    let config_path = explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    match action {
        ConfigAction::Show => {
            println!("Current configuration:");
            println!();
            print!("{}", config.to_display_toml()?);
            println!();

            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
        }
        ConfigAction::Init => {
            config::init(&config_path)?;
            println!("Created config file: {}", config_path.display());
        }
    }
    Ok(())
}

/// "N books: a to read, b reading, c read"
pub fn summary_line(entries: &[LibraryEntry]) -> String {
    let counts: Vec<String> = ReadingStatus::ALL
        .iter()
        .map(|status| {
            let n = entries.iter().filter(|e| e.status == *status).count();
            format!("{} {}", n, status.label().to_lowercase())
        })
        .collect();
    let noun = if entries.len() == 1 { "book" } else { "books" };
    format!("{} {}: {}", entries.len(), noun, counts.join(", "))
}

/// One display row per entry, newest first.
pub fn library_rows(entries: &[LibraryEntry], status: Option<ReadingStatus>) -> Vec<String> {
    let mut selected: Vec<&LibraryEntry> = entries
        .iter()
        .filter(|e| status.is_none_or(|s| e.status == s))
        .collect();
    selected.sort_by(|a, b| b.added_at.cmp(&a.added_at));

    selected
        .into_iter()
        .map(|e| {
            format!(
                "{:<17}  {:<8}  {} ({})  added {}",
                isbn::format(&e.book.isbn),
                e.status.label(),
                e.book.title,
                e.book.author_line(),
                e.added_at.format("%Y-%m-%d")
            )
        })
        .collect()
}
