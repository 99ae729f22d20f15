use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use shelfscan::api::LibraryApi;
use shelfscan::cli::{self, Args, Command, CommandError, ConfigAction};
use shelfscan::config::Config;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), CommandError> {
    // init creates the file the other commands load.
    if let Some(Command::Config {
        action: ConfigAction::Init,
    }) = &args.command
    {
        return cli::handle_config_action(
            ConfigAction::Init,
            args.config.as_deref(),
            &Config::default(),
        );
    }

    let mut config = Config::load(args.config.as_deref())?;
    config.apply_env();

    let command = args.command.unwrap_or(Command::Scan {
        device: None,
        concurrent: false,
    });

    match command {
        Command::Validate { codes } => cli::validate_codes(&codes),
        Command::Config { action } => {
            cli::handle_config_action(action, args.config.as_deref(), &config)
        }
        Command::Scan { device, concurrent } => {
            if let Some(device) = device {
                config.scanner.device = device;
            }
            config.session.concurrent_lookups |= concurrent;

            let api: Arc<dyn LibraryApi> = Arc::new(cli::build_client(&config)?);
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            if let Err(e) = ctrlc::set_handler(move || {
                flag.store(true, Ordering::SeqCst);
                eprintln!("\nReceived Ctrl+C, shutting down...");
            }) {
                log::warn!("Failed to install Ctrl+C handler: {}", e);
            }

            cli::run_scan(&config, api, shutdown).await
        }
        Command::Lookup { isbn } => {
            let client = cli::build_client(&config)?;
            cli::lookup(&client, &isbn).await
        }
        Command::Library { status } => {
            let client = cli::build_client(&config)?;
            cli::library(&client, status.map(Into::into)).await
        }
        Command::Remove { isbns } => {
            let client = cli::build_client(&config)?;
            cli::remove(&client, &isbns).await
        }
        Command::Status { isbn, status } => {
            let client = cli::build_client(&config)?;
            cli::set_status(&client, &isbn, status.into()).await
        }
    }
}
