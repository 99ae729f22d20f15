//! Interactive scan screen.
//!
//! Ties a [`BarcodeScanner`] to a [`ScanController`]: decoded codes and
//! operator commands are fed to the controller and results are printed as
//! they happen. The device is held only while the screen is entered.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::api::LibraryApi;
use crate::book::{Book, PendingBook};
use crate::isbn;
use crate::scanner::{BarcodeScanner, CodeSource, ScanEvent, ScannerError};

use super::controller::ScanController;
use super::prompt::{print_status, ScanCommand, COMMAND_HELP};
use super::state::{DecodeOutcome, ScanState, SessionError};

/// How often notices are expired and the shutdown flag is checked.
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Whether the screen keeps running after handling an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

enum Input {
    Scan(Option<ScanEvent>),
    Command(Option<ScanCommand>),
    Tick,
}

/// The scan screen.
pub struct ScanScreen<A: ?Sized> {
    scanner: BarcodeScanner,
    controller: Arc<ScanController<A>>,
    events: Option<UnboundedReceiver<ScanEvent>>,
    /// The scan stream also carries slash commands (scanner on stdin)
    inline_commands: bool,
    concurrent_lookups: bool,
    shutdown: Arc<AtomicBool>,
}

impl<A: LibraryApi + ?Sized + 'static> ScanScreen<A> {
    pub fn new(scanner: BarcodeScanner, controller: Arc<ScanController<A>>) -> Self {
        let inline_commands = scanner.settings().reads_stdin();
        Self {
            scanner,
            controller,
            events: None,
            inline_commands,
            concurrent_lookups: false,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run lookups as background tasks instead of one at a time.
    pub fn with_concurrent_lookups(mut self, enabled: bool) -> Self {
        self.concurrent_lookups = enabled;
        self
    }

    pub fn controller(&self) -> &Arc<ScanController<A>> {
        &self.controller
    }

    pub fn inline_commands(&self) -> bool {
        self.inline_commands
    }

    /// Acquire the configured device and start scanning.
    ///
    /// Returns false if the device could not be opened; the session is
    /// then in the camera-error state until `/retry`.
    pub fn enter(&mut self) -> bool {
        let result = self.scanner.start();
        self.on_started(result)
    }

    /// Like [`enter`](Self::enter) with a caller-supplied source.
    pub fn enter_with<F>(&mut self, open: F) -> bool
    where
        F: FnOnce() -> Result<Box<dyn CodeSource>, ScannerError> + Send + 'static,
    {
        let result = self.scanner.start_with(open);
        self.on_started(result)
    }

    fn on_started(&mut self, result: Result<UnboundedReceiver<ScanEvent>, ScannerError>) -> bool {
        match result {
            Ok(events) => {
                self.events = Some(events);
                self.controller.scanning_started();
                print_status(&format!(
                    "Scanning from {}. Type /help for commands.",
                    describe_device(&self.scanner.settings().device)
                ));
                // A book parked by an earlier device failure is shown again.
                if let ScanState::AwaitingConfirmation(book) = self.controller.snapshot().state {
                    print_confirmation(&book);
                }
                true
            }
            Err(e) => {
                log::error!("Failed to start scanner: {}", e);
                self.controller.camera_failed(e.to_string());
                print_status(&format!("! {}", e));
                print_status("Fix the device and type /retry, or /quit.");
                false
            }
        }
    }

    /// Stop scanning and release the device.
    pub fn leave(&mut self) {
        self.scanner.stop();
        self.events = None;
        self.controller.scanning_stopped();
    }

    /// Enter the screen and process input until quit, end of input, or
    /// `shutdown` is raised.
    ///
    /// `commands` carries operator input when the scanner is a separate
    /// device; pass `None` when the scan stream carries commands itself.
    pub async fn run(
        &mut self,
        mut commands: Option<UnboundedReceiver<ScanCommand>>,
        shutdown: Arc<AtomicBool>,
    ) {
        self.shutdown = shutdown;
        if self.events.is_none() {
            self.enter();
        }
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let input = tokio::select! {
                event = recv_or_pending(&mut self.events) => Input::Scan(event),
                command = recv_or_pending(&mut commands) => Input::Command(command),
                _ = tick.tick() => Input::Tick,
            };

            let flow = match input {
                Input::Scan(Some(event)) => self.handle_event(event).await,
                Input::Scan(None) => self.handle_event(ScanEvent::Ended).await,
                Input::Command(Some(command)) => self.handle(command).await,
                Input::Command(None) => {
                    log::debug!("Command input closed");
                    commands = None;
                    Flow::Continue
                }
                Input::Tick => self.on_tick(),
            };

            if flow == Flow::Quit {
                break;
            }
        }

        let pending = self.controller.snapshot().batch.len();
        if pending > 0 {
            print_status(&format!("Leaving with {} unsubmitted book(s).", pending));
        }
        self.leave();
    }

    async fn handle_event(&mut self, event: ScanEvent) -> Flow {
        match event {
            ScanEvent::Decoded(text) => {
                if self.inline_commands {
                    match ScanCommand::parse(&text) {
                        Some(command) => self.handle(command).await,
                        None => Flow::Continue,
                    }
                } else {
                    self.handle(ScanCommand::Code(text)).await
                }
            }
            ScanEvent::Error(message) => {
                self.controller.scan_error(&message);
                print_status(&format!("! Scanner error: {}", message));
                Flow::Continue
            }
            ScanEvent::Ended => {
                self.events = None;
                if self.inline_commands {
                    // End of standard input ends the session.
                    return Flow::Quit;
                }
                self.scanner.stop();
                self.controller.camera_failed("Scanner stream ended");
                print_status("! Scanner stream ended. Type /retry to reconnect.");
                Flow::Continue
            }
        }
    }

    /// Apply one operator command.
    pub async fn handle(&mut self, command: ScanCommand) -> Flow {
        match command {
            ScanCommand::Code(code) => return self.scan(code).await,
            ScanCommand::Confirm(status) => match self.controller.confirm(status) {
                Ok(entry) => {
                    print_added(&entry, self.controller.snapshot().batch.len());
                    self.show_next_confirmation();
                }
                Err(e) => print_status(&format!("! {}", e)),
            },
            ScanCommand::Discard => match self.controller.discard() {
                Ok(book) => {
                    print_status(&format!("Discarded {}", book.title));
                    self.show_next_confirmation();
                }
                Err(e) => print_status(&format!("! {}", e)),
            },
            ScanCommand::Remove(isbn) => match self.controller.remove_from_batch(&isbn) {
                Ok(Some(entry)) => print_status(&format!("Removed {}", entry.book.title)),
                Ok(None) => print_status(&format!("{} is not in the batch", isbn)),
                Err(e) => print_status(&format!("! {}", e)),
            },
            ScanCommand::Submit => return self.submit().await,
            ScanCommand::ShowBatch => print_batch(&self.controller.snapshot().batch),
            ScanCommand::Retry => self.retry(),
            ScanCommand::Help => print_status(COMMAND_HELP),
            ScanCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn on_tick(&self) -> Flow {
        if self.controller.expire_notice() {
            log::trace!("Notice expired");
        }
        if self.shutdown.load(Ordering::SeqCst) {
            Flow::Quit
        } else {
            Flow::Continue
        }
    }

    /// Await `work` while still expiring notices and watching for shutdown.
    ///
    /// Returns `None` if shutdown was raised first; `work` is then dropped.
    async fn while_ticking<F: Future>(&self, work: F) -> Option<F::Output> {
        tokio::pin!(work);
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                output = &mut work => return Some(output),
                _ = tick.tick() => {
                    if self.on_tick() == Flow::Quit {
                        log::debug!("Shutdown while waiting on the library service");
                        return None;
                    }
                }
            }
        }
    }

    async fn scan(&self, code: String) -> Flow {
        if self.concurrent_lookups {
            let controller = Arc::clone(&self.controller);
            tokio::spawn(async move {
                let outcome = controller.on_decoded(&code).await;
                print_outcome(&outcome);
            });
            return Flow::Continue;
        }
        match self.while_ticking(self.controller.on_decoded(&code)).await {
            Some(outcome) => {
                print_outcome(&outcome);
                Flow::Continue
            }
            None => Flow::Quit,
        }
    }

    async fn submit(&self) -> Flow {
        let Some(result) = self.while_ticking(self.controller.submit_batch()).await else {
            return Flow::Quit;
        };
        match result {
            Ok(report) => {
                print_status(&format!(
                    "Added {} of {} book(s) to your library.",
                    report.added, report.submitted
                ));
                for error in &report.errors {
                    print_status(&format!("  ! {}", error));
                }
            }
            Err(SessionError::SubmitFailed(message)) => {
                print_status(&format!(
                    "! Failed to add the books to your library ({}). The batch was kept; /submit to retry.",
                    message
                ));
            }
            Err(e) => print_status(&format!("! {}", e)),
        }
        Flow::Continue
    }

    fn retry(&mut self) {
        match self.controller.snapshot().state {
            ScanState::CameraError(_) | ScanState::Idle => {
                self.scanner.stop();
                self.enter();
            }
            _ => print_status("Scanner is already running."),
        }
    }

    fn show_next_confirmation(&self) {
        if let ScanState::AwaitingConfirmation(book) = self.controller.snapshot().state {
            print_confirmation(&book);
        }
    }
}

impl<A: ?Sized> Drop for ScanScreen<A> {
    fn drop(&mut self) {
        self.scanner.stop();
    }
}

async fn recv_or_pending<T>(rx: &mut Option<UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn describe_device(device: &str) -> String {
    if device.trim() == crate::scanner::STDIN_DEVICE {
        "standard input".to_string()
    } else {
        device.to_string()
    }
}

fn print_outcome(outcome: &DecodeOutcome) {
    match outcome {
        DecodeOutcome::Ignored => {}
        DecodeOutcome::Noticed(kind) => print_status(&format!("! {}", kind.message())),
        DecodeOutcome::Confirming(book) => print_confirmation(book),
        DecodeOutcome::Queued(isbn) => {
            print_status(&format!("Found {}; shown after the current book.", isbn::format(isbn)))
        }
    }
}

fn print_confirmation(book: &Book) {
    print_status("");
    print_status(&format!("  {}", book.title));
    print_status(&format!("  {}", book.author_line()));
    let mut details = vec![isbn::format(&book.isbn)];
    if let Some(publisher) = &book.publisher {
        details.push(publisher.clone());
    }
    if let Some(date) = &book.published_date {
        details.push(date.clone());
    }
    print_status(&format!("  {}", details.join(" | ")));
    print_status("Add as /to-read, /reading or /read, or /discard");
}

fn print_added(entry: &PendingBook, batch_len: usize) {
    print_status(&format!(
        "Added {} as {} ({} in batch)",
        entry.book.title,
        entry.status.label(),
        batch_len
    ));
}

fn print_batch(batch: &[PendingBook]) {
    if batch.is_empty() {
        print_status("The batch is empty.");
        return;
    }
    print_status(&format!("{} book(s) ready to add:", batch.len()));
    for entry in batch {
        print_status(&format!(
            "  {:<17}  {:<8}  {} ({})",
            isbn::format(entry.isbn()),
            entry.status.label(),
            entry.book.title,
            entry.book.author_line()
        ));
    }
}
