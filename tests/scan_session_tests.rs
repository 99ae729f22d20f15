//! Scan session behaviour against an in-memory library service.
//!
//! These tests cover:
//! - The decode pipeline stages and their order
//! - Duplicate suppression while lookups are in flight
//! - Confirmation, batch editing and submission
//! - The scan screen driven by a scripted scanner

mod support;

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shelfscan::book::ReadingStatus;
use shelfscan::isbn;
use shelfscan::scanner::{BarcodeScanner, CodeSource, LineSource, ScannerSettings};
use shelfscan::session::{
    DecodeOutcome, NoticeKind, ScanController, ScanScreen, ScanState, SessionConfig, SessionError,
};
use support::FakeLibrary;

const SIGNALS: &str = "9780306406157";
const NOISE: &str = "0306406152";

fn controller_with(library: FakeLibrary, config: SessionConfig) -> ScanController<FakeLibrary> {
    let controller = ScanController::new(Arc::new(library), config);
    controller.scanning_started();
    controller
}

fn controller(library: FakeLibrary) -> ScanController<FakeLibrary> {
    controller_with(library, SessionConfig::default())
}

fn catalog() -> FakeLibrary {
    FakeLibrary::new()
        .with_book(SIGNALS, "Signals and Systems")
        .with_book(NOISE, "Noise")
}

// === Validator ===

#[test]
fn test_validate_matches_checksums() {
    assert!(isbn::validate(SIGNALS));
    assert!(isbn::validate(NOISE));
    assert!(isbn::validate("080442957X"));
    assert!(!isbn::validate("9780306406158"));
    assert!(!isbn::validate("0306406153"));
    assert!(!isbn::validate("12345"));
}

// === Decode pipeline ===

#[tokio::test]
async fn test_decode_lookup_confirm_flow() {
    let controller = controller(catalog());

    let outcome = controller.on_decoded(SIGNALS).await;
    assert!(matches!(outcome, DecodeOutcome::Confirming(ref b) if b.isbn == SIGNALS));
    assert!(controller.snapshot().state.is_paused());

    controller.confirm(ReadingStatus::ToRead).unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.batch.len(), 1);
    assert_eq!(snapshot.batch[0].isbn(), SIGNALS);
    assert_eq!(snapshot.batch[0].status, ReadingStatus::ToRead);
    assert_eq!(snapshot.state, ScanState::Scanning);
    assert!(snapshot.state.pending().is_none());
}

#[tokio::test]
async fn test_same_isbn_twice_before_resolution_looks_up_once() {
    let library = Arc::new(catalog().with_latency(Duration::from_millis(20)));
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();

    let (first, second) = tokio::join!(
        controller.on_decoded(SIGNALS),
        controller.on_decoded(SIGNALS)
    );

    assert!(matches!(first, DecodeOutcome::Confirming(_)));
    assert_eq!(second, DecodeOutcome::Ignored);
    assert_eq!(library.lookups(), 1);
}

#[tokio::test]
async fn test_concurrent_mode_dedups_same_isbn_but_not_distinct_ones() {
    let library = Arc::new(catalog().with_latency(Duration::from_millis(20)));
    let controller = ScanController::new(
        Arc::clone(&library),
        SessionConfig {
            concurrent_lookups: true,
            ..SessionConfig::default()
        },
    );
    controller.scanning_started();

    let (a, b, c) = tokio::join!(
        controller.on_decoded(SIGNALS),
        controller.on_decoded(SIGNALS),
        controller.on_decoded(NOISE)
    );

    assert_eq!(b, DecodeOutcome::Ignored);
    assert_eq!(library.lookups(), 2);
    // One of the found books is showing, the other waits its turn.
    let outcomes = [a, c];
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, DecodeOutcome::Confirming(_)))
            .count(),
        1
    );
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, DecodeOutcome::Queued(_)))
            .count(),
        1
    );

    controller.confirm(ReadingStatus::Read).unwrap();
    assert!(controller.snapshot().state.is_paused());
    controller.confirm(ReadingStatus::Reading).unwrap();
    assert_eq!(controller.snapshot().batch.len(), 2);
}

#[tokio::test]
async fn test_owned_isbn_never_looked_up() {
    let library = Arc::new(catalog().with_owned(SIGNALS, ReadingStatus::Read));
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();

    let outcome = controller.on_decoded(SIGNALS).await;
    assert_eq!(outcome, DecodeOutcome::Noticed(NoticeKind::AlreadyOwned));
    assert_eq!(library.lookups(), 0);

    // Once known as owned, the library is not even consulted again.
    let lists = library.list_calls.load(Ordering::SeqCst);
    let outcome = controller.on_decoded(SIGNALS).await;
    assert_eq!(outcome, DecodeOutcome::Noticed(NoticeKind::AlreadyOwned));
    assert_eq!(library.lookups(), 0);
    assert_eq!(library.list_calls.load(Ordering::SeqCst), lists);

    let snapshot = controller.snapshot();
    assert!(snapshot.owned.contains(SIGNALS));
    assert!(!snapshot.in_flight.contains(SIGNALS));
    assert_eq!(
        snapshot.notice.map(|n| n.message),
        Some("You already own this book".to_string())
    );
}

#[tokio::test]
async fn test_owned_match_ignores_hyphenation() {
    let library = Arc::new(catalog().with_owned("978-0-306-40615-7", ReadingStatus::ToRead));
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();

    let outcome = controller.on_decoded(SIGNALS).await;
    assert_eq!(outcome, DecodeOutcome::Noticed(NoticeKind::AlreadyOwned));
    assert_eq!(library.lookups(), 0);
}

#[tokio::test]
async fn test_invalid_barcode_notice_leaves_state_unchanged() {
    let controller = controller(catalog());
    let before = controller.snapshot();

    let outcome = controller.on_decoded("0000000000").await;
    assert_eq!(outcome, DecodeOutcome::Noticed(NoticeKind::InvalidBarcode));

    let after = controller.snapshot();
    assert_eq!(after.batch, before.batch);
    assert_eq!(after.in_flight, before.in_flight);
    assert_eq!(
        after.notice.map(|n| n.message),
        Some("Invalid barcode (ISBN required)".to_string())
    );
}

#[tokio::test]
async fn test_batched_isbn_is_ignored_without_notice_or_lookup() {
    let library = Arc::new(catalog());
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();
    controller.on_decoded(SIGNALS).await;
    controller.confirm(ReadingStatus::ToRead).unwrap();

    let before = controller.snapshot();
    let lookups = library.lookups();

    let outcome = controller.on_decoded(SIGNALS).await;
    assert_eq!(outcome, DecodeOutcome::Ignored);

    let after = controller.snapshot();
    assert_eq!(after.batch, before.batch);
    assert!(after.notice.is_none());
    assert_eq!(library.lookups(), lookups);
}

#[tokio::test]
async fn test_unknown_isbn_raises_not_found_and_can_be_rescanned() {
    let library = Arc::new(FakeLibrary::new());
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();

    let outcome = controller.on_decoded(NOISE).await;
    assert_eq!(outcome, DecodeOutcome::Noticed(NoticeKind::NotFound));
    assert!(!controller.snapshot().state.is_paused());

    controller.on_decoded(NOISE).await;
    assert_eq!(library.lookups(), 2);
}

#[tokio::test]
async fn test_library_failure_is_treated_as_lookup_failure() {
    let library = Arc::new(catalog());
    library.fail_list.store(true, Ordering::SeqCst);
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();

    let outcome = controller.on_decoded(SIGNALS).await;
    assert_eq!(outcome, DecodeOutcome::Noticed(NoticeKind::NotFound));
    assert_eq!(library.lookups(), 0);
    assert!(controller.snapshot().in_flight.is_empty());
}

#[tokio::test]
async fn test_decodes_ignored_while_confirmation_showing() {
    let library = Arc::new(catalog());
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();
    controller.on_decoded(SIGNALS).await;

    let outcome = controller.on_decoded(NOISE).await;
    assert_eq!(outcome, DecodeOutcome::Ignored);
    assert_eq!(library.lookups(), 1);
}

// === Confirmation and batch ===

#[tokio::test]
async fn test_confirm_then_discard_fails() {
    let controller = controller(catalog());
    controller.on_decoded(SIGNALS).await;

    controller.confirm(ReadingStatus::Reading).unwrap();
    assert_eq!(controller.discard(), Err(SessionError::NoPendingConfirmation));
    assert_eq!(controller.snapshot().batch.len(), 1);
}

#[tokio::test]
async fn test_discard_allows_rescan() {
    let library = Arc::new(catalog());
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();

    controller.on_decoded(SIGNALS).await;
    controller.discard().unwrap();
    assert!(controller.snapshot().in_flight.is_empty());

    let outcome = controller.on_decoded(SIGNALS).await;
    assert!(matches!(outcome, DecodeOutcome::Confirming(_)));
    assert_eq!(library.lookups(), 2);
}

#[tokio::test]
async fn test_batch_is_newest_first_and_removable() {
    let controller = controller(catalog());
    controller.on_decoded(SIGNALS).await;
    controller.confirm(ReadingStatus::ToRead).unwrap();
    controller.on_decoded(NOISE).await;
    controller.confirm(ReadingStatus::Read).unwrap();

    let isbns: Vec<String> = controller
        .snapshot()
        .batch
        .iter()
        .map(|p| p.isbn().to_string())
        .collect();
    assert_eq!(isbns, vec![NOISE, SIGNALS]);

    let removed = controller.remove_from_batch("978-0-306-40615-7").unwrap();
    assert_eq!(removed.map(|p| p.status), Some(ReadingStatus::ToRead));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.batch.len(), 1);
    assert!(!snapshot.in_flight.contains(SIGNALS));
    assert!(matches!(
        controller.on_decoded(SIGNALS).await,
        DecodeOutcome::Confirming(_)
    ));
}

// === Submission ===

#[tokio::test]
async fn test_submit_sends_whole_batch_and_resets() {
    let library = Arc::new(catalog());
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();
    controller.on_decoded(SIGNALS).await;
    controller.confirm(ReadingStatus::ToRead).unwrap();
    controller.on_decoded(NOISE).await;
    controller.confirm(ReadingStatus::Reading).unwrap();

    let report = controller.submit_batch().await.unwrap();
    assert_eq!(report.submitted, 2);
    assert_eq!(report.added, 2);

    let submissions = library.submissions();
    assert_eq!(submissions.len(), 1);
    let sent: Vec<(String, ReadingStatus)> = submissions[0]
        .iter()
        .map(|b| (b.isbn.clone(), b.status))
        .collect();
    assert_eq!(
        sent,
        vec![
            (NOISE.to_string(), ReadingStatus::Reading),
            (SIGNALS.to_string(), ReadingStatus::ToRead)
        ]
    );

    let snapshot = controller.snapshot();
    assert!(snapshot.batch.is_empty());
    assert!(snapshot.in_flight.is_empty());
    assert!(snapshot.owned.is_empty());
}

#[tokio::test]
async fn test_submit_failure_preserves_batch() {
    let library = Arc::new(catalog());
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();
    controller.on_decoded(SIGNALS).await;
    controller.confirm(ReadingStatus::ToRead).unwrap();
    let before = controller.snapshot().batch;

    library.fail_add.store(true, Ordering::SeqCst);
    let result = controller.submit_batch().await;
    assert!(matches!(result, Err(SessionError::SubmitFailed(_))));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.batch, before);
    assert!(snapshot.in_flight.contains(SIGNALS));
    assert_eq!(
        snapshot.notice.map(|n| n.kind),
        Some(NoticeKind::SubmitFailed)
    );

    library.fail_add.store(false, Ordering::SeqCst);
    assert!(controller.submit_batch().await.is_ok());
    assert_eq!(library.submissions().len(), 1);
}

#[tokio::test]
async fn test_submit_empty_batch_makes_no_request() {
    let library = Arc::new(catalog());
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();

    assert_eq!(controller.submit_batch().await, Err(SessionError::EmptyBatch));
    assert_eq!(library.add_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_submit_refused_while_confirmation_showing() {
    let library = Arc::new(catalog());
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();
    controller.on_decoded(SIGNALS).await;
    controller.confirm(ReadingStatus::ToRead).unwrap();
    controller.on_decoded(NOISE).await;

    assert_eq!(
        controller.submit_batch().await,
        Err(SessionError::ConfirmationPending)
    );
    assert_eq!(library.add_calls.load(Ordering::SeqCst), 0);
}

// === Device lifecycle ===

#[tokio::test]
async fn test_camera_error_stops_processing_until_retry() {
    let library = Arc::new(catalog());
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.camera_failed("permission denied");

    assert_eq!(
        controller.snapshot().state,
        ScanState::CameraError("permission denied".to_string())
    );
    assert_eq!(controller.on_decoded(SIGNALS).await, DecodeOutcome::Ignored);
    assert_eq!(library.lookups(), 0);

    controller.scanning_started();
    assert!(matches!(
        controller.on_decoded(SIGNALS).await,
        DecodeOutcome::Confirming(_)
    ));
}

#[tokio::test]
async fn test_book_pending_at_camera_failure_survives_submit_attempt() {
    let library = Arc::new(catalog());
    let controller = ScanController::new(Arc::clone(&library), SessionConfig::default());
    controller.scanning_started();
    controller.on_decoded(SIGNALS).await;
    controller.confirm(ReadingStatus::ToRead).unwrap();
    controller.on_decoded(NOISE).await;
    controller.camera_failed("unplugged");

    assert_eq!(
        controller.submit_batch().await,
        Err(SessionError::ConfirmationPending)
    );
    assert_eq!(library.add_calls.load(Ordering::SeqCst), 0);

    controller.scanning_started();
    let snapshot = controller.snapshot();
    assert!(matches!(
        snapshot.state,
        ScanState::AwaitingConfirmation(ref book) if book.isbn == NOISE
    ));
    assert!(snapshot.in_flight.contains(NOISE));
}

// === Scan screen ===

#[tokio::test]
async fn test_screen_runs_scripted_session() {
    let library = Arc::new(catalog());
    let controller = Arc::new(ScanController::new(
        Arc::clone(&library),
        SessionConfig::default(),
    ));
    let mut screen = ScanScreen::new(
        BarcodeScanner::new(ScannerSettings::default()),
        Arc::clone(&controller),
    );
    assert!(screen.inline_commands());

    let script = format!("{}\n/to-read\n{}\n/discard\n\n/submit\n", SIGNALS, NOISE);
    assert!(screen.enter_with(move || {
        Ok(Box::new(LineSource::new(Cursor::new(script))) as Box<dyn CodeSource>)
    }));

    screen.run(None, Arc::new(AtomicBool::new(false))).await;

    let submissions = library.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].len(), 1);
    assert_eq!(submissions[0][0].isbn, SIGNALS);
    assert_eq!(submissions[0][0].status, ReadingStatus::ToRead);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.state, ScanState::Idle);
    assert!(snapshot.batch.is_empty());
}

#[tokio::test]
async fn test_screen_stops_on_shutdown_flag() {
    let controller = Arc::new(ScanController::new(
        Arc::new(catalog()),
        SessionConfig::default(),
    ));
    let mut screen = ScanScreen::new(
        BarcodeScanner::new(ScannerSettings::default()),
        Arc::clone(&controller),
    );

    // A source that never produces anything.
    struct Silent;
    impl CodeSource for Silent {
        fn read_code(
            &mut self,
        ) -> Result<Option<String>, shelfscan::scanner::DecodeError> {
            std::thread::sleep(Duration::from_millis(10));
            Err(shelfscan::scanner::DecodeError::NotFound)
        }
    }
    assert!(screen.enter_with(|| Ok(Box::new(Silent) as Box<dyn CodeSource>)));

    let shutdown = Arc::new(AtomicBool::new(true));
    tokio::time::timeout(Duration::from_secs(2), screen.run(None, shutdown))
        .await
        .expect("screen should stop when the shutdown flag is raised");

    assert_eq!(controller.snapshot().state, ScanState::Idle);
}

#[tokio::test]
async fn test_screen_shutdown_not_held_up_by_slow_lookup() {
    let library = Arc::new(catalog().with_latency(Duration::from_secs(30)));
    let controller = Arc::new(ScanController::new(
        Arc::clone(&library),
        SessionConfig::default(),
    ));
    let mut screen = ScanScreen::new(
        BarcodeScanner::new(ScannerSettings::default()),
        Arc::clone(&controller),
    );
    let script = format!("{}\n", SIGNALS);
    assert!(screen.enter_with(move || {
        Ok(Box::new(LineSource::new(Cursor::new(script))) as Box<dyn CodeSource>)
    }));

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        flag.store(true, Ordering::SeqCst);
    });

    tokio::time::timeout(Duration::from_secs(5), screen.run(None, shutdown))
        .await
        .expect("shutdown should interrupt a slow lookup");

    assert_eq!(library.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(library.lookups(), 0);
    assert_eq!(controller.snapshot().state, ScanState::Idle);
}

#[tokio::test]
async fn test_screen_missing_device_enters_camera_error() {
    let controller = Arc::new(ScanController::new(
        Arc::new(catalog()),
        SessionConfig::default(),
    ));
    let mut screen = ScanScreen::new(
        BarcodeScanner::new(ScannerSettings::with_device("/definitely/not/a/scanner")),
        Arc::clone(&controller),
    );

    assert!(!screen.enter());
    assert!(matches!(
        controller.snapshot().state,
        ScanState::CameraError(_)
    ));
}
