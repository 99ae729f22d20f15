//! Background decode thread implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use super::source::CodeSource;
use super::types::{DecodeError, ScanEvent, ScannerError};

/// Run the decode loop in a background thread.
///
/// Opens the source with `open`, reports the outcome on `ready_tx`, then
/// forwards decode results on `events` until the source ends, the stop flag
/// is raised or the consumer goes away. Frames without a code are dropped
/// here and never reach the consumer.
pub fn run_decode_loop<F>(
    open: F,
    stop: Arc<AtomicBool>,
    events: UnboundedSender<ScanEvent>,
    ready_tx: Sender<Result<(), ScannerError>>,
) where
    F: FnOnce() -> Result<Box<dyn CodeSource>, ScannerError>,
{
    let mut source = match open() {
        Ok(source) => source,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    while !stop.load(Ordering::Relaxed) {
        let event = match source.read_code() {
            Ok(Some(code)) => ScanEvent::Decoded(code),
            Ok(None) => {
                let _ = events.send(ScanEvent::Ended);
                break;
            }
            Err(DecodeError::NotFound) => continue,
            Err(DecodeError::Failed(msg)) => {
                log::warn!("Scanner decode error: {}", msg);
                ScanEvent::Error(msg)
            }
        };

        // A stop raised while blocked in read_code wins over the late frame.
        if stop.load(Ordering::Relaxed) {
            break;
        }
        if events.send(event).is_err() {
            break;
        }
    }

    log::debug!("Decode loop finished");
}
