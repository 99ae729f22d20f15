//! Scanner handle and public API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use super::decode_loop::run_decode_loop;
use super::source::{open_device, CodeSource};
use super::types::{ScanEvent, ScannerError, ScannerSettings};

/// Barcode scanner handle.
///
/// Owns the device for as long as it runs: `start()` acquires the source on
/// a background thread and streams decode events, `stop()` releases it.
/// Dropping the handle stops it.
pub struct BarcodeScanner {
    settings: ScannerSettings,
    decode_thread: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
}

impl std::fmt::Debug for BarcodeScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarcodeScanner")
            .field("settings", &self.settings)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl BarcodeScanner {
    /// Create a stopped scanner. Nothing is opened until `start()`.
    pub fn new(settings: ScannerSettings) -> Self {
        Self {
            settings,
            decode_thread: None,
            stop_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn settings(&self) -> &ScannerSettings {
        &self.settings
    }

    /// Open the configured device and start decoding.
    ///
    /// # Errors
    /// * `ScannerError::AlreadyRunning` - If the decode thread is running
    /// * `ScannerError::DeviceNotFound` / `PermissionDenied` / `OpenFailed` -
    ///   If the device cannot be acquired
    pub fn start(&mut self) -> Result<UnboundedReceiver<ScanEvent>, ScannerError> {
        let settings = self.settings.clone();
        self.start_with(move || open_device(&settings))
    }

    /// Start decoding from a source produced by `open`.
    ///
    /// `open` runs on the decode thread; its error is returned from here and
    /// the scanner stays stopped.
    pub fn start_with<F>(&mut self, open: F) -> Result<UnboundedReceiver<ScanEvent>, ScannerError>
    where
        F: FnOnce() -> Result<Box<dyn CodeSource>, ScannerError> + Send + 'static,
    {
        if self.is_running() {
            return Err(ScannerError::AlreadyRunning);
        }
        self.reap();

        // A fresh flag per run: a detached thread from an earlier run keeps
        // its own raised flag.
        self.stop_signal = Arc::new(AtomicBool::new(false));

        let (events_tx, events_rx) = unbounded_channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), ScannerError>>();
        let stop = Arc::clone(&self.stop_signal);

        let handle = std::thread::Builder::new()
            .name("barcode-decode".to_string())
            .spawn(move || run_decode_loop(open, stop, events_tx, ready_tx))
            .map_err(|e| ScannerError::StreamFailed(e.to_string()))?;
        self.decode_thread = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(())) => {
                log::info!("Scanner started ({})", self.settings.device);
                Ok(events_rx)
            }
            Ok(Err(e)) => {
                self.stop();
                Err(e)
            }
            Err(_) => {
                self.stop();
                Err(ScannerError::StreamFailed(
                    "Decode thread terminated unexpectedly".to_string(),
                ))
            }
        }
    }

    /// Stop decoding and release the device.
    ///
    /// Safe to call at any time, including when the scanner never started.
    /// A thread blocked waiting for the next frame is detached; it exits
    /// without delivering anything once that read returns.
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);

        if let Some(handle) = self.decode_thread.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                log::debug!("Detaching blocked decode thread");
            }
        }
    }

    /// Check if the decode thread is currently running.
    pub fn is_running(&self) -> bool {
        !self.stop_signal.load(Ordering::SeqCst)
            && self
                .decode_thread
                .as_ref()
                .is_some_and(|h| !h.is_finished())
    }

    fn reap(&mut self) {
        if let Some(handle) = self.decode_thread.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for BarcodeScanner {
    fn drop(&mut self) {
        self.stop();
    }
}
