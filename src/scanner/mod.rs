//! Barcode scanner adapter.
//!
//! Bridges a code source (a camera decoder, or a barcode reader that types
//! one code per line) to a stream of decode events:
//! - Sources via [`CodeSource`], [`LineSource`] and [`open_device`]
//! - The background decode loop via [`BarcodeScanner`]
//! - Configuration via [`ScannerSettings`]

mod decode_loop;
mod handle;
mod source;
mod types;

pub use handle::BarcodeScanner;
pub use source::{open_device, CodeSource, LineSource, STDIN_DEVICE};
pub use types::{DecodeError, ScanEvent, ScannerError, ScannerSettings};
