//! Scanner types and data structures.

use std::fmt;
use std::path::PathBuf;

use super::source::STDIN_DEVICE;

/// Settings for the barcode scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerSettings {
    /// Device to read codes from: a path, or `-` for standard input
    pub device: String,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            device: STDIN_DEVICE.to_string(),
        }
    }
}

impl ScannerSettings {
    pub fn with_device(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Whether codes come from standard input.
    pub fn reads_stdin(&self) -> bool {
        self.device.trim() == STDIN_DEVICE
    }
}

/// What the decode loop reports to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A code was decoded from the current frame
    Decoded(String),
    /// The decoder failed for a reason other than "no code in frame"
    Error(String),
    /// The source has no more frames
    Ended,
}

/// Outcome of one failed decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No code in this frame; expected steady state, never reported
    NotFound,
    /// A genuine decoder failure
    Failed(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::NotFound => write!(f, "No code found in frame"),
            DecodeError::Failed(msg) => write!(f, "Decode failed: {}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Errors that can occur acquiring or running the scanner device.
#[derive(Debug)]
pub enum ScannerError {
    /// Device path does not exist
    DeviceNotFound(PathBuf),
    /// Access to the device was refused
    PermissionDenied(PathBuf),
    /// Failed to open the device for another reason
    OpenFailed(String),
    /// Decode thread stopped before reporting the device as ready
    StreamFailed(String),
    /// Decode thread is already running
    AlreadyRunning,
}

impl ScannerError {
    /// Map an I/O error raised while opening `path`.
    pub fn from_open_error(path: PathBuf, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => ScannerError::DeviceNotFound(path),
            std::io::ErrorKind::PermissionDenied => ScannerError::PermissionDenied(path),
            _ => ScannerError::OpenFailed(format!("{}: {}", path.display(), error)),
        }
    }
}

impl fmt::Display for ScannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerError::DeviceNotFound(path) => {
                write!(f, "Scanner device {} not found", path.display())
            }
            ScannerError::PermissionDenied(path) => {
                write!(
                    f,
                    "Permission denied opening scanner device {}. Check that your user can read it",
                    path.display()
                )
            }
            ScannerError::OpenFailed(msg) => write!(f, "Failed to open scanner: {}", msg),
            ScannerError::StreamFailed(msg) => write!(f, "Failed to start scanner stream: {}", msg),
            ScannerError::AlreadyRunning => write!(f, "Scanner is already running"),
        }
    }
}

impl std::error::Error for ScannerError {}
