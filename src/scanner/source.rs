//! Code sources feeding the decode loop.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use super::types::{DecodeError, ScannerError, ScannerSettings};

/// Device name selecting standard input.
pub const STDIN_DEVICE: &str = "-";

/// A device producing one decode attempt per call.
///
/// `read_code` blocks until the next frame has been examined and returns:
/// - `Ok(Some(code))` when a code was decoded
/// - `Ok(None)` when the source is exhausted
/// - `Err(DecodeError::NotFound)` when the frame held no code
/// - `Err(DecodeError::Failed(_))` on a genuine decoder error
pub trait CodeSource: Send {
    fn read_code(&mut self) -> Result<Option<String>, DecodeError>;
}

/// Source reading one code per line.
///
/// Keyboard-wedge and serial barcode readers emit each decoded code followed
/// by a line terminator. Blank lines count as frames without a code; control
/// characters some readers add around the payload are stripped.
pub struct LineSource<R> {
    reader: R,
    line: String,
}

impl<R: BufRead + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl<R: BufRead + Send> CodeSource for LineSource<R> {
    fn read_code(&mut self) -> Result<Option<String>, DecodeError> {
        self.line.clear();
        let read = self
            .reader
            .read_line(&mut self.line)
            .map_err(|e| DecodeError::Failed(e.to_string()))?;
        if read == 0 {
            return Ok(None);
        }

        let code: String = self.line.chars().filter(|c| !c.is_control()).collect();
        let code = code.trim();
        if code.is_empty() {
            return Err(DecodeError::NotFound);
        }
        Ok(Some(code.to_string()))
    }
}

/// Open the source named by the settings.
///
/// `-` reads standard input; anything else is opened as a device node or
/// file. Permission and existence problems are reported as distinct errors.
pub fn open_device(settings: &ScannerSettings) -> Result<Box<dyn CodeSource>, ScannerError> {
    if settings.reads_stdin() {
        log::debug!("Reading codes from standard input");
        return Ok(Box::new(LineSource::new(BufReader::new(std::io::stdin()))));
    }

    let path = PathBuf::from(settings.device.trim());
    let file = File::open(&path).map_err(|e| ScannerError::from_open_error(path.clone(), e))?;
    log::info!("Opened scanner device {}", path.display());
    Ok(Box::new(LineSource::new(BufReader::new(file))))
}
