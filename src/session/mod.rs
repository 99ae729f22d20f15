//! Scan session: decode pipeline, confirmation, batch and submission.
//!
//! - [`ScanSession`] is the pure state machine
//! - [`ScanController`] drives it against a [`LibraryApi`](crate::api::LibraryApi)
//! - [`ScanScreen`] connects a scanner and operator input to a controller

mod controller;
mod notice;
mod prompt;
mod screen;
mod state;

pub use controller::ScanController;
pub use notice::{Notice, NoticeKind, NoticeSlot, DEFAULT_NOTICE_TTL};
pub use prompt::{print_status, spawn_listener, ScanCommand, COMMAND_HELP};
pub use screen::{Flow, ScanScreen};
pub use state::{
    DecodeOutcome, DecodeStep, LookupTicket, ScanSession, ScanState, SessionConfig, SessionError,
    SessionSnapshot, SubmitReport,
};
