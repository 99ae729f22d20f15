//! CLI enum types.

use clap::ValueEnum;

use crate::book::ReadingStatus;

/// Reading status as typed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    #[value(aliases = ["to_read", "toread"])]
    ToRead,
    Reading,
    Read,
}

impl From<StatusArg> for ReadingStatus {
    fn from(s: StatusArg) -> Self {
        match s {
            StatusArg::ToRead => ReadingStatus::ToRead,
            StatusArg::Reading => ReadingStatus::Reading,
            StatusArg::Read => ReadingStatus::Read,
        }
    }
}
