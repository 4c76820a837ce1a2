//! Error types for wrp-output

use std::path::PathBuf;

use thiserror::Error;

use crate::channel::OutputChannel;
use crate::name::NameError;

pub type Result<T> = std::result::Result<T, OutputError>;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("file name error: {0}")]
    Name(#[from] NameError),

    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot close {}: {source}", path.display())]
    Close {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no open handle for channel {0}")]
    MissingHandle(OutputChannel),

    #[error("channel {0} is already open")]
    ChannelAlreadyOpen(OutputChannel),

    #[error("flat-text and flat-stream cannot both be requested for one output event")]
    ConflictingFlatChannels,

    #[error("no output channel requested")]
    NoChannelRequested,

    #[error("no free device numbers in {first}..={last}")]
    DevicesExhausted { first: u32, last: u32 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OutputError {
    /// True for errors the run must not continue past (misconfigured name buffers).
    pub fn is_fatal(&self) -> bool {
        matches!(self, OutputError::Name(err) if err.is_fatal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_buffer_length_errors_are_fatal() {
        let fatal = OutputError::from(NameError::InsufficientBufferLength {
            len: 8,
            required: 16,
        });
        assert!(fatal.is_fatal());

        let prefix = OutputError::from(NameError::InvalidPrefix("wn".to_string()));
        assert!(!prefix.is_fatal());
        assert!(!OutputError::NoChannelRequested.is_fatal());
        assert!(!OutputError::MissingHandle(OutputChannel::FlatText).is_fatal());
    }

    #[test]
    fn messages_name_the_channel() {
        let err = OutputError::MissingHandle(OutputChannel::PatranFormatted);
        assert_eq!(err.to_string(), "no open handle for channel patran-formatted");
    }
}
