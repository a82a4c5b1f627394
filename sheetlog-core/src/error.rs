//! Error types for sheetlog-core

use std::time::Duration;

use thiserror::Error;

use crate::host::NotificationSource;

/// Main error type for the sheetlog-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The request never produced a response (DNS, refused, TLS, reset)
    #[error("transport error: {0}")]
    Transport(String),

    /// The collector answered with a non-success status
    #[error("collector returned status {0}")]
    Status(u16),

    /// No response arrived before the request deadline
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// A host read (selection, workbook) failed
    #[error("host error: {0}")]
    Host(String),

    /// The host refused to register a notification source
    #[error("unable to register {notification} notifications: {message}")]
    Registration {
        notification: NotificationSource,
        message: String,
    },
}

impl Error {
    /// Whether this error means the collector could not be reached.
    ///
    /// Transport failures, timeouts and non-success statuses are all treated
    /// the same way by the connection monitor.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Status(_) | Error::Timeout(_)
        )
    }
}

/// Result type alias for sheetlog-core
pub type Result<T> = std::result::Result<T, Error>;
