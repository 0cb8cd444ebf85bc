//! Error types for the logging subsystem

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    /// A global subscriber was already installed, or the layer stack was rejected
    InitializationFailed(String),
    /// The configured level is not one of trace, debug, info, warn, error
    UnknownLevel(String),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize logging: {}", msg)
            }
            LoggingError::UnknownLevel(level) => {
                write!(f, "Unknown log level: '{}'", level)
            }
        }
    }
}

impl std::error::Error for LoggingError {}
