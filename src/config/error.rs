//! Configuration and command error types.

use thiserror::Error;

/// Errors raised while turning the command line into a build configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{0}` not found. Please install it first.")]
    ToolMissing(String),

    #[error("Config validation error: {0}")]
    Validation(String),
}

/// The only error the driver raises on its own.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown Command: {0}")]
    Unknown(String),
}
