use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocdexError>;

/// Error type shared by the library modules. Binary glue wraps these in
/// `anyhow` at the edges.
#[derive(Error, Debug)]
pub enum DocdexError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown source provider '{name}', expected one of: {known}")]
    UnknownProvider { name: String, known: String },

    #[error("source enumeration failed: {0}")]
    Enumeration(String),

    #[error("artifact {path} could not be parsed: {reason}")]
    ArtifactParse { path: PathBuf, reason: String },

    #[error("`{command}` exited with status {status}: {stderr}")]
    ProcessFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {seconds}s")]
    ProcessTimeout { command: String, seconds: u64 },

    #[error("GitHub request failed (status {status:?}): {message}")]
    GitHub { status: Option<u16>, message: String },

    #[error("Discord API request failed with status {status}: {message}")]
    Discord { status: u16, message: String },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocdexError {
    /// True for failures that should abort a reload rather than skip a
    /// single unit or member.
    pub fn is_reload_fatal(&self) -> bool {
        matches!(
            self,
            DocdexError::Enumeration(_) | DocdexError::UnknownProvider { .. }
        )
    }
}
