//! Error types shared by every stage of the extraction engine.

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Fetch and parse failures raised while resolving source maps are recovered
/// locally (the stylesheet contributes nothing), so callers mostly see
/// `ElementNotFound` and `UnknownCommand`.
#[derive(Error, Debug)]
pub enum StylecastError {
    /// A stylesheet, source map or source file could not be retrieved.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// A source map or other structured payload was malformed.
    #[error("parse error: {0}")]
    Parse(String),

    /// An xpath or element handle did not resolve to an element.
    #[error("Element not found")]
    ElementNotFound(String),

    /// The host transport sent an action this engine does not know.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StylecastError {
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        StylecastError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StylecastError>;
