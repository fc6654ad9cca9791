//! Error type for the compiler layer.
//!
//! Uses [`thiserror`] for ergonomic error derivation. [`CompileError`]
//! wraps document-access failures and converts from the core
//! [`ContentError`] so `?` works across the crate boundary.

use pagescript_core::ContentError;
use thiserror::Error;

/// Error type for content stream compilation.
///
/// Most malformed-stream conditions never surface here (they become
/// warnings and the compiler resynchronizes); what does surface is
/// structural: documents that cannot be read, resources that do not
/// resolve, recursion past the configured limit, strict-mode escalations.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Error reading or resolving objects in the document.
    #[error("document error: {0}")]
    Document(String),

    /// A required dictionary entry was absent or had the wrong shape.
    #[error("malformed {kind}: {detail}")]
    Malformed {
        /// What was being read (e.g. "page", "form XObject").
        kind: &'static str,
        /// What was wrong with it.
        detail: String,
    },

    /// A stream exceeded the configured size limit.
    #[error("content stream of {actual} bytes exceeds limit of {limit}")]
    StreamTooLarge { actual: usize, limit: usize },

    /// A core content error escalated to a compile failure.
    #[error(transparent)]
    Content(#[from] ContentError),
}

impl From<lopdf::Error> for CompileError {
    fn from(err: lopdf::Error) -> Self {
        CompileError::Document(err.to_string())
    }
}
