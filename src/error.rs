//! Error types for the merge library.
//!
//! This module defines all error types that can occur while reading source objects,
//! copying them between documents and serializing the result.

use crate::object::ObjectRef;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF merging.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed primitive (non-numeric object number, bad boolean spelling, ...)
    #[error("Format error: {0}")]
    Format(String),

    /// Byte source exhausted in the middle of a bulk read
    #[error("Truncated input: expected {expected} bytes, only {available} available")]
    TruncatedInput {
        /// Number of bytes requested
        expected: usize,
        /// Number of bytes that could be read
        available: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Referenced object not found in a document
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectRef),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Requested page does not exist in the source document
    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange {
        /// 1-based page number that was requested
        page: usize,
        /// Number of pages in the document
        count: usize,
    },

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),
}

/// Non-fatal problems found while copying an object graph.
///
/// Warnings never abort an import. Each one is logged at `warn` level
/// when raised and also collected on the merger for later inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyWarning {
    /// An object variant the copy engine cannot carry over; replaced with `null`.
    UnsupportedObject {
        /// Indirect object that contained the value, if known
        owner: Option<ObjectRef>,
        /// Description of the unsupported value
        kind: String,
    },
    /// A reference pointing at an object the source does not contain; copied as `null`.
    DanglingReference(ObjectRef),
}

impl std::fmt::Display for CopyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CopyWarning::UnsupportedObject { owner: Some(owner), kind } => {
                write!(f, "unsupported object '{}' in {}, replaced with null", kind, owner)
            },
            CopyWarning::UnsupportedObject { owner: None, kind } => {
                write!(f, "unsupported object '{}', replaced with null", kind)
            },
            CopyWarning::DanglingReference(r) => {
                write!(f, "dangling reference {}, copied as null", r)
            },
        }
    }
}
