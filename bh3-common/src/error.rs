//! Error types shared by the codecs and the scene mappers.

use std::io;

/// Result alias used throughout `bh3-common`.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort a decode, encode or conversion.
///
/// None of these are recoverable mid-stream: the whole operation is abandoned
/// and no partial object is returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying stream failure (including unexpected end of file)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The byte stream violates the chunk grammar
    #[error("format error at byte {offset}: {kind}")]
    Format { offset: u64, kind: FormatErrorKind },

    /// The data is well formed but cannot be expressed in the target format
    #[error("unsupported data in {entity}: {reason}")]
    UnsupportedData { entity: String, reason: String },

    /// Two trees that must be isomorphic differ in shape
    #[error("tree structure mismatch at node {node}: {left} children vs {right} children")]
    StructuralMismatch {
        /// Pre-order index of the offending node
        node: usize,
        left: usize,
        right: usize,
    },
}

impl Error {
    pub(crate) fn unsupported(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedData {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

/// Specific chunk grammar violations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormatErrorKind {
    #[error("expected chunk id {expected} but found {found}")]
    UnexpectedChunk { expected: u16, found: u16 },

    #[error("chunk id {id} declares {found} children, grammar requires {expected}")]
    ChildCount { id: u16, expected: String, found: u16 },

    #[error("chunk id {id} declares {declared} bytes but {actual} were consumed")]
    SizeMismatch { id: u16, declared: u32, actual: u64 },

    #[error("chunk body exceeds the 32-bit size field ({0} bytes)")]
    ChunkTooLarge(u64),

    #[error("redundant rotation component {found} does not match rotation x {expected}")]
    RedundantRotation { expected: f32, found: f32 },

    #[error("malformed string: {0}")]
    MalformedString(&'static str),

    #[error("negative element count {0}")]
    NegativeCount(i32),

    #[error("{0} unexpected bytes after the root chunk")]
    TrailingBytes(u64),
}
