use thiserror::Error;

/// Errors reported by the segmentation engine and its containers.
///
/// Every variant is detected before any pass runs, so a failed call never
/// leaves partially written output behind.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SlicError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("unsupported pixel encoding: color model expects {expected} band(s), image has {found}")]
    UnsupportedPixelEncoding { expected: usize, found: usize },
    #[error("dimension mismatch: expected {expected} elements, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("indices ({0}, {1}) out of bounds")]
    IndexOutOfBounds(usize, usize),
}
