use thiserror::Error;

/// Result type for fallible [`BTree`](crate::BTree) construction.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported when building a [`BTree`](crate::BTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The degree must be at least 2.
    #[error("invalid degree {degree}: must be at least 2")]
    InvalidDegree {
        /// The rejected degree.
        degree: usize,
    },
}
