//! Error types shared by the storage, format and lookup layers.

use thiserror::Error;

/// Failure to read bytes from a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("read of {length} bytes at offset {offset} exceeds storage size {size}")]
    OutOfRange { offset: u32, length: u32, size: u32 },

    #[error("storage image of {0} bytes exceeds the 32-bit address space")]
    TooLarge(u64),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single lookup call.
///
/// A point that matches no region is not an error; lookups return `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("malformed database: {0}")]
    MalformedDatabase(String),

    #[error("coordinate out of range: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
}

impl LookupError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        LookupError::MalformedDatabase(msg.into())
    }
}

/// Failure to assemble a database image.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("precision {0} is outside 1..=32")]
    InvalidPrecision(u8),

    #[error("{field} `{text}` is longer than {max} bytes")]
    StringTooLong {
        field: &'static str,
        text: String,
        max: usize,
    },

    #[error("region `{0}` has a ring with fewer than two vertices")]
    DegenerateRing(String),

    #[error("region `{0}` has no shapes")]
    EmptyRegion(String),

    #[error("image exceeds the 32-bit address space")]
    ImageTooLarge,
}
