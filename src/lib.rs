//! tzfence - offline timezone lookup from a compact boundary database
//!
//! Resolves a latitude/longitude to the timezone rule string of the first
//! region in the database whose boundary contains it.

pub mod error;
pub mod format;
pub mod geofence;
pub mod storage;

pub use error::{BuildError, LookupError, StorageError};
pub use format::{DatabaseBuilder, DatabaseHeader, Entry, Region};
pub use geofence::{Geofence, RegionMatch};
pub use storage::{MemoryStorage, MmapStorage, StorageBackend};

/// One-shot lookup against a backend carrying the default signature.
pub fn find_timezone<S: StorageBackend>(
    storage: &S,
    latitude: f64,
    longitude: f64,
) -> Result<Option<String>, LookupError> {
    Geofence::new(storage).find_timezone(latitude, longitude)
}
