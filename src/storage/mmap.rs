use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use super::{copy_range, StorageBackend};
use crate::error::StorageError;

/// A database image memory-mapped from a read-only file.
///
/// The file must not be modified while mapped.
pub struct MmapStorage {
    map: Mmap,
}

impl MmapStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let file = File::open(path.as_ref())?;
        let size = file.metadata()?.len();
        if size > u32::MAX as u64 {
            return Err(StorageError::TooLarge(size));
        }

        // SAFETY: the image is treated as immutable for the lifetime of the map.
        let map = unsafe { Mmap::map(&file)? };
        debug!("Mapped {} ({} bytes)", path.as_ref().display(), size);

        Ok(Self { map })
    }
}

impl StorageBackend for MmapStorage {
    fn len(&self) -> u32 {
        self.map.len() as u32
    }

    fn read_at(&self, offset: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        copy_range(&self.map, offset, buf)
    }
}
