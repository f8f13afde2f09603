//! Random-access, read-only storage for database images.
//!
//! The geofence engine only ever talks to a [`StorageBackend`]. Reads take the
//! position as a parameter, so a backend that is `Sync` can serve any number of
//! concurrent lookups without locking.

mod memory;
mod mmap;

use std::sync::Arc;

use crate::error::StorageError;

pub use memory::MemoryStorage;
pub use mmap::MmapStorage;

/// A flat, immutable address space holding one database image.
pub trait StorageBackend {
    /// Total size of the image in bytes.
    fn len(&self) -> u32;

    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Must fail with [`StorageError::OutOfRange`] instead of returning fewer bytes.
    fn read_at(&self, offset: u32, buf: &mut [u8]) -> Result<(), StorageError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `length` bytes starting at `offset` into a fresh buffer.
    fn read(&self, offset: u32, length: u32) -> Result<Vec<u8>, StorageError> {
        let mut buf = vec![0u8; length as usize];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

impl<T: StorageBackend + ?Sized> StorageBackend for &T {
    fn len(&self) -> u32 {
        (**self).len()
    }

    fn read_at(&self, offset: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        (**self).read_at(offset, buf)
    }
}

impl<T: StorageBackend + ?Sized> StorageBackend for Arc<T> {
    fn len(&self) -> u32 {
        (**self).len()
    }

    fn read_at(&self, offset: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        (**self).read_at(offset, buf)
    }
}

/// Bounds-checked copy out of a byte slice; shared by the slice-backed backends.
pub(crate) fn copy_range(image: &[u8], offset: u32, buf: &mut [u8]) -> Result<(), StorageError> {
    let size = image.len() as u32;
    let out_of_range = || StorageError::OutOfRange {
        offset,
        length: buf.len() as u32,
        size,
    };

    let start = offset as usize;
    let end = start.checked_add(buf.len()).ok_or_else(out_of_range)?;
    let src = image.get(start..end).ok_or_else(out_of_range)?;
    buf.copy_from_slice(src);
    Ok(())
}
