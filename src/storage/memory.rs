use super::{copy_range, StorageBackend};
use crate::error::StorageError;

/// A database image held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    image: Vec<u8>,
}

impl MemoryStorage {
    pub fn new(image: Vec<u8>) -> Result<Self, StorageError> {
        if image.len() as u64 > u32::MAX as u64 {
            return Err(StorageError::TooLarge(image.len() as u64));
        }
        Ok(Self { image })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.image
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.image
    }
}

impl TryFrom<&[u8]> for MemoryStorage {
    type Error = StorageError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::new(bytes.to_vec())
    }
}

impl StorageBackend for MemoryStorage {
    fn len(&self) -> u32 {
        self.image.len() as u32
    }

    fn read_at(&self, offset: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        copy_range(&self.image, offset, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_within_bounds() {
        let storage = MemoryStorage::new(vec![1, 2, 3, 4, 5]).unwrap();
        assert_eq!(storage.len(), 5);
        assert_eq!(storage.read(1, 3).unwrap(), vec![2, 3, 4]);
        assert_eq!(storage.read(5, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_read_past_end_fails() {
        let storage = MemoryStorage::new(vec![1, 2, 3]).unwrap();
        let err = storage.read(2, 2).unwrap_err();
        assert!(matches!(
            err,
            StorageError::OutOfRange {
                offset: 2,
                length: 2,
                size: 3
            }
        ));
    }

    #[test]
    fn test_read_offset_overflow_fails() {
        let storage = MemoryStorage::new(vec![0; 8]).unwrap();
        let mut buf = [0u8; 4];
        assert!(storage.read_at(u32::MAX, &mut buf).is_err());
    }

    #[test]
    fn test_borrowed_backend() {
        let storage = MemoryStorage::new(vec![9, 8, 7]).unwrap();
        let borrowed = &storage;
        assert_eq!(borrowed.read(0, 1).unwrap(), vec![9]);
        assert!(!borrowed.is_empty());
    }

    #[test]
    fn test_try_from_slice_copies() {
        let mut bytes = vec![4, 5, 6];
        let storage = MemoryStorage::try_from(bytes.as_slice()).unwrap();
        bytes[0] = 0;
        assert_eq!(storage.len(), 3);
        assert_eq!(storage.as_bytes(), &[4, 5, 6]);

        let empty = MemoryStorage::try_from(&[] as &[u8]).unwrap();
        assert!(empty.is_empty());
        assert!(empty.read(0, 1).is_err());
    }
}
