//! Record readers over a storage offset.
//!
//! Each function is stateless: it takes the absolute offset of a record and
//! returns the record plus the offset just past it. Beyond checking that
//! declared counts fit in the remaining bytes, nothing is validated.

use super::codec::{decode_delta, read_array, read_i32, read_u32, read_u8};
use super::{
    BoundingBox, DatabaseHeader, Entry, Point, Shape, ENTRY_SIZE, FIXED_STRING_SIZE,
    MIN_VERTEX_SIZE, SHAPE_SIZE,
};
use crate::error::LookupError;
use crate::storage::StorageBackend;

type ReadResult<T> = Result<(T, u32), LookupError>;

pub fn read_header<S: StorageBackend + ?Sized>(
    storage: &S,
    offset: u32,
) -> ReadResult<DatabaseHeader> {
    let (version, offset) = read_u8(storage, offset)?;
    let (signature, offset) = read_array::<S, 4>(storage, offset)?;
    let (precision, offset) = read_u8(storage, offset)?;
    let (creation_date, offset) = read_array::<S, 10>(storage, offset)?;
    let (filler, offset) = read_array::<S, 16>(storage, offset)?;

    Ok((
        DatabaseHeader {
            version,
            signature,
            precision,
            creation_date,
            filler,
        },
        offset,
    ))
}

/// Fail if `count` records of `record_size` bytes cannot fit after `offset`.
fn check_count<S: StorageBackend + ?Sized>(
    storage: &S,
    offset: u32,
    count: u32,
    record_size: u32,
    what: &str,
) -> Result<(), LookupError> {
    let remaining = u64::from(storage.len().saturating_sub(offset));
    let needed = u64::from(count) * u64::from(record_size);
    if needed > remaining {
        return Err(LookupError::malformed(format!(
            "{count} {what} at offset {offset} need {needed} bytes, only {remaining} remain"
        )));
    }
    Ok(())
}

pub fn read_entry_count<S: StorageBackend + ?Sized>(storage: &S, offset: u32) -> ReadResult<u32> {
    let (count, next) = read_u32(storage, offset)?;
    check_count(storage, next, count, ENTRY_SIZE, "entries")?;
    Ok((count, next))
}

fn fixed_string(bytes: &[u8; FIXED_STRING_SIZE], field: &str) -> Result<String, LookupError> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[..end].to_vec())
        .map_err(|e| LookupError::malformed(format!("entry {field} is not UTF-8: {e}")))
}

pub fn read_entry<S: StorageBackend + ?Sized>(storage: &S, offset: u32) -> ReadResult<Entry> {
    let (name, next) = read_array::<S, FIXED_STRING_SIZE>(storage, offset)?;
    let (value, next) = read_array::<S, FIXED_STRING_SIZE>(storage, next)?;
    let (position, next) = read_u32(storage, next)?;

    Ok((
        Entry {
            name: fixed_string(&name, "name")?,
            value: fixed_string(&value, "value")?,
            position,
        },
        next,
    ))
}

pub fn read_bounding_box<S: StorageBackend + ?Sized>(
    storage: &S,
    offset: u32,
) -> ReadResult<BoundingBox> {
    let (from_latitude, offset) = read_i32(storage, offset)?;
    let (from_longitude, offset) = read_i32(storage, offset)?;
    let (to_latitude, offset) = read_i32(storage, offset)?;
    let (to_longitude, offset) = read_i32(storage, offset)?;

    Ok((
        BoundingBox {
            from_latitude,
            from_longitude,
            to_latitude,
            to_longitude,
        },
        offset,
    ))
}

pub fn read_shape_count<S: StorageBackend + ?Sized>(storage: &S, offset: u32) -> ReadResult<u32> {
    let (count, next) = read_u32(storage, offset)?;
    check_count(storage, next, count, SHAPE_SIZE, "shapes")?;
    Ok((count, next))
}

pub fn read_shape<S: StorageBackend + ?Sized>(storage: &S, offset: u32) -> ReadResult<Shape> {
    let (position, next) = read_u32(storage, offset)?;
    Ok((Shape { position }, next))
}

fn read_point<S: StorageBackend + ?Sized>(storage: &S, offset: u32) -> ReadResult<Point> {
    let (latitude, offset) = read_i32(storage, offset)?;
    let (longitude, offset) = read_i32(storage, offset)?;
    Ok((Point::new(latitude, longitude), offset))
}

/// Read the absolute start point and delta count of a point list.
///
/// Returns `((start, delta_count), offset_of_first_delta)`.
pub fn read_point_list_start<S: StorageBackend + ?Sized>(
    storage: &S,
    offset: u32,
) -> ReadResult<(Point, u32)> {
    let (start, offset) = read_point(storage, offset)?;
    let (deltas, next) = read_u32(storage, offset)?;
    check_count(storage, next, deltas, MIN_VERTEX_SIZE, "vertices")?;
    Ok(((start, deltas), next))
}

/// Streams the vertices of one ring: the start point, then one vertex per
/// delta pair, accumulated onto the previous vertex.
pub struct PointRing<'a, S: ?Sized> {
    storage: &'a S,
    offset: u32,
    current: Point,
    remaining: u32,
    started: bool,
    failed: bool,
}

impl<'a, S: StorageBackend + ?Sized> PointRing<'a, S> {
    /// Open the point list at `position`.
    pub fn open(storage: &'a S, position: u32) -> Result<Self, LookupError> {
        let ((start, deltas), offset) = read_point_list_start(storage, position)?;
        Ok(Self {
            storage,
            offset,
            current: start,
            remaining: deltas,
            started: false,
            failed: false,
        })
    }

    /// Number of vertices still to be produced.
    pub fn remaining_vertices(&self) -> u32 {
        self.remaining + u32::from(!self.started)
    }

    fn next_vertex(&mut self) -> Result<Point, LookupError> {
        let (d_lat, offset) = decode_delta(self.storage, self.offset)?;
        let (d_lon, offset) = decode_delta(self.storage, offset)?;
        self.offset = offset;
        self.current = Point::new(
            self.current.latitude.wrapping_add(d_lat),
            self.current.longitude.wrapping_add(d_lon),
        );
        Ok(self.current)
    }
}

impl<S: StorageBackend + ?Sized> Iterator for PointRing<'_, S> {
    type Item = Result<Point, LookupError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(Ok(self.current));
        }
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let vertex = self.next_vertex();
        if vertex.is_err() {
            self.failed = true;
        }
        Some(vertex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::codec::encode_delta;
    use crate::format::{DatabaseBuilder, Region, BOUNDING_BOX_SIZE, COUNT_SIZE, HEADER_SIZE};
    use crate::geofence::Geofence;
    use crate::storage::MemoryStorage;
    use geo::{polygon, MultiPolygon};

    fn point_list(start: Point, deltas: &[(i32, i32)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&start.latitude.to_le_bytes());
        bytes.extend_from_slice(&start.longitude.to_le_bytes());
        bytes.extend_from_slice(&(deltas.len() as u32).to_le_bytes());
        for &(lat, lon) in deltas {
            encode_delta(lat, &mut bytes);
            encode_delta(lon, &mut bytes);
        }
        bytes
    }

    #[test]
    fn test_point_ring_accumulates_deltas() {
        let bytes = point_list(Point::new(100, 200), &[(5, -5), (1000, 0), (-1005, 5)]);
        let storage = MemoryStorage::new(bytes).unwrap();

        let ring = PointRing::open(&storage, 0).unwrap();
        assert_eq!(ring.remaining_vertices(), 4);
        let points: Vec<Point> = ring.collect::<Result<_, _>>().unwrap();
        assert_eq!(
            points,
            vec![
                Point::new(100, 200),
                Point::new(105, 195),
                Point::new(1105, 195),
                Point::new(100, 200),
            ]
        );
    }

    #[test]
    fn test_point_ring_without_deltas() {
        let storage = MemoryStorage::new(point_list(Point::new(-1, -2), &[])).unwrap();
        let points: Vec<Point> = PointRing::open(&storage, 0)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(points, vec![Point::new(-1, -2)]);
    }

    #[test]
    fn test_point_ring_stops_after_truncation() {
        let mut bytes = point_list(Point::new(0, 0), &[(1, 1), (300, 1)]);
        // Drop the tail of the 16-bit delta
        bytes.truncate(bytes.len() - 2);
        // Keep the delta count plausible for the remaining bytes
        let storage = MemoryStorage::new(bytes).unwrap();

        let mut ring = PointRing::open(&storage, 0).unwrap();
        assert!(ring.next().unwrap().is_ok());
        assert!(ring.next().unwrap().is_ok());
        assert!(matches!(ring.next(), Some(Err(LookupError::Storage(_)))));
        assert!(ring.next().is_none());
    }

    #[test]
    fn test_delta_count_larger_than_image_is_malformed() {
        let mut bytes = point_list(Point::new(0, 0), &[(1, 1)]);
        bytes[8..12].copy_from_slice(&1000u32.to_le_bytes());
        let storage = MemoryStorage::new(bytes).unwrap();
        assert!(matches!(
            PointRing::open(&storage, 0),
            Err(LookupError::MalformedDatabase(_))
        ));
    }

    #[test]
    fn test_read_built_records() {
        let image = DatabaseBuilder::new(24)
            .add_region(Region::from_rings(
                "Europe/Rome",
                "CET-1CEST,M3.5.0,M10.5.0/3",
                vec![vec![
                    Point::new(0, 0),
                    Point::new(0, 10),
                    Point::new(10, 10),
                    Point::new(0, 0),
                ]],
            ))
            .build()
            .unwrap();
        let storage = MemoryStorage::new(image).unwrap();

        let (header, offset) = read_header(&storage, 0).unwrap();
        assert_eq!(offset, HEADER_SIZE);
        assert_eq!(header.precision, 24);

        let (count, offset) = read_entry_count(&storage, offset).unwrap();
        assert_eq!(count, 1);

        let (entry, _) = read_entry(&storage, offset).unwrap();
        assert_eq!(entry.name, "Europe/Rome");
        assert_eq!(entry.value, "CET-1CEST,M3.5.0,M10.5.0/3");

        let (bbox, offset) = read_bounding_box(&storage, entry.position).unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                from_latitude: 0,
                from_longitude: 0,
                to_latitude: 10,
                to_longitude: 10,
            }
        );

        let (shapes, offset) = read_shape_count(&storage, offset).unwrap();
        assert_eq!(shapes, 1);
        let (shape, _) = read_shape(&storage, offset).unwrap();
        let ((start, deltas), _) = read_point_list_start(&storage, shape.position).unwrap();
        assert_eq!(start, Point::new(0, 0));
        assert_eq!(deltas, 3);
    }

    #[test]
    fn test_entry_count_larger_than_image_is_malformed() {
        let mut bytes = vec![0u8; HEADER_SIZE as usize];
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; ENTRY_SIZE as usize]);
        let storage = MemoryStorage::new(bytes).unwrap();

        let err = read_entry_count(&storage, HEADER_SIZE).unwrap_err();
        assert!(matches!(err, LookupError::MalformedDatabase(_)));
    }

    #[test]
    fn test_shape_count_larger_than_image_is_malformed() {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
        ];
        let square_region =
            Region::from_multi_polygon("Box", "BOX0", MultiPolygon::new(vec![square]));
        let mut image = DatabaseBuilder::new(24)
            .add_region(square_region)
            .build()
            .unwrap();

        let intact = MemoryStorage::new(image.clone()).unwrap();
        let (entry, _) = read_entry(&intact, HEADER_SIZE + COUNT_SIZE).unwrap();
        let shape_count_at = entry.position + BOUNDING_BOX_SIZE;
        let at = shape_count_at as usize;
        image[at..at + 4].copy_from_slice(&1_000_000u32.to_le_bytes());
        let storage = MemoryStorage::new(image).unwrap();

        assert!(matches!(
            read_shape_count(&storage, shape_count_at),
            Err(LookupError::MalformedDatabase(_))
        ));

        // The engine reaches the shape count only once the bounding box matches
        let geofence = Geofence::new(&storage);
        assert_eq!(geofence.find_timezone(50.0, 50.0).unwrap(), None);
        let err = geofence.find_timezone(5.0, 5.0).unwrap_err();
        assert!(matches!(err, LookupError::MalformedDatabase(_)));
    }

    #[test]
    fn test_fixed_strings_stop_at_nul() {
        let mut bytes = vec![0u8; ENTRY_SIZE as usize];
        bytes[..3].copy_from_slice(b"UTC");
        bytes[64..68].copy_from_slice(b"UTC0");
        bytes[128..132].copy_from_slice(&77u32.to_le_bytes());
        let storage = MemoryStorage::new(bytes).unwrap();

        let (entry, next) = read_entry(&storage, 0).unwrap();
        assert_eq!(entry.name, "UTC");
        assert_eq!(entry.value, "UTC0");
        assert_eq!(entry.position, 77);
        assert_eq!(next, ENTRY_SIZE);
    }

    #[test]
    fn test_non_utf8_string_is_malformed() {
        let mut bytes = vec![0u8; ENTRY_SIZE as usize];
        bytes[0] = 0xFF;
        let storage = MemoryStorage::new(bytes).unwrap();
        assert!(matches!(
            read_entry(&storage, 0),
            Err(LookupError::MalformedDatabase(_))
        ));
    }

    #[test]
    fn test_truncated_header_is_storage_error() {
        let storage = MemoryStorage::new(vec![1, b'T', b'Z']).unwrap();
        assert!(matches!(read_header(&storage, 0), Err(LookupError::Storage(_))));
    }
}
