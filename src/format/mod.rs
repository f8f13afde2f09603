//! On-disk layout of a timezone boundary database.
//!
//! ```text
//! Header (32 bytes)
//!   version: u8 | signature: [u8; 4] | precision: u8 | creation_date: [u8; 10] | filler: [u8; 16]
//! entry_count: u32
//! Entry[entry_count] (132 bytes each)
//!   name: [u8; 64] | value: [u8; 64] | position: u32 -> BoundingBox
//!
//! at Entry.position:
//!   BoundingBox: from_lat, from_lon, to_lat, to_lon: i32
//!   shape_count: u32
//!   Shape[shape_count]: position: u32 -> PointList
//!
//! at Shape.position:
//!   start: Point (lat: i32, lon: i32)
//!   delta_count: u32
//!   delta_count x (lat delta, lon delta), each a variable-width delta
//! ```
//!
//! All integers are little-endian and unaligned. Coordinates are fixed-point,
//! see [`codec`].

pub mod builder;
pub mod codec;
pub mod reader;

use chrono::NaiveDate;
use serde::Serialize;

pub use builder::{DatabaseBuilder, Region};
pub use reader::{
    read_bounding_box, read_entry, read_entry_count, read_header, read_point_list_start,
    read_shape, read_shape_count, PointRing,
};

/// Signature written by [`DatabaseBuilder`] and expected by default on lookup.
pub const DEFAULT_SIGNATURE: [u8; 4] = *b"TZDB";

pub const HEADER_SIZE: u32 = 32;
pub const FIXED_STRING_SIZE: usize = 64;
pub const ENTRY_SIZE: u32 = 2 * FIXED_STRING_SIZE as u32 + 4;
pub const BOUNDING_BOX_SIZE: u32 = 16;
pub const SHAPE_SIZE: u32 = 4;
pub const POINT_SIZE: u32 = 8;
pub const COUNT_SIZE: u32 = 4;

/// Smallest encoding of one delta-encoded vertex: two one-byte deltas.
pub const MIN_VERTEX_SIZE: u32 = 2;

/// Scale of the latitude axis in degrees.
pub const LATITUDE_SCALE: f64 = 90.0;
/// Scale of the longitude axis in degrees.
pub const LONGITUDE_SCALE: f64 = 180.0;

/// Database header, read at the start of every lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseHeader {
    pub version: u8,
    pub signature: [u8; 4],
    /// Bits of fractional resolution used by fixed-point coordinates.
    pub precision: u8,
    pub creation_date: [u8; 10],
    pub filler: [u8; 16],
}

impl DatabaseHeader {
    /// Signature as text, lossy for non-ASCII bytes.
    pub fn signature_str(&self) -> String {
        String::from_utf8_lossy(&self.signature).into_owned()
    }

    pub fn creation_date_str(&self) -> String {
        String::from_utf8_lossy(&self.creation_date)
            .trim_end_matches('\0')
            .to_string()
    }

    /// Creation date, if it is stored as `YYYY-MM-DD`.
    pub fn creation_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.creation_date_str(), "%Y-%m-%d").ok()
    }
}

/// One timezone region in the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub name: String,
    /// Timezone rule string returned to callers, stored verbatim.
    pub value: String,
    /// Absolute offset of this entry's bounding box.
    pub position: u32,
}

/// Fixed-point rectangle enclosing all shapes of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub from_latitude: i32,
    pub from_longitude: i32,
    pub to_latitude: i32,
    pub to_longitude: i32,
}

impl BoundingBox {
    /// Inclusive on all four edges.
    pub fn contains(&self, point: Point) -> bool {
        point.latitude >= self.from_latitude
            && point.latitude <= self.to_latitude
            && point.longitude >= self.from_longitude
            && point.longitude <= self.to_longitude
    }
}

/// Reference to one polygon ring of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub position: u32,
}

/// A fixed-point coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub latitude: i32,
    pub longitude: i32,
}

impl Point {
    pub fn new(latitude: i32, longitude: i32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_is_inclusive() {
        let bbox = BoundingBox {
            from_latitude: -10,
            from_longitude: -20,
            to_latitude: 10,
            to_longitude: 20,
        };
        assert!(bbox.contains(Point::new(10, 20)));
        assert!(bbox.contains(Point::new(-10, -20)));
        assert!(!bbox.contains(Point::new(11, 0)));
        assert!(!bbox.contains(Point::new(0, -21)));
    }

    #[test]
    fn test_creation_date_parsing() {
        let mut header = DatabaseHeader {
            version: 1,
            signature: DEFAULT_SIGNATURE,
            precision: 24,
            creation_date: *b"2023-04-17",
            filler: [0; 16],
        };
        let expected = NaiveDate::from_ymd_opt(2023, 4, 17);
        assert_eq!(header.creation_date(), expected);

        header.creation_date = *b"not a date";
        assert_eq!(header.creation_date(), None);
        assert_eq!(header.creation_date_str(), "not a date");
    }
}
