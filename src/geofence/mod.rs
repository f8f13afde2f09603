//! Timezone lookup over a boundary database.
//!
//! Scans the table of contents in stored order. Each entry's bounding box is
//! checked first; only entries whose box contains the query have their shapes
//! decoded and ray-cast. The first entry with a containing shape wins.

pub mod polygon;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::LookupError;
use crate::format::codec::encode_fixed;
use crate::format::{
    read_bounding_box, read_entry, read_entry_count, read_header, read_shape, read_shape_count,
    DatabaseHeader, Entry, Point, PointRing, DEFAULT_SIGNATURE, HEADER_SIZE, LATITUDE_SCALE,
    LONGITUDE_SCALE,
};
use crate::storage::StorageBackend;

pub use polygon::{crosses, ring_contains};

/// The entry a query point resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionMatch {
    pub name: String,
    /// Timezone rule string, verbatim from the database.
    pub timezone: String,
}

/// Convert a query coordinate to fixed-point at the given precision.
pub fn to_fixed(latitude: f64, longitude: f64, precision: u8) -> Point {
    Point::new(
        encode_fixed(latitude, LATITUDE_SCALE, precision),
        encode_fixed(longitude, LONGITUDE_SCALE, precision),
    )
}

fn check_coordinate(latitude: f64, longitude: f64) -> Result<(), LookupError> {
    let valid = latitude.is_finite()
        && longitude.is_finite()
        && (-LATITUDE_SCALE..=LATITUDE_SCALE).contains(&latitude)
        && (-LONGITUDE_SCALE..=LONGITUDE_SCALE).contains(&longitude);
    if valid {
        Ok(())
    } else {
        Err(LookupError::InvalidCoordinate {
            latitude,
            longitude,
        })
    }
}

/// Geofence engine over one database image.
///
/// Holds no mutable state; any number of lookups may run concurrently when
/// the backend is `Sync`.
pub struct Geofence<S> {
    storage: S,
    expected_signature: Option<[u8; 4]>,
}

impl<S: StorageBackend> Geofence<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            expected_signature: Some(DEFAULT_SIGNATURE),
        }
    }

    /// Signature the header must carry, or `None` to accept any.
    pub fn with_expected_signature(mut self, signature: Option<[u8; 4]>) -> Self {
        self.expected_signature = signature;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Read and validate the database header.
    pub fn header(&self) -> Result<DatabaseHeader, LookupError> {
        let (header, _) = read_header(&self.storage, 0)?;

        if let Some(expected) = self.expected_signature {
            if header.signature != expected {
                return Err(LookupError::malformed(format!(
                    "signature {:?} does not match expected {:?}",
                    header.signature_str(),
                    String::from_utf8_lossy(&expected)
                )));
            }
        }
        if !(1..=32).contains(&header.precision) {
            return Err(LookupError::malformed(format!(
                "precision {} is outside 1..=32",
                header.precision
            )));
        }

        Ok(header)
    }

    /// All entries of the table of contents, in stored order.
    pub fn entries(&self) -> Result<Vec<Entry>, LookupError> {
        self.header()?;
        let (count, mut offset) = read_entry_count(&self.storage, HEADER_SIZE)?;

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (entry, next) = read_entry(&self.storage, offset)?;
            offset = next;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Resolve a coordinate to the first entry whose shapes contain it.
    pub fn lookup(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<RegionMatch>, LookupError> {
        check_coordinate(latitude, longitude)?;

        let header = self.header()?;
        debug!(
            "Timezone database: version {}, signature {}, precision {}, created {}",
            header.version,
            header.signature_str(),
            header.precision,
            header.creation_date_str()
        );

        let query = to_fixed(latitude, longitude, header.precision);
        debug!(
            "Search latitude {} ({}), longitude {} ({})",
            latitude, query.latitude, longitude, query.longitude
        );

        let (count, mut offset) = read_entry_count(&self.storage, HEADER_SIZE)?;
        debug!("Entries in TOC: {}", count);

        for _ in 0..count {
            let (entry, next) = read_entry(&self.storage, offset)?;
            offset = next;

            if self.entry_contains(&entry, query)? {
                debug!("Inside timezone: {}", entry.name);
                return Ok(Some(RegionMatch {
                    name: entry.name,
                    timezone: entry.value,
                }));
            }
        }

        Ok(None)
    }

    /// Timezone rule string for a coordinate, `None` when no region contains it.
    pub fn find_timezone(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<String>, LookupError> {
        Ok(self.lookup(latitude, longitude)?.map(|m| m.timezone))
    }

    fn entry_contains(&self, entry: &Entry, query: Point) -> Result<bool, LookupError> {
        let (bbox, offset) = read_bounding_box(&self.storage, entry.position)?;
        if !bbox.contains(query) {
            return Ok(false);
        }
        trace!("Inside bounding box of {}", entry.name);

        let (shapes, mut offset) = read_shape_count(&self.storage, offset)?;
        for _ in 0..shapes {
            let (shape, next) = read_shape(&self.storage, offset)?;
            offset = next;

            let ring = PointRing::open(&self.storage, shape.position)?;
            if ring_contains(ring, query)? {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
