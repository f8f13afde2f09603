//! Writes database images in the on-disk layout.
//!
//! Regions are written in the order they are added; lookups resolve
//! overlapping regions by that order.

use chrono::NaiveDate;
use geo::MultiPolygon;
use tracing::debug;

use super::codec::{encode_delta, encode_fixed};
use super::{
    Point, DEFAULT_SIGNATURE, ENTRY_SIZE, FIXED_STRING_SIZE, HEADER_SIZE, LATITUDE_SCALE,
    LONGITUDE_SCALE, SHAPE_SIZE,
};
use crate::error::BuildError;

/// Boundary geometry of a region.
#[derive(Debug, Clone)]
pub enum RegionGeometry {
    /// Rings of fixed-point vertices, written as given.
    Fixed(Vec<Vec<Point>>),
    /// Polygons in degrees (x = longitude, y = latitude). Only exterior rings are written.
    Degrees(MultiPolygon<f64>),
}

/// One timezone region to be written as an entry.
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub value: String,
    pub geometry: RegionGeometry,
}

impl Region {
    pub fn from_rings(
        name: impl Into<String>,
        value: impl Into<String>,
        rings: Vec<Vec<Point>>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            geometry: RegionGeometry::Fixed(rings),
        }
    }

    pub fn from_multi_polygon(
        name: impl Into<String>,
        value: impl Into<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            geometry: RegionGeometry::Degrees(geometry),
        }
    }

    fn fixed_rings(&self, precision: u8) -> Vec<Vec<Point>> {
        match &self.geometry {
            RegionGeometry::Fixed(rings) => rings.clone(),
            RegionGeometry::Degrees(polygons) => polygons
                .iter()
                .map(|polygon| {
                    polygon
                        .exterior()
                        .coords()
                        .map(|c| {
                            Point::new(
                                encode_fixed(c.y, LATITUDE_SCALE, precision),
                                encode_fixed(c.x, LONGITUDE_SCALE, precision),
                            )
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

/// Assembles a complete database image.
#[derive(Debug, Clone)]
pub struct DatabaseBuilder {
    version: u8,
    signature: [u8; 4],
    precision: u8,
    creation_date: Option<NaiveDate>,
    regions: Vec<Region>,
}

impl DatabaseBuilder {
    pub fn new(precision: u8) -> Self {
        Self {
            version: 1,
            signature: DEFAULT_SIGNATURE,
            precision,
            creation_date: None,
            regions: Vec::new(),
        }
    }

    pub fn version(&mut self, version: u8) -> &mut Self {
        self.version = version;
        self
    }

    pub fn signature(&mut self, signature: [u8; 4]) -> &mut Self {
        self.signature = signature;
        self
    }

    pub fn creation_date(&mut self, date: NaiveDate) -> &mut Self {
        self.creation_date = Some(date);
        self
    }

    pub fn add_region(&mut self, region: Region) -> &mut Self {
        self.regions.push(region);
        self
    }

    pub fn build(&self) -> Result<Vec<u8>, BuildError> {
        if !(1..=32).contains(&self.precision) {
            return Err(BuildError::InvalidPrecision(self.precision));
        }

        let mut image = Vec::new();
        self.write_header(&mut image);
        image.extend_from_slice(&(self.regions.len() as u32).to_le_bytes());

        let toc_start = image.len();
        let entries_len = self.regions.len() * ENTRY_SIZE as usize;
        image.resize(toc_start + entries_len, 0);

        for (i, region) in self.regions.iter().enumerate() {
            let rings = self.region_rings(region)?;
            let position = offset_of(&image)?;

            let entry_at = toc_start + i * ENTRY_SIZE as usize;
            let entry = &mut image[entry_at..entry_at + ENTRY_SIZE as usize];
            write_fixed_string(&mut entry[..FIXED_STRING_SIZE], "name", &region.name)?;
            write_fixed_string(
                &mut entry[FIXED_STRING_SIZE..2 * FIXED_STRING_SIZE],
                "value",
                &region.value,
            )?;
            entry[2 * FIXED_STRING_SIZE..].copy_from_slice(&position.to_le_bytes());

            write_region_geometry(&mut image, &rings)?;
        }

        offset_of(&image)?;
        debug!(
            "Built database image: {} regions, {} bytes",
            self.regions.len(),
            image.len()
        );
        Ok(image)
    }

    fn write_header(&self, image: &mut Vec<u8>) {
        let mut date = [0u8; 10];
        if let Some(created) = self.creation_date {
            let text = created.format("%Y-%m-%d").to_string();
            let len = text.len().min(date.len());
            date[..len].copy_from_slice(&text.as_bytes()[..len]);
        }

        image.push(self.version);
        image.extend_from_slice(&self.signature);
        image.push(self.precision);
        image.extend_from_slice(&date);
        image.extend_from_slice(&[0u8; 16]);
        debug_assert_eq!(image.len(), HEADER_SIZE as usize);
    }

    fn region_rings(&self, region: &Region) -> Result<Vec<Vec<Point>>, BuildError> {
        let rings = region.fixed_rings(self.precision);
        if rings.is_empty() {
            return Err(BuildError::EmptyRegion(region.name.clone()));
        }
        if rings.iter().any(|ring| ring.len() < 2) {
            return Err(BuildError::DegenerateRing(region.name.clone()));
        }
        Ok(rings)
    }
}

fn offset_of(image: &[u8]) -> Result<u32, BuildError> {
    u32::try_from(image.len()).map_err(|_| BuildError::ImageTooLarge)
}

fn write_fixed_string(slot: &mut [u8], field: &'static str, text: &str) -> Result<(), BuildError> {
    if text.len() > slot.len() {
        return Err(BuildError::StringTooLong {
            field,
            text: text.to_string(),
            max: slot.len(),
        });
    }
    slot[..text.len()].copy_from_slice(text.as_bytes());
    Ok(())
}

/// Bounding box, shape table and point lists of one region, appended at the end of `image`.
fn write_region_geometry(image: &mut Vec<u8>, rings: &[Vec<Point>]) -> Result<(), BuildError> {
    let mut from = Point::new(i32::MAX, i32::MAX);
    let mut to = Point::new(i32::MIN, i32::MIN);
    for p in rings.iter().flatten() {
        from.latitude = from.latitude.min(p.latitude);
        from.longitude = from.longitude.min(p.longitude);
        to.latitude = to.latitude.max(p.latitude);
        to.longitude = to.longitude.max(p.longitude);
    }

    for v in [from.latitude, from.longitude, to.latitude, to.longitude] {
        image.extend_from_slice(&v.to_le_bytes());
    }
    image.extend_from_slice(&(rings.len() as u32).to_le_bytes());

    let shape_table = image.len();
    image.resize(shape_table + rings.len() * SHAPE_SIZE as usize, 0);

    for (i, ring) in rings.iter().enumerate() {
        let position = offset_of(image)?;
        let slot = shape_table + i * SHAPE_SIZE as usize;
        image[slot..slot + SHAPE_SIZE as usize].copy_from_slice(&position.to_le_bytes());
        write_point_list(image, ring);
    }
    Ok(())
}

fn write_point_list(image: &mut Vec<u8>, ring: &[Point]) {
    let start = ring[0];
    image.extend_from_slice(&start.latitude.to_le_bytes());
    image.extend_from_slice(&start.longitude.to_le_bytes());
    image.extend_from_slice(&((ring.len() - 1) as u32).to_le_bytes());

    for pair in ring.windows(2) {
        encode_delta(pair[1].latitude.wrapping_sub(pair[0].latitude), image);
        encode_delta(pair[1].longitude.wrapping_sub(pair[0].longitude), image);
    }
}
