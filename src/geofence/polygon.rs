//! Even-odd ray casting over a streamed ring.

use tracing::trace;

use crate::error::LookupError;
use crate::format::Point;

/// Whether the edge `p1 -> p2` toggles the parity for `query`.
///
/// The query latitude must lie in `(min, max]` of the edge, the query longitude
/// must not exceed the edge's larger longitude, and horizontal edges never count
/// (their endpoints are already counted by the neighbouring edges).
pub fn crosses(p1: Point, p2: Point, query: Point) -> bool {
    let (lat, lon) = (query.latitude, query.longitude);

    if lat <= p1.latitude.min(p2.latitude) || lat > p1.latitude.max(p2.latitude) {
        return false;
    }
    if lon > p1.longitude.max(p2.longitude) {
        return false;
    }
    if p1.latitude == p2.latitude {
        return false;
    }

    let d_lat = i64::from(p2.latitude) - i64::from(p1.latitude);
    let d_lon = i64::from(p2.longitude) - i64::from(p1.longitude);
    let x = (i64::from(lat) - i64::from(p1.latitude)) as f64 * d_lon as f64 / d_lat as f64
        + f64::from(p1.longitude);

    f64::from(lon) <= x
}

/// Even-odd containment of `query` in the ring formed by consecutive `vertices`.
///
/// Edges join consecutive vertices only; the ring is not closed implicitly.
pub fn ring_contains<I>(vertices: I, query: Point) -> Result<bool, LookupError>
where
    I: IntoIterator<Item = Result<Point, LookupError>>,
{
    let mut vertices = vertices.into_iter();
    let mut p1 = match vertices.next() {
        Some(first) => first?,
        None => return Ok(false),
    };

    let mut odd = false;
    for p2 in vertices {
        let p2 = p2?;
        if crosses(p1, p2, query) {
            odd = !odd;
            trace!(
                "Crossed edge ({}, {}) -> ({}, {})",
                p1.latitude,
                p1.longitude,
                p2.latitude,
                p2.longitude
            );
        }
        p1 = p2;
    }

    Ok(odd)
}
