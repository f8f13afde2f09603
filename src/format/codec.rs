//! Primitive decoding: little-endian scalars, fixed-point coordinates and the
//! variable-width signed delta format.
//!
//! Every reader takes an absolute offset and returns the decoded value together
//! with the offset just past it.

use crate::error::StorageError;
use crate::storage::StorageBackend;

/// Marker byte introducing a 16-bit delta.
pub const DELTA16_MARKER: u8 = 0x80;
/// Marker byte introducing a 32-bit delta.
pub const DELTA32_MARKER: u8 = 0x7F;

fn fixed_factor(precision: u8) -> f64 {
    2f64.powi(i32::from(precision) - 1)
}

/// Encode degrees on an axis of the given scale (90 or 180) as fixed-point.
///
/// Does not clamp: input outside `[-scale, scale]` yields an out-of-range value.
/// `precision` must be at least 1.
pub fn encode_fixed(degrees: f64, scale: f64, precision: u8) -> i32 {
    ((degrees / scale) * fixed_factor(precision)).round() as i32
}

/// Inverse of [`encode_fixed`].
pub fn decode_fixed(value: i32, scale: f64, precision: u8) -> f64 {
    (f64::from(value) / fixed_factor(precision)) * scale
}

/// Size of one quantization step in degrees.
pub fn quantization_step(scale: f64, precision: u8) -> f64 {
    scale / fixed_factor(precision)
}

fn advance(offset: u32, by: u32, size: u32) -> Result<u32, StorageError> {
    offset.checked_add(by).ok_or(StorageError::OutOfRange {
        offset,
        length: by,
        size,
    })
}

/// Read `N` raw bytes.
pub fn read_array<S, const N: usize>(
    storage: &S,
    offset: u32,
) -> Result<([u8; N], u32), StorageError>
where
    S: StorageBackend + ?Sized,
{
    let mut buf = [0u8; N];
    storage.read_at(offset, &mut buf)?;
    Ok((buf, advance(offset, N as u32, storage.len())?))
}

pub fn read_u8<S: StorageBackend + ?Sized>(
    storage: &S,
    offset: u32,
) -> Result<(u8, u32), StorageError> {
    let ([b], next) = read_array::<S, 1>(storage, offset)?;
    Ok((b, next))
}

pub fn read_u32<S: StorageBackend + ?Sized>(
    storage: &S,
    offset: u32,
) -> Result<(u32, u32), StorageError> {
    let (bytes, next) = read_array::<S, 4>(storage, offset)?;
    Ok((u32::from_le_bytes(bytes), next))
}

pub fn read_i32<S: StorageBackend + ?Sized>(
    storage: &S,
    offset: u32,
) -> Result<(i32, u32), StorageError> {
    let (bytes, next) = read_array::<S, 4>(storage, offset)?;
    Ok((i32::from_le_bytes(bytes), next))
}

/// Decode one variable-width signed delta.
///
/// `0x80` is followed by an i16, `0x7F` by an i32; any other byte is itself an i8.
pub fn decode_delta<S: StorageBackend + ?Sized>(
    storage: &S,
    offset: u32,
) -> Result<(i32, u32), StorageError> {
    let (marker, next) = read_u8(storage, offset)?;
    match marker {
        DELTA16_MARKER => {
            let (bytes, next) = read_array::<S, 2>(storage, next)?;
            Ok((i32::from(i16::from_le_bytes(bytes)), next))
        }
        DELTA32_MARKER => read_i32(storage, next),
        small => Ok((i32::from(small as i8), next)),
    }
}

/// Number of bytes [`encode_delta`] emits for `value`.
pub fn encoded_delta_len(value: i32) -> usize {
    match value {
        -127..=126 => 1,
        v if i16::try_from(v).is_ok() => 3,
        _ => 5,
    }
}

/// Append the shortest encoding of `value`.
///
/// 127 and -128 share their byte with the markers and are always escaped.
pub fn encode_delta(value: i32, out: &mut Vec<u8>) {
    match encoded_delta_len(value) {
        1 => out.push(value as i8 as u8),
        3 => {
            out.push(DELTA16_MARKER);
            out.extend_from_slice(&(value as i16).to_le_bytes());
        }
        _ => {
            out.push(DELTA32_MARKER);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}
