//! Fixed, little-endian wire types for distributed coarsening.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

use crate::Gnum;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Copy a received byte buffer into a vector of records.
///
/// The buffer carries no alignment guarantee, so records are copied rather
/// than reinterpreted in place.
pub fn decode_records<T: Pod>(bytes: &[u8]) -> Result<Vec<T>, String> {
    let size = size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(format!(
            "message of {} bytes is not a whole number of {size}-byte records",
            bytes.len()
        ));
    }
    let mut out = vec![T::zeroed(); bytes.len() / size];
    cast_slice_mut(&mut out).copy_from_slice(bytes);
    Ok(out)
}

/// Item count header of a variable-size exchange.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// A single graph number.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireGnum {
    pub val_le: i64,
}

impl WireGnum {
    pub fn of(val: Gnum) -> Self {
        Self { val_le: val.to_le() }
    }
    pub fn get(&self) -> Gnum {
        i64::from_le(self.val_le)
    }
}

/// Matching request or reply: a vertex and the vertex it is (to be) mated with.
///
/// In a request, `vert` is the requesting vertex and `mate` the requested
/// one. A reply echoes the request unchanged to accept it, or carries the
/// requested vertex's actual mate in `mate` to decline.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct WireMatePair {
    pub vert_le: i64,
    pub mate_le: i64,
}

impl WireMatePair {
    pub fn new(vert: Gnum, mate: Gnum) -> Self {
        Self {
            vert_le: vert.to_le(),
            mate_le: mate.to_le(),
        }
    }
    pub fn vert(&self) -> Gnum {
        i64::from_le(self.vert_le)
    }
    pub fn mate(&self) -> Gnum {
        i64::from_le(self.mate_le)
    }
}

const_assert_eq!(size_of::<WireCount>(), 4);
const_assert_eq!(size_of::<WireGnum>(), 8);
const_assert_eq!(size_of::<WireMatePair>(), 16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_pairs_survive_the_wire() {
        let v = vec![WireMatePair::new(1, -2), WireMatePair::new(3, 4)];
        let bytes: Vec<u8> = cast_slice(&v).to_vec();
        let out: Vec<WireMatePair> = decode_records(&bytes).unwrap();
        assert_eq!(out, v);
        assert_eq!(out[0].mate(), -2);
    }

    #[test]
    fn ragged_messages_are_rejected() {
        let err = decode_records::<WireGnum>(&[0u8; 12]).unwrap_err();
        assert!(err.contains("12 bytes"));
    }

    #[test]
    fn exact_len_check() {
        assert!(expect_exact_len(4, 4).is_ok());
        assert_eq!(expect_exact_len(3, 4).unwrap_err(), "expected 4 bytes, got 3");
    }
}
