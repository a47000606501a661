//! Portable 128- and 256-bit lane kernels.
//!
//! These run on any target. They exercise the same carry encodings and fold
//! topologies as the intrinsic kernels, which makes them useful both as a
//! fallback and as a cross-check.

use crate::addc::{CarryMinusOne, NegatedCarry};
use crate::lanes::{LaneShape, Topology, checksum_lanes};

const UNALIGNED_TREE: LaneShape = LaneShape {
    topology: Topology::Tree,
    peel_min: None,
};

pub(crate) fn checksum_vec128(data: &[u8], initial: u64) -> u64 {
    checksum_lanes::<4, CarryMinusOne>(data, initial, UNALIGNED_TREE)
}

pub(crate) fn checksum_vec128_align(data: &[u8], initial: u64) -> u64 {
    let shape = LaneShape {
        topology: Topology::Tree,
        peel_min: Some(16),
    };
    checksum_lanes::<4, CarryMinusOne>(data, initial, shape)
}

pub(crate) fn checksum_vec256(data: &[u8], initial: u64) -> u64 {
    checksum_lanes::<8, CarryMinusOne>(data, initial, UNALIGNED_TREE)
}

pub(crate) fn checksum_vec256_serial(data: &[u8], initial: u64) -> u64 {
    let shape = LaneShape {
        topology: Topology::Serial,
        peel_min: None,
    };
    checksum_lanes::<8, CarryMinusOne>(data, initial, shape)
}

// Buffers of two vectors or less gain nothing from peeling.
const VEC256_PEEL_MIN: usize = 65;

pub(crate) fn checksum_vec256_align(data: &[u8], initial: u64) -> u64 {
    let shape = LaneShape {
        topology: Topology::Tree,
        peel_min: Some(VEC256_PEEL_MIN),
    };
    checksum_lanes::<8, CarryMinusOne>(data, initial, shape)
}

pub(crate) fn checksum_vec256_align_negc(data: &[u8], initial: u64) -> u64 {
    let shape = LaneShape {
        topology: Topology::Tree,
        peel_min: Some(VEC256_PEEL_MIN),
    };
    checksum_lanes::<8, NegatedCarry>(data, initial, shape)
}
