//! Portable lane-vector engine behind the `vec128` and `vec256` kernels.
//!
//! A [`LaneVector`] holds `K` independent 32-bit partial sums. Adds into it use
//! one of the [`CarryEncoding`]s, and the resulting masks are summed into a
//! second lane vector rather than into the sums themselves. Adding carries
//! straight back into a lane can overflow that lane again and lose the carry.
//! The masks are converted into carry counts with
//! [`CarryEncoding::settle`] and spilled into a 64-bit scalar before the
//! per-lane counts could wrap.
//!
//! Every carry leaves a lane at a 16-bit aligned position. Since
//! `2^16 ≡ 1 (mod 2^16 - 1)`, each one is worth exactly one unit of the
//! one's-complement sum, so the settled counts can be added as plain integers.

use core::marker::PhantomData;

use crate::addc::{CarryEncoding, add_end_around};
use crate::align::AlignmentState;
use crate::tail::reduce_tail;

/// Number of full-width loads consumed per main-loop iteration.
pub(crate) const BLOCK_LOADS: usize = 8;

/// Mask adds allowed per lane before the settled counts are spilled.
pub(crate) const SPILL_AFTER_ADDS: u32 = 1 << 30;

/// `K` parallel 32-bit partial sums.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LaneVector<const K: usize>(pub [u32; K]);

impl<const K: usize> LaneVector<K> {
    /// All lanes zero.
    pub const ZERO: Self = Self([0; K]);
    /// Width of the vector in bytes.
    pub const BYTES: usize = K * 4;

    /// Loads `K` native-endian words from the front of `bytes`.
    #[inline(always)]
    #[must_use]
    pub fn load(bytes: &[u8]) -> Self {
        let mut lanes = [0u32; K];
        for (lane, word) in lanes.iter_mut().zip(bytes[..Self::BYTES].chunks_exact(4)) {
            *lane = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]);
        }
        Self(lanes)
    }

    /// Lane-wise wrapping add.
    #[inline(always)]
    #[must_use]
    pub fn wrapping_add(self, rhs: Self) -> Self {
        let mut out = self.0;
        for (lane, r) in out.iter_mut().zip(rhs.0) {
            *lane = lane.wrapping_add(r);
        }
        Self(out)
    }

    /// Lane-wise add returning the sums and the carry masks in encoding `E`.
    #[inline(always)]
    #[must_use]
    pub fn add_with<E: CarryEncoding>(self, rhs: Self) -> (Self, Self) {
        let mut sums = [0u32; K];
        let mut masks = [0u32; K];
        for i in 0..K {
            (sums[i], masks[i]) = E::add(self.0[i], rhs.0[i]);
        }
        (Self(sums), Self(masks))
    }

    /// Carry-chains every lane into `acc`.
    ///
    /// Adjacent lanes are paired into one 64-bit word, which is congruent to
    /// the sum of the two lanes modulo `2^16 - 1`.
    #[inline]
    #[must_use]
    pub fn fold_into(self, acc: u64) -> u64 {
        fold_words(&self.0, acc)
    }
}

/// Carry-chains a slice of 32-bit lane values into `acc`.
#[inline]
pub(crate) fn fold_words(lanes: &[u32], acc: u64) -> u64 {
    let mut acc = acc;
    let mut pairs = lanes.chunks_exact(2);
    for pair in &mut pairs {
        acc = add_end_around(acc, u64::from(pair[0]) | (u64::from(pair[1]) << 32));
    }
    if let [last] = pairs.remainder() {
        acc = add_end_around(acc, u64::from(*last));
    }
    acc
}

/// Converts accumulated lane masks into a total carry count.
#[inline]
pub(crate) fn settle_masks<E: CarryEncoding>(masks: &[u32], adds: u32) -> u64 {
    masks.iter().map(|&m| u64::from(E::settle(m, adds))).sum()
}

/// Order in which the loads of one block are combined.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Topology {
    /// Left fold: `((v0 + v1) + v2) + ...`. One long dependency chain.
    Serial,
    /// Pairwise rounds: `(v0 + v1) + (v2 + v3)`. Halves the critical path per
    /// round.
    Tree,
}

impl Topology {
    /// Reduces `loads` to one vector, adding every carry mask into `masks`.
    ///
    /// Performs `loads.len() - 1` encoded adds. `loads` is clobbered by the tree
    /// form.
    #[inline(always)]
    pub fn reduce<const K: usize, E: CarryEncoding>(
        self,
        loads: &mut [LaneVector<K>],
        masks: &mut LaneVector<K>,
    ) -> LaneVector<K> {
        match self {
            Self::Serial => {
                let mut acc = loads[0];
                for &next in &loads[1..] {
                    let (sum, carry) = acc.add_with::<E>(next);
                    acc = sum;
                    *masks = masks.wrapping_add(carry);
                }
                acc
            }
            Self::Tree => {
                let mut live = loads.len();
                while live > 1 {
                    let half = live / 2;
                    for i in 0..half {
                        let (sum, carry) = loads[2 * i].add_with::<E>(loads[2 * i + 1]);
                        loads[i] = sum;
                        *masks = masks.wrapping_add(carry);
                    }
                    if live % 2 == 1 {
                        loads[half] = loads[live - 1];
                    }
                    live = half + live % 2;
                }
                loads[0]
            }
        }
    }
}

/// Running state of a lane kernel: the sums, the unsettled carry masks and
/// the carries already spilled to a scalar.
#[derive(Clone, Debug)]
pub struct LaneAccumulator<const K: usize, E: CarryEncoding> {
    sums: LaneVector<K>,
    masks: LaneVector<K>,
    adds: u32,
    spilled: u64,
    spill_after: u32,
    encoding: PhantomData<E>,
}

impl<const K: usize, E: CarryEncoding> Default for LaneAccumulator<K, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize, E: CarryEncoding> LaneAccumulator<K, E> {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sums: LaneVector::ZERO,
            masks: LaneVector::ZERO,
            adds: 0,
            spilled: 0,
            spill_after: SPILL_AFTER_ADDS,
            encoding: PhantomData,
        }
    }

    #[cfg(test)]
    fn with_spill_after(spill_after: u32) -> Self {
        Self {
            spill_after,
            ..Self::new()
        }
    }

    /// Absorbs `bytes`, which must be a whole number of vectors, at most
    /// [`BLOCK_LOADS`] of them.
    #[inline]
    pub fn absorb(&mut self, bytes: &[u8], topology: Topology) {
        debug_assert!(bytes.len() % LaneVector::<K>::BYTES == 0);
        let mut loads = [LaneVector::<K>::ZERO; BLOCK_LOADS];
        let count = bytes.len() / LaneVector::<K>::BYTES;
        for (slot, chunk) in loads.iter_mut().zip(bytes.chunks_exact(LaneVector::<K>::BYTES)) {
            *slot = LaneVector::load(chunk);
        }

        let block = topology.reduce::<K, E>(&mut loads[..count], &mut self.masks);
        let (sums, carry) = self.sums.add_with::<E>(block);
        self.sums = sums;
        self.masks = self.masks.wrapping_add(carry);
        self.adds += count as u32;

        if self.adds >= self.spill_after {
            self.spill();
        }
    }

    fn spill(&mut self) {
        self.spilled += settle_masks::<E>(&self.masks.0, self.adds);
        self.masks = LaneVector::ZERO;
        self.adds = 0;
    }

    /// Folds the lane sums and every outstanding carry into `acc`.
    #[must_use]
    pub fn finish(mut self, acc: u64) -> u64 {
        self.spill();
        let acc = self.sums.fold_into(acc);
        add_end_around(acc, self.spilled)
    }
}

/// Shape parameters for a portable lane kernel.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LaneShape {
    pub topology: Topology,
    /// Minimum buffer length for which the alignment prologue runs, or `None`
    /// for kernels that load unaligned.
    pub peel_min: Option<usize>,
}

/// Runs a `K`-lane kernel over `data`.
///
/// Blocks of [`BLOCK_LOADS`] vectors are consumed first, then single steps of
/// four, two and one vector, then the tail reducer.
pub(crate) fn checksum_lanes<const K: usize, E: CarryEncoding>(
    data: &[u8],
    initial: u64,
    shape: LaneShape,
) -> u64 {
    let width = LaneVector::<K>::BYTES;
    let mut align = AlignmentState::new(width);
    let (mut rest, acc) = match shape.peel_min {
        Some(min_len) => align.peel(data, min_len, initial),
        None => (data, initial),
    };

    let mut lanes = LaneAccumulator::<K, E>::new();
    let block = width * BLOCK_LOADS;
    while rest.len() >= block {
        lanes.absorb(&rest[..block], shape.topology);
        rest = &rest[block..];
    }
    for loads in [4, 2, 1] {
        let step = width * loads;
        if rest.len() >= step {
            lanes.absorb(&rest[..step], shape.topology);
            rest = &rest[step..];
        }
    }

    let acc = lanes.finish(acc);
    align.finish(reduce_tail(rest, acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addc::{CarryMinusOne, NegatedCarry};
    use crate::fold::fold16;
    use crate::tail::reduce_tail;

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len)
            .map(|i| (i as u8).wrapping_mul(131).wrapping_add(seed) ^ 0xA5)
            .collect()
    }

    #[test]
    fn load_reads_native_words() {
        let bytes: Vec<u8> = (1u8..=16).collect();
        let v = LaneVector::<4>::load(&bytes);
        assert_eq!(v.0[0], u32::from_ne_bytes([1, 2, 3, 4]));
        assert_eq!(v.0[3], u32::from_ne_bytes([13, 14, 15, 16]));
    }

    #[test]
    fn topologies_agree_after_fold() {
        let data = pattern(LaneVector::<8>::BYTES * BLOCK_LOADS, 7);
        let run = |topology| {
            let mut lanes = LaneAccumulator::<8, CarryMinusOne>::new();
            lanes.absorb(&data, topology);
            fold16(lanes.finish(0))
        };
        assert_eq!(run(Topology::Serial), run(Topology::Tree));
        assert_eq!(run(Topology::Tree), fold16(reduce_tail(&data, 0)));
    }

    #[test]
    fn tree_handles_odd_load_counts() {
        let data = pattern(LaneVector::<4>::BYTES * 8, 3);
        let mut loads: Vec<_> = data.chunks_exact(16).take(5).map(LaneVector::<4>::load).collect();
        let mut serial_loads = loads.clone();
        let mut m_tree = LaneVector::ZERO;
        let mut m_serial = LaneVector::ZERO;
        let tree = Topology::Tree.reduce::<4, NegatedCarry>(&mut loads, &mut m_tree);
        let serial = Topology::Serial.reduce::<4, NegatedCarry>(&mut serial_loads, &mut m_serial);
        let total = |v: LaneVector<4>, m: LaneVector<4>| {
            let acc = v.fold_into(0);
            fold16(add_end_around(acc, settle_masks::<NegatedCarry>(&m.0, 4)))
        };
        assert_eq!(total(tree, m_tree), total(serial, m_serial));
    }

    #[test]
    fn saturated_lanes_keep_every_carry() {
        // A lane already at u32::MAX overflowing once more must still count
        // both carries.
        let data = [0xFFu8; 16 * 8 * 3];
        for spill_after in [1, 3, 8, SPILL_AFTER_ADDS] {
            let mut lanes = LaneAccumulator::<4, CarryMinusOne>::with_spill_after(spill_after);
            for block in data.chunks_exact(16 * 8) {
                lanes.absorb(block, Topology::Tree);
            }
            assert_eq!(fold16(lanes.finish(0)), fold16(reduce_tail(&data, 0)), "spill {spill_after}");
        }
    }

    #[test]
    fn encodings_produce_identical_checksums() {
        let shape = LaneShape {
            topology: Topology::Tree,
            peel_min: None,
        };
        for len in [0, 1, 31, 32, 33, 255, 256, 257, 1023, 1500] {
            let data = pattern(len, len as u8);
            let minus1 = checksum_lanes::<8, CarryMinusOne>(&data, 0, shape);
            let negc = checksum_lanes::<8, NegatedCarry>(&data, 0, shape);
            assert_eq!(fold16(minus1), fold16(negc), "len {len}");
            assert_eq!(fold16(minus1), fold16(reduce_tail(&data, 0)), "len {len}");
        }
    }

    #[test]
    fn fold_words_handles_odd_lane_counts() {
        assert_eq!(fold_words(&[1, 2, 3], 0), 1 + (2 << 32) + 3);
        assert_eq!(fold_words(&[], 9), 9);
    }
}
