//! Add-with-carry primitives shared by every kernel.
//!
//! Scalar chains use [`CarryAdd::addc`], which takes the carry in as a flag and
//! returns the carry out as a flag. On x86_64 this lowers to the `adc`
//! instruction through `_addcarry_u32` / `_addcarry_u64`. Other targets use an
//! `overflowing_add` pair, which LLVM fuses into the native carry instruction
//! where one exists.
//!
//! SIMD lanes have no carry flag. Lane code instead derives a per-lane mask
//! from a compare after a wrapping add. There are two mask encodings, and each
//! kernel picks the one its instruction set produces cheaply:
//!
//! - [`CarryMinusOne`]: all-ones when the add did *not* overflow, zero when it
//!   did. x86 produces this from `pmaxud` + `pcmpeqd`.
//! - [`NegatedCarry`]: all-ones (that is, `-1`) when the add overflowed. NEON
//!   produces this directly from `vcltq_u32`.

/// Unsigned integer addition with an explicit carry in and carry out.
pub trait CarryAdd: Copy {
    /// Returns `(self + rhs + carry_in) mod 2^W` and whether the sum
    /// overflowed `W` bits.
    fn addc(self, rhs: Self, carry_in: bool) -> (Self, bool);
}

impl CarryAdd for u16 {
    #[inline(always)]
    fn addc(self, rhs: Self, carry_in: bool) -> (Self, bool) {
        let (sum, c1) = self.overflowing_add(rhs);
        let (sum, c2) = sum.overflowing_add(Self::from(carry_in));
        (sum, c1 | c2)
    }
}

#[cfg(not(target_arch = "x86_64"))]
impl CarryAdd for u32 {
    #[inline(always)]
    fn addc(self, rhs: Self, carry_in: bool) -> (Self, bool) {
        let (sum, c1) = self.overflowing_add(rhs);
        let (sum, c2) = sum.overflowing_add(Self::from(carry_in));
        (sum, c1 | c2)
    }
}

#[cfg(not(target_arch = "x86_64"))]
impl CarryAdd for u64 {
    #[inline(always)]
    fn addc(self, rhs: Self, carry_in: bool) -> (Self, bool) {
        let (sum, c1) = self.overflowing_add(rhs);
        let (sum, c2) = sum.overflowing_add(Self::from(carry_in));
        (sum, c1 | c2)
    }
}

#[cfg(target_arch = "x86_64")]
#[allow(unsafe_code)]
mod hw {
    //! `adc`-backed implementations.
    //!
    //! # Safety
    //!
    //! `_addcarry_u32` and `_addcarry_u64` are part of the x86_64 baseline and
    //! need no runtime feature check. They only write through the provided
    //! `&mut` output.

    use core::arch::x86_64::{_addcarry_u32, _addcarry_u64};

    use super::CarryAdd;

    impl CarryAdd for u32 {
        #[inline(always)]
        fn addc(self, rhs: Self, carry_in: bool) -> (Self, bool) {
            let mut sum = 0u32;
            #[allow(unused_unsafe)]
            let carry = unsafe { _addcarry_u32(u8::from(carry_in), self, rhs, &mut sum) };
            (sum, carry != 0)
        }
    }

    impl CarryAdd for u64 {
        #[inline(always)]
        fn addc(self, rhs: Self, carry_in: bool) -> (Self, bool) {
            let mut sum = 0u64;
            #[allow(unused_unsafe)]
            let carry = unsafe { _addcarry_u64(u8::from(carry_in), self, rhs, &mut sum) };
            (sum, carry != 0)
        }
    }
}

/// Adds `value` into `acc` and immediately folds the carry back in.
///
/// The end-around add cannot overflow a second time: if the first add
/// carried, the wrapped sum is at most `2^64 - 2`.
#[inline(always)]
pub(crate) fn add_end_around(acc: u64, value: u64) -> u64 {
    let (sum, carry) = acc.addc(value, false);
    sum + u64::from(carry)
}

/// Lane add in the carry-minus-one encoding.
///
/// Returns the wrapping sum and a mask that is `u32::MAX` when no overflow
/// occurred and `0` when it did. The true carry is `mask + 1` (mod 2^32).
#[inline(always)]
#[must_use]
pub const fn addc_minus1(a: u32, b: u32) -> (u32, u32) {
    let sum = a.wrapping_add(b);
    let max = if sum > a { sum } else { a };
    (sum, if sum == max { u32::MAX } else { 0 })
}

/// Lane add in the negated-carry encoding.
///
/// Returns the wrapping sum and a mask that is `u32::MAX` (`-1`) on overflow
/// and `0` otherwise. The true carry is `0 - mask` (mod 2^32).
#[inline(always)]
#[must_use]
pub const fn addc_negc(a: u32, b: u32) -> (u32, u32) {
    let sum = a.wrapping_add(b);
    (sum, if sum < a { u32::MAX } else { 0 })
}

/// A per-lane carry representation for SIMD-style adds.
///
/// Kernels never turn masks back into flags inside the hot loop. They sum the
/// raw masks lane-wise and convert the total into a carry count once, with
/// [`settle`](Self::settle).
pub trait CarryEncoding: Copy + Default {
    /// Short name of the encoding, used in kernel descriptions.
    const NAME: &'static str;

    /// Adds `b` into `a`, returning the wrapping sum and the carry mask.
    fn add(a: u32, b: u32) -> (u32, u32);

    /// Converts the wrapping sum of `adds` masks into the number of carries
    /// they represent, modulo 2^32.
    fn settle(masks: u32, adds: u32) -> u32;
}

/// Carry-minus-one encoding: all-ones means "no carry".
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CarryMinusOne;

impl CarryEncoding for CarryMinusOne {
    const NAME: &'static str = "carry-minus-one";

    #[inline(always)]
    fn add(a: u32, b: u32) -> (u32, u32) {
        addc_minus1(a, b)
    }

    #[inline(always)]
    fn settle(masks: u32, adds: u32) -> u32 {
        masks.wrapping_add(adds)
    }
}

/// Negated-carry encoding: all-ones means "one carry".
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NegatedCarry;

impl CarryEncoding for NegatedCarry {
    const NAME: &'static str = "negated-carry";

    #[inline(always)]
    fn add(a: u32, b: u32) -> (u32, u32) {
        addc_negc(a, b)
    }

    #[inline(always)]
    fn settle(masks: u32, _adds: u32) -> u32 {
        0u32.wrapping_sub(masks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_addc64(a: u64, b: u64, c: bool) -> (u64, bool) {
        let wide = u128::from(a) + u128::from(b) + u128::from(c);
        (wide as u64, wide >> 64 != 0)
    }

    #[test]
    fn addc_u64_matches_wide_arithmetic() {
        let samples = [0, 1, 2, 0x7FFF_FFFF_FFFF_FFFF, 0x8000_0000_0000_0000, u64::MAX - 1, u64::MAX];
        for &a in &samples {
            for &b in &samples {
                for c in [false, true] {
                    assert_eq!(a.addc(b, c), reference_addc64(a, b, c), "{a:#x} + {b:#x} + {c}");
                }
            }
        }
    }

    #[test]
    fn addc_u32_carries_out_of_top_bit() {
        assert_eq!(u32::MAX.addc(0, true), (0, true));
        assert_eq!(u32::MAX.addc(1, false), (0, true));
        assert_eq!(u32::MAX.addc(u32::MAX, true), (u32::MAX, true));
        assert_eq!(7u32.addc(8, true), (16, false));
    }

    #[test]
    fn addc_u16_chains_carry() {
        let (lo, c) = 0xFFFFu16.addc(0x0001, false);
        let (hi, c2) = 0x0000u16.addc(0x0000, c);
        assert_eq!((lo, hi, c2), (0, 1, false));
    }

    #[test]
    fn add_end_around_wraps_carry_into_low_bit() {
        assert_eq!(add_end_around(u64::MAX, 1), 1);
        assert_eq!(add_end_around(u64::MAX, u64::MAX), u64::MAX);
        assert_eq!(add_end_around(5, 6), 11);
    }

    #[test]
    fn minus_one_mask_tracks_overflow() {
        assert_eq!(addc_minus1(1, 2), (3, u32::MAX));
        assert_eq!(addc_minus1(u32::MAX, 1), (0, 0));
        assert_eq!(addc_minus1(u32::MAX, 0), (u32::MAX, u32::MAX));
        assert_eq!(addc_minus1(u32::MAX, u32::MAX), (u32::MAX - 1, 0));
    }

    #[test]
    fn negated_mask_tracks_overflow() {
        assert_eq!(addc_negc(1, 2), (3, 0));
        assert_eq!(addc_negc(u32::MAX, 1), (0, u32::MAX));
        assert_eq!(addc_negc(0, 0), (0, 0));
    }

    #[test]
    fn encodings_settle_to_the_same_carry_count() {
        let pairs = [(u32::MAX, 1), (1, 1), (0x8000_0000, 0x8000_0000), (3, 4), (u32::MAX, u32::MAX)];
        let mut m1 = 0u32;
        let mut neg = 0u32;
        let mut carries = 0u32;
        for &(a, b) in &pairs {
            m1 = m1.wrapping_add(CarryMinusOne::add(a, b).1);
            neg = neg.wrapping_add(NegatedCarry::add(a, b).1);
            carries += u32::from(a.overflowing_add(b).1);
        }
        let adds = pairs.len() as u32;
        assert_eq!(CarryMinusOne::settle(m1, adds), carries);
        assert_eq!(NegatedCarry::settle(neg, adds), carries);
    }
}
