//! Reduction of a 64-bit accumulator to the 16-bit checksum.

use crate::addc::{CarryAdd, add_end_around};

/// Folds a 64-bit one's-complement accumulator down to 16 bits without the
/// final complement.
///
/// The high and low 32-bit halves are added with end-around carry, then the
/// high and low 16-bit halves of that result.
#[inline]
#[must_use]
pub fn fold16(acc: u64) -> u16 {
    let (sum32, carry) = ((acc >> 32) as u32).addc(acc as u32, false);
    let sum32 = sum32 + u32::from(carry);
    let (sum16, carry) = ((sum32 >> 16) as u16).addc(sum32 as u16, false);
    sum16 + u16::from(carry)
}

/// Finalises an accumulator into the Internet checksum.
///
/// The result is in the same native byte order as the accumulator. Callers
/// store it into a header field with a plain native-endian write, which
/// puts the bytes in network order.
///
/// # Examples
///
/// ```
/// use fastcsum::{Kernel, fold_complement};
///
/// let data = [0x00, 0x01, 0xF2, 0x03, 0xF4, 0xF5, 0xF6, 0xF7];
/// let acc = Kernel::Generic.compute(&data, 0);
/// assert_eq!(fold_complement(acc), u16::from_be(!0xDDF2));
/// ```
#[inline]
#[must_use]
pub fn fold_complement(acc: u64) -> u16 {
    !fold16(acc)
}

/// Adds two accumulators with end-around carry.
///
/// Both must cover byte ranges that start on an even offset of the logical
/// buffer for the result to equal the accumulator of the concatenation.
#[inline]
#[must_use]
pub fn combine(a: u64, b: u64) -> u64 {
    add_end_around(a, b)
}
