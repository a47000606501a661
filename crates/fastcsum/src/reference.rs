//! Word-at-a-time reference implementation.

use crate::addc::add_end_around;
use crate::fold::fold_complement;

/// Sums `data` one native-endian 16-bit word at a time.
///
/// A trailing odd byte is zero-padded in memory order. This is the oracle the
/// kernels are tested against and is not tuned for speed.
#[must_use]
pub fn reference_partial(data: &[u8], initial: u64) -> u64 {
    data.chunks(2).fold(initial, |acc, pair| {
        let word = match *pair {
            [first, second] => u16::from_ne_bytes([first, second]),
            [last] => u16::from_ne_bytes([last, 0]),
            _ => 0,
        };
        add_end_around(acc, u64::from(word))
    })
}

/// Computes the Internet checksum of `data` with [`reference_partial`].
///
/// # Examples
///
/// ```
/// use fastcsum::reference_checksum;
///
/// let data = [0x00, 0x01, 0xF2, 0x03, 0xF4, 0xF5, 0xF6, 0xF7];
/// assert_eq!(reference_checksum(&data), u16::from_be(!0xDDF2));
/// ```
#[must_use]
pub fn reference_checksum(data: &[u8]) -> u16 {
    fold_complement(reference_partial(data, 0))
}
