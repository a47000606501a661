//! Sub-vector remainder reduction.

use crate::addc::add_end_around;

/// Reads a native-endian `u64` from the first eight bytes of `bytes`.
#[inline(always)]
pub(crate) fn read_u64(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[..8]);
    u64::from_ne_bytes(word)
}

#[inline(always)]
fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_ne_bytes(word)
}

#[inline(always)]
fn read_u16(bytes: &[u8]) -> u16 {
    u16::from_ne_bytes([bytes[0], bytes[1]])
}

/// Folds `data` into the running one's-complement accumulator `initial`.
///
/// The buffer is consumed in the largest power-of-two chunks that fit: 16, 8,
/// 4 and 2 bytes, each added with end-around carry. A trailing odd byte is
/// treated as the first byte of a zero-padded 16-bit word in memory order, so
/// it lands in the low byte on little-endian targets and in the high byte on
/// big-endian targets.
///
/// Kernels call this for remainders shorter than one vector, but any length
/// is accepted. An empty buffer returns `initial` unchanged.
///
/// # Examples
///
/// ```
/// use fastcsum::reduce_tail;
///
/// assert_eq!(reduce_tail(&[], 0x1234), 0x1234);
/// assert_eq!(reduce_tail(&[0xAB], 0), u64::from(u16::from_ne_bytes([0xAB, 0])));
/// ```
#[must_use]
pub fn reduce_tail(data: &[u8], initial: u64) -> u64 {
    let mut acc = initial;
    let mut rest = data;

    while rest.len() >= 16 {
        acc = add_end_around(acc, read_u64(rest));
        acc = add_end_around(acc, read_u64(&rest[8..]));
        rest = &rest[16..];
    }
    if rest.len() >= 8 {
        acc = add_end_around(acc, read_u64(rest));
        rest = &rest[8..];
    }
    if rest.len() >= 4 {
        acc = add_end_around(acc, u64::from(read_u32(rest)));
        rest = &rest[4..];
    }
    if rest.len() >= 2 {
        acc = add_end_around(acc, u64::from(read_u16(rest)));
        rest = &rest[2..];
    }
    if let [last] = rest {
        acc = add_end_around(acc, u64::from(u16::from_ne_bytes([*last, 0])));
    }
    acc
}
