use crate::addc::{CarryAdd, add_end_around};
use crate::tail::{read_u64, reduce_tail};

const STRIDE: usize = 32;

/// Portable kernel: four chained 64-bit adds per 32-byte stride.
///
/// The carry out of each stride is folded back before the next stride
/// starts, so the carry never grows past one bit.
pub(crate) fn checksum_generic(data: &[u8], initial: u64) -> u64 {
    let mut acc = initial;
    let mut strides = data.chunks_exact(STRIDE);
    for stride in &mut strides {
        let (sum, c) = acc.addc(read_u64(stride), false);
        let (sum, c) = sum.addc(read_u64(&stride[8..]), c);
        let (sum, c) = sum.addc(read_u64(&stride[16..]), c);
        let (sum, c) = sum.addc(read_u64(&stride[24..]), c);
        acc = add_end_around(sum, u64::from(c));
    }

    let mut rest = strides.remainder();
    if rest.len() >= 16 {
        let (sum, c) = acc.addc(read_u64(rest), false);
        let (sum, c) = sum.addc(read_u64(&rest[8..]), c);
        acc = add_end_around(sum, u64::from(c));
        rest = &rest[16..];
    }
    reduce_tail(rest, acc)
}
