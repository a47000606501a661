//! Alignment prologue for kernels that want aligned wide loads.
//!
//! The tail reducer always pairs bytes starting at the front of its input.
//! Peeling an odd number of bytes therefore moves the word boundary for the
//! rest of the buffer by one byte. Byte-swapping a 64-bit accumulator
//! multiplies it by 256 modulo `2^16 - 1`, which is exactly that shift, so
//! the accumulator is swapped right after an odd peel and swapped back once
//! the whole buffer has been summed.

use crate::tail::reduce_tail;

/// Per-call alignment bookkeeping.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct AlignmentState {
    width: usize,
    offset: usize,
    flipped: bool,
}

impl AlignmentState {
    /// Creates state for a kernel whose loads want `width`-byte alignment.
    pub(crate) const fn new(width: usize) -> Self {
        Self {
            width,
            offset: 0,
            flipped: false,
        }
    }

    /// Misalignment of the buffer start observed by [`peel`](Self::peel).
    #[cfg(test)]
    pub(crate) const fn offset(&self) -> usize {
        self.offset
    }

    /// Whether an odd-length prefix was peeled.
    #[cfg(test)]
    pub(crate) const fn flipped(&self) -> bool {
        self.flipped
    }

    /// Reduces the unaligned prefix of `data` into `acc`.
    ///
    /// Nothing is peeled when the buffer is already aligned, shorter than
    /// `min_len`, or too short to leave at least one full vector after the
    /// prefix. Otherwise the returned slice starts on a `width`-byte boundary
    /// and the returned accumulator is byte-swapped if the peeled prefix had
    /// odd length.
    pub(crate) fn peel<'a>(&mut self, data: &'a [u8], min_len: usize, acc: u64) -> (&'a [u8], u64) {
        self.offset = data.as_ptr().addr() % self.width;
        if self.offset == 0 {
            return (data, acc);
        }
        let head_len = self.width - self.offset;
        if data.len() < min_len.max(head_len + self.width) {
            return (data, acc);
        }

        let (head, rest) = data.split_at(head_len);
        let mut acc = reduce_tail(head, acc);
        if head.len() % 2 == 1 {
            acc = acc.swap_bytes();
            self.flipped = true;
        }
        (rest, acc)
    }

    /// Undoes the byte swap applied by an odd peel.
    #[inline]
    pub(crate) const fn finish(&self, acc: u64) -> u64 {
        if self.flipped { acc.swap_bytes() } else { acc }
    }
}
