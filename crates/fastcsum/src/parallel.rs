//! Multi-threaded checksums over large buffers.

use rayon::prelude::*;

use crate::dispatch::global;
use crate::fold::{combine, fold_complement};

/// Bytes handed to each rayon task. Must stay even so every chunk starts on a
/// 16-bit word boundary of the buffer.
pub const PARALLEL_CHUNK_LEN: usize = 64 * 1024;

/// Sums `data` into `initial`, splitting the work across rayon's pool.
///
/// Inputs no larger than one chunk are summed on the calling thread.
///
/// # Examples
///
/// ```
/// use fastcsum::{checksum_partial, fold_complement};
/// use fastcsum::parallel::checksum_partial_parallel;
///
/// let data = vec![0x5Au8; 300_001];
/// assert_eq!(
///     fold_complement(checksum_partial_parallel(&data, 0)),
///     fold_complement(checksum_partial(&data, 0)),
/// );
/// ```
#[must_use]
pub fn checksum_partial_parallel(data: &[u8], initial: u64) -> u64 {
    let dispatcher = global();
    if data.len() <= PARALLEL_CHUNK_LEN {
        return dispatcher.checksum_partial(data, initial);
    }
    let sum = data
        .par_chunks(PARALLEL_CHUNK_LEN)
        .map(|chunk| dispatcher.checksum_partial(chunk, 0))
        .reduce(|| 0, combine);
    combine(initial, sum)
}

/// Computes the finished checksum of `data` in parallel.
#[must_use]
pub fn checksum_parallel(data: &[u8]) -> u16 {
    fold_complement(checksum_partial_parallel(data, 0))
}
