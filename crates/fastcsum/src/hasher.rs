use std::io::{self, IoSlice, Read, Write};

use crate::dispatch::{Dispatcher, global};
use crate::error::ChecksumError;
use crate::fold::fold_complement;
use crate::kernels::{Kernel, KernelFn};

const VECTORED_STACK_CAPACITY: usize = 128;

/// Streaming Internet checksum over discontiguous buffers.
///
/// Kernels chain correctly only when each piece starts at an even offset of
/// the logical buffer. This type tracks the byte count and, after an
/// odd-length piece, runs the next kernel call in the byte-swapped frame so
/// that any split produces the same result as one call over the whole input.
///
/// # Examples
///
/// ```
/// use fastcsum::{InternetChecksum, checksum};
///
/// let mut hasher = InternetChecksum::new();
/// hasher.update(b"odd");
/// hasher.update(b" split");
/// assert_eq!(hasher.finish(), checksum(b"odd split"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct InternetChecksum {
    acc: u64,
    len: u64,
    kernel: Kernel,
    entry: KernelFn,
}

impl Default for InternetChecksum {
    fn default() -> Self {
        Self::new()
    }
}

impl InternetChecksum {
    /// Default buffer length used by [`update_reader`](Self::update_reader).
    pub const DEFAULT_READER_BUFFER_LEN: usize = 64 * 1024;

    /// Creates an empty checksum using the process-wide kernel.
    #[must_use]
    pub fn new() -> Self {
        Self::from_dispatcher(*global())
    }

    /// Creates an empty checksum pinned to `kernel`.
    pub fn with_kernel(kernel: Kernel) -> Result<Self, ChecksumError> {
        Dispatcher::with_kernel(kernel).map(Self::from_dispatcher)
    }

    fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            acc: 0,
            len: 0,
            kernel: dispatcher.kernel(),
            entry: dispatcher.kernel().entry(),
        }
    }

    /// Seeds the accumulator, for example with a pseudo-header partial sum.
    ///
    /// The seed is treated as covering an even number of bytes.
    #[must_use]
    pub const fn with_initial(mut self, initial: u64) -> Self {
        self.acc = initial;
        self
    }

    /// Kernel used for updates.
    #[must_use]
    pub const fn kernel(&self) -> Kernel {
        self.kernel
    }

    /// Number of bytes absorbed so far.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if no bytes have been absorbed yet.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clears the accumulated state, keeping the kernel.
    pub const fn reset(&mut self) {
        self.acc = 0;
        self.len = 0;
    }

    /// Absorbs another piece of the logical buffer.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.acc = if self.len % 2 == 1 {
            (self.entry)(data, self.acc.swap_bytes()).swap_bytes()
        } else {
            (self.entry)(data, self.acc)
        };
        self.len += data.len() as u64;
    }

    /// Absorbs a sequence of buffers.
    ///
    /// Small buffers are coalesced on the stack so the kernel sees fewer,
    /// longer inputs.
    #[doc(alias = "writev")]
    pub fn update_vectored(&mut self, buffers: &[IoSlice<'_>]) {
        let mut scratch = [0u8; VECTORED_STACK_CAPACITY];
        let mut scratch_len = 0usize;

        for slice in buffers {
            let chunk: &[u8] = slice;
            if chunk.is_empty() {
                continue;
            }

            if chunk.len() >= VECTORED_STACK_CAPACITY {
                self.update(&scratch[..scratch_len]);
                scratch_len = 0;
                self.update(chunk);
                continue;
            }

            if scratch_len + chunk.len() > VECTORED_STACK_CAPACITY {
                self.update(&scratch[..scratch_len]);
                scratch_len = 0;
            }
            scratch[scratch_len..scratch_len + chunk.len()].copy_from_slice(chunk);
            scratch_len += chunk.len();
        }

        self.update(&scratch[..scratch_len]);
    }

    /// Absorbs everything `reader` yields, using `buffer` as the read buffer.
    ///
    /// Returns the number of bytes consumed.
    pub fn update_reader_with_buffer<R: Read>(
        &mut self,
        reader: &mut R,
        buffer: &mut [u8],
    ) -> io::Result<u64> {
        if buffer.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "checksum reader buffer must not be empty",
            ));
        }

        let mut total = 0u64;
        loop {
            match reader.read(buffer) {
                Ok(0) => break,
                Ok(n) => {
                    self.update(&buffer[..n]);
                    total = total.saturating_add(n as u64);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(total)
    }

    /// Convenience wrapper that allocates a heap buffer.
    pub fn update_reader<R: Read>(&mut self, reader: &mut R) -> io::Result<u64> {
        let mut buffer = vec![0u8; Self::DEFAULT_READER_BUFFER_LEN];
        self.update_reader_with_buffer(reader, &mut buffer)
    }

    /// Raw accumulator, suitable for [`combine`](crate::combine) or for
    /// seeding another computation.
    #[inline]
    #[must_use]
    pub const fn partial(&self) -> u64 {
        self.acc
    }

    /// Finished 16-bit checksum in native byte order.
    #[inline]
    #[must_use]
    pub fn finish(&self) -> u16 {
        fold_complement(self.acc)
    }
}

impl Write for InternetChecksum {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        self.update_vectored(bufs);
        Ok(bufs.iter().map(|buf| buf.len()).sum())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::reference_checksum;

    fn sample() -> Vec<u8> {
        (0..777u32).map(|i| (i ^ (i >> 5)).wrapping_mul(73) as u8).collect()
    }

    #[test]
    fn every_split_matches_single_update() {
        let data = sample();
        let expected = reference_checksum(&data);
        for split in 0..=data.len() {
            let mut hasher = InternetChecksum::with_kernel(Kernel::Generic).unwrap();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            assert_eq!(hasher.finish(), expected, "split {split}");
            assert_eq!(hasher.len(), data.len() as u64);
        }
    }

    #[test]
    fn byte_at_a_time_matches() {
        let data = sample();
        let mut hasher = InternetChecksum::with_kernel(Kernel::Vec256Align).unwrap();
        for byte in &data {
            hasher.update(std::slice::from_ref(byte));
        }
        assert_eq!(hasher.finish(), reference_checksum(&data));
    }

    #[test]
    fn vectored_update_matches_contiguous() {
        let data = sample();
        let pieces: Vec<IoSlice<'_>> = [0..3, 3..4, 4..200, 200..201, 201..333, 333..777]
            .into_iter()
            .map(|r| IoSlice::new(&data[r]))
            .collect();
        let mut hasher = InternetChecksum::new();
        hasher.update_vectored(&pieces);
        assert_eq!(hasher.finish(), reference_checksum(&data));
    }

    #[test]
    fn reader_and_write_paths_agree() {
        let data = sample();
        let mut via_reader = InternetChecksum::new();
        let mut buffer = [0u8; 13];
        let read = via_reader
            .update_reader_with_buffer(&mut data.as_slice(), &mut buffer)
            .unwrap();
        assert_eq!(read, data.len() as u64);

        let mut via_copy = InternetChecksum::new();
        io::copy(&mut data.as_slice(), &mut via_copy).unwrap();
        assert_eq!(via_reader.finish(), via_copy.finish());
        assert_eq!(via_copy.finish(), reference_checksum(&data));
    }

    #[test]
    fn empty_reader_buffer_is_rejected() {
        let mut hasher = InternetChecksum::new();
        let err = hasher
            .update_reader_with_buffer(&mut [1u8, 2].as_slice(), &mut [])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn reset_clears_state() {
        let mut hasher = InternetChecksum::new();
        hasher.update(b"abc");
        hasher.reset();
        assert!(hasher.is_empty());
        assert_eq!(hasher.partial(), 0);
        assert_eq!(hasher.finish(), 0xFFFF);
    }

    #[test]
    fn initial_seed_is_carried() {
        let data = sample();
        let seed = crate::reference::reference_partial(b"pseudo-header", 0);
        let hasher = {
            let mut h = InternetChecksum::new().with_initial(seed);
            h.update(&data);
            h
        };
        let mut whole = b"pseudo-header".to_vec();
        whole.push(0);
        whole.extend_from_slice(&data);
        assert_eq!(hasher.finish(), reference_checksum(&whole));
    }

    #[test]
    fn unavailable_kernel_is_rejected() {
        for kernel in Kernel::ALL.into_iter().filter(|k| !k.is_available()) {
            assert!(InternetChecksum::with_kernel(kernel).is_err());
        }
    }
}
