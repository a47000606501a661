#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod addc;
mod align;
mod dispatch;
mod error;
mod features;
mod fold;
mod hasher;
mod kernels;
mod lanes;
mod reference;
mod tail;

#[cfg(feature = "parallel")]
#[cfg_attr(docsrs, doc(cfg(feature = "parallel")))]
pub mod parallel;

pub use addc::{CarryAdd, CarryEncoding, CarryMinusOne, NegatedCarry, addc_minus1, addc_negc};
pub use dispatch::{Dispatcher, KERNEL_ENV, global};
pub use error::ChecksumError;
pub use features::{Feature, feature_built_with, feature_cpu_has, feature_usable};
pub use fold::{combine, fold_complement, fold16};
pub use hasher::InternetChecksum;
pub use kernels::{Kernel, KernelFn};
pub use reference::{reference_checksum, reference_partial};
pub use tail::reduce_tail;

/// Sums `data` into `initial` with the process-wide kernel.
///
/// Chaining calls gives the accumulator of the concatenated input as long as
/// every piece but the last has even length. Use [`InternetChecksum`] for
/// arbitrary splits.
#[inline]
#[must_use]
pub fn checksum_partial(data: &[u8], initial: u64) -> u64 {
    global().checksum_partial(data, initial)
}

/// Computes the Internet checksum of `data` in native byte order.
#[inline]
#[must_use]
pub fn checksum(data: &[u8]) -> u16 {
    global().checksum(data)
}

/// Reports whether a hardware kernel beats the portable ones on this
/// machine.
///
/// Mirrors the dispatch decision made by [`global`], so reports surfaced to
/// users match the code path checksums actually take.
#[must_use]
pub fn simd_acceleration_available() -> bool {
    Kernel::detect().required_feature().is_some()
}
