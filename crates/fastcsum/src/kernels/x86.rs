//! x86_64 hardware kernels.
//!
//! # Safety
//!
//! This module contains `unsafe` code for carry-chain and SIMD intrinsics.
//! Safety is ensured by:
//!
//! - **Runtime CPU feature detection**: every public entry point checks
//!   [`Feature::usable`] before calling its `#[target_feature]` body and
//!   aborts otherwise. Detection is cached in a `OnceLock`.
//!
//! - **Memory alignment**: the SSE4.1 and AVX2 kernels use aligned loads. They
//!   only issue them when the buffer left by the alignment prologue starts on
//!   a vector boundary. A buffer too short to peel goes straight to the tail
//!   reducer.
//!
//! - **Bounds checking**: every vector loop is guarded by
//!   `rest.len() >= width * loads`, and pointers are only offset within that
//!   range.

#![allow(unsafe_code)]
#![allow(unsafe_op_in_unsafe_fn)]

#[cfg(feature = "sse41")]
use core::arch::x86_64::{
    __m128i, _mm_add_epi32, _mm_cmpeq_epi32, _mm_load_si128, _mm_max_epu32, _mm_setzero_si128,
    _mm_storeu_si128,
};
#[cfg(feature = "avx2")]
use core::arch::x86_64::{
    __m256i, _mm256_add_epi32, _mm256_cmpeq_epi32, _mm256_load_si256, _mm256_max_epu32,
    _mm256_setzero_si256, _mm256_storeu_si256,
};
#[cfg(feature = "adx")]
use core::arch::x86_64::_addcarryx_u64;

use super::{Kernel, unavailable};
use crate::features::Feature;

#[cfg(feature = "adx")]
use super::generic::checksum_generic;
#[cfg(feature = "adx")]
use crate::fold::combine;
#[cfg(feature = "adx")]
use crate::tail::read_u64;

#[cfg(any(feature = "sse41", feature = "avx2"))]
use crate::addc::CarryMinusOne;
#[cfg(feature = "adx")]
use crate::addc::add_end_around;
#[cfg(any(feature = "sse41", feature = "avx2"))]
use crate::align::AlignmentState;
#[cfg(any(feature = "sse41", feature = "avx2"))]
use crate::lanes::{BLOCK_LOADS, SPILL_AFTER_ADDS, fold_words, settle_masks};
#[cfg(any(feature = "sse41", feature = "avx2"))]
use crate::tail::reduce_tail;

#[cfg(feature = "adx")]
const ADX_BLOCK_LEN: usize = 64;

/// Two independent carry chains over alternating 8-byte words.
#[cfg(feature = "adx")]
pub(crate) fn checksum_adx(data: &[u8], initial: u64) -> u64 {
    if !Feature::HardwareCarry.usable() {
        unavailable(Kernel::Adx);
    }
    // SAFETY: the CPU reports ADX.
    unsafe { checksum_adx_impl(data, initial) }
}

#[cfg(feature = "adx")]
#[target_feature(enable = "adx")]
unsafe fn checksum_adx_impl(data: &[u8], initial: u64) -> u64 {
    let mut even = initial;
    let mut odd = 0u64;
    let mut blocks = data.chunks_exact(ADX_BLOCK_LEN);
    for block in &mut blocks {
        let mut c_even = 0u8;
        let mut c_odd = 0u8;
        for pair in block.chunks_exact(16) {
            let mut out = 0u64;
            c_even = _addcarryx_u64(c_even, even, read_u64(pair), &mut out);
            even = out;
            c_odd = _addcarryx_u64(c_odd, odd, read_u64(&pair[8..]), &mut out);
            odd = out;
        }
        even = add_end_around(even, u64::from(c_even));
        odd = add_end_around(odd, u64::from(c_odd));
    }
    checksum_generic(blocks.remainder(), combine(even, odd))
}

/// 4 x 32-bit lanes with `pmaxud`/`pcmpeqd` carry detection.
#[cfg(feature = "sse41")]
pub(crate) fn checksum_sse41(data: &[u8], initial: u64) -> u64 {
    if !Feature::Vector128.usable() {
        unavailable(Kernel::Sse41);
    }
    // SAFETY: the CPU reports SSE4.1.
    unsafe { checksum_sse41_impl(data, initial, SPILL_AFTER_ADDS) }
}

#[cfg(feature = "sse41")]
#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn addc_minus1_128(a: __m128i, b: __m128i) -> (__m128i, __m128i) {
    let sum = _mm_add_epi32(a, b);
    (sum, _mm_cmpeq_epi32(sum, _mm_max_epu32(sum, a)))
}

/// Tree-reduces `loads` aligned vectors at `p` into `sums`.
#[cfg(feature = "sse41")]
#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn absorb_128(p: *const __m128i, loads: usize, sums: &mut __m128i, masks: &mut __m128i) {
    let mut v = [_mm_setzero_si128(); BLOCK_LOADS];
    for (i, slot) in v.iter_mut().take(loads).enumerate() {
        *slot = _mm_load_si128(p.add(i));
    }
    let mut live = loads;
    while live > 1 {
        live /= 2;
        for i in 0..live {
            let (sum, carry) = addc_minus1_128(v[2 * i], v[2 * i + 1]);
            v[i] = sum;
            *masks = _mm_add_epi32(*masks, carry);
        }
    }
    let (sum, carry) = addc_minus1_128(*sums, v[0]);
    *sums = sum;
    *masks = _mm_add_epi32(*masks, carry);
}

#[cfg(feature = "sse41")]
#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn lanes_128(v: __m128i) -> [u32; 4] {
    let mut words = [0u32; 4];
    _mm_storeu_si128(words.as_mut_ptr().cast(), v);
    words
}

#[cfg(feature = "sse41")]
#[target_feature(enable = "sse4.1")]
unsafe fn checksum_sse41_impl(data: &[u8], initial: u64, spill_after: u32) -> u64 {
    const WIDTH: usize = 16;
    let mut align = AlignmentState::new(WIDTH);
    let (mut rest, acc) = align.peel(data, WIDTH, initial);
    if rest.as_ptr().addr() % WIDTH != 0 {
        return reduce_tail(rest, acc);
    }

    let mut sums = _mm_setzero_si128();
    let mut masks = _mm_setzero_si128();
    let mut adds = 0u32;
    let mut spilled = 0u64;

    while rest.len() >= WIDTH * BLOCK_LOADS {
        absorb_128(rest.as_ptr().cast(), BLOCK_LOADS, &mut sums, &mut masks);
        adds += BLOCK_LOADS as u32;
        if adds >= spill_after {
            spilled += settle_masks::<CarryMinusOne>(&lanes_128(masks), adds);
            masks = _mm_setzero_si128();
            adds = 0;
        }
        rest = &rest[WIDTH * BLOCK_LOADS..];
    }
    for loads in [4, 2, 1] {
        if rest.len() >= WIDTH * loads {
            absorb_128(rest.as_ptr().cast(), loads, &mut sums, &mut masks);
            adds += loads as u32;
            rest = &rest[WIDTH * loads..];
        }
    }

    spilled += settle_masks::<CarryMinusOne>(&lanes_128(masks), adds);
    let acc = add_end_around_lanes(&lanes_128(sums), acc, spilled);
    align.finish(reduce_tail(rest, acc))
}

/// 8 x 32-bit lanes, the 256-bit form of [`checksum_sse41`].
#[cfg(feature = "avx2")]
pub(crate) fn checksum_avx2(data: &[u8], initial: u64) -> u64 {
    if !Feature::Vector256.usable() {
        unavailable(Kernel::Avx2);
    }
    // SAFETY: the CPU reports AVX2.
    unsafe { checksum_avx2_impl(data, initial, SPILL_AFTER_ADDS) }
}

#[cfg(feature = "avx2")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn addc_minus1_256(a: __m256i, b: __m256i) -> (__m256i, __m256i) {
    let sum = _mm256_add_epi32(a, b);
    (sum, _mm256_cmpeq_epi32(sum, _mm256_max_epu32(sum, a)))
}

#[cfg(feature = "avx2")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn absorb_256(p: *const __m256i, loads: usize, sums: &mut __m256i, masks: &mut __m256i) {
    let mut v = [_mm256_setzero_si256(); BLOCK_LOADS];
    for (i, slot) in v.iter_mut().take(loads).enumerate() {
        *slot = _mm256_load_si256(p.add(i));
    }
    let mut live = loads;
    while live > 1 {
        live /= 2;
        for i in 0..live {
            let (sum, carry) = addc_minus1_256(v[2 * i], v[2 * i + 1]);
            v[i] = sum;
            *masks = _mm256_add_epi32(*masks, carry);
        }
    }
    let (sum, carry) = addc_minus1_256(*sums, v[0]);
    *sums = sum;
    *masks = _mm256_add_epi32(*masks, carry);
}

#[cfg(feature = "avx2")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn lanes_256(v: __m256i) -> [u32; 8] {
    let mut words = [0u32; 8];
    _mm256_storeu_si256(words.as_mut_ptr().cast(), v);
    words
}

#[cfg(feature = "avx2")]
#[target_feature(enable = "avx2")]
unsafe fn checksum_avx2_impl(data: &[u8], initial: u64, spill_after: u32) -> u64 {
    const WIDTH: usize = 32;
    let mut align = AlignmentState::new(WIDTH);
    let (mut rest, acc) = align.peel(data, WIDTH, initial);
    if rest.as_ptr().addr() % WIDTH != 0 {
        return reduce_tail(rest, acc);
    }

    let mut sums = _mm256_setzero_si256();
    let mut masks = _mm256_setzero_si256();
    let mut adds = 0u32;
    let mut spilled = 0u64;

    while rest.len() >= WIDTH * BLOCK_LOADS {
        absorb_256(rest.as_ptr().cast(), BLOCK_LOADS, &mut sums, &mut masks);
        adds += BLOCK_LOADS as u32;
        if adds >= spill_after {
            spilled += settle_masks::<CarryMinusOne>(&lanes_256(masks), adds);
            masks = _mm256_setzero_si256();
            adds = 0;
        }
        rest = &rest[WIDTH * BLOCK_LOADS..];
    }
    for loads in [4, 2, 1] {
        if rest.len() >= WIDTH * loads {
            absorb_256(rest.as_ptr().cast(), loads, &mut sums, &mut masks);
            adds += loads as u32;
            rest = &rest[WIDTH * loads..];
        }
    }

    spilled += settle_masks::<CarryMinusOne>(&lanes_256(masks), adds);
    let acc = add_end_around_lanes(&lanes_256(sums), acc, spilled);
    align.finish(reduce_tail(rest, acc))
}

#[cfg(any(feature = "sse41", feature = "avx2"))]
#[inline]
fn add_end_around_lanes(lanes: &[u32], acc: u64, carries: u64) -> u64 {
    crate::addc::add_end_around(fold_words(lanes, acc), carries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold::fold16;
    use crate::reference::reference_partial;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i as u32).wrapping_mul(0x9E37_79B9).rotate_left(7) as u8).collect()
    }

    fn check(kernel: Kernel, f: fn(&[u8], u64) -> u64) {
        if !kernel.is_available() {
            return;
        }
        let data = sample(2048 + 64);
        for offset in 0..64 {
            for len in [0, 1, 15, 16, 17, 63, 64, 65, 127, 128, 129, 511, 512, 1500, 2048] {
                let slice = &data[offset..offset + len];
                assert_eq!(
                    fold16(f(slice, 0)),
                    fold16(reference_partial(slice, 0)),
                    "{kernel} offset {offset} len {len}"
                );
            }
        }
    }

    #[cfg(feature = "adx")]
    #[test]
    fn adx_matches_reference() {
        check(Kernel::Adx, checksum_adx);
    }

    #[cfg(feature = "sse41")]
    #[test]
    fn sse41_matches_reference() {
        check(Kernel::Sse41, checksum_sse41);
    }

    #[cfg(feature = "avx2")]
    #[test]
    fn avx2_matches_reference() {
        check(Kernel::Avx2, checksum_avx2);
    }

    // Small thresholds force the mask settle path mid-buffer.
    #[cfg(any(feature = "sse41", feature = "avx2"))]
    fn check_spill(kernel: Kernel, f: unsafe fn(&[u8], u64, u32) -> u64) {
        if !kernel.is_available() {
            return;
        }
        let saturated = vec![0xFFu8; 4096 + 64];
        let mixed = sample(4096 + 64);
        for data in [&saturated, &mixed] {
            for offset in [0, 1, 7, 16, 31] {
                for spill_after in [BLOCK_LOADS as u32, 2 * BLOCK_LOADS as u32, 3] {
                    let slice = &data[offset..offset + 4096];
                    // SAFETY: `kernel` is available, so its CPU feature is present.
                    let acc = unsafe { f(slice, u64::MAX, spill_after) };
                    assert_eq!(
                        fold16(acc),
                        fold16(reference_partial(slice, u64::MAX)),
                        "{kernel} offset {offset} spill {spill_after}"
                    );
                }
            }
        }
    }

    #[cfg(feature = "sse41")]
    #[test]
    fn sse41_spill_keeps_carries() {
        check_spill(Kernel::Sse41, checksum_sse41_impl);
    }

    #[cfg(feature = "avx2")]
    #[test]
    fn avx2_spill_keeps_carries() {
        check_spill(Kernel::Avx2, checksum_avx2_impl);
    }

    #[cfg(feature = "avx2")]
    #[test]
    fn avx2_saturated_input_keeps_carries() {
        if !Kernel::Avx2.is_available() {
            return;
        }
        let data = vec![0xFFu8; 32 * 1024];
        assert_eq!(fold16(checksum_avx2(&data, u64::MAX)), 0xFFFF);
    }
}
