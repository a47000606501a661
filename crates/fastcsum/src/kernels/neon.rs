//! ARM NEON kernel.
//!
//! # Safety
//!
//! This module contains `unsafe` code for SIMD operations. Safety is ensured by:
//!
//! - **Runtime CPU feature detection**: [`checksum_neon`] checks
//!   [`Feature::usable`] before entering the `#[target_feature]` body and
//!   aborts otherwise.
//!
//! - **Memory alignment**: `vld1q_u8` has no alignment requirement, so the
//!   kernel needs no prologue.
//!
//! - **Bounds checking**: loads are issued only while
//!   `rest.len() >= BLOCK_LEN * loads`.
//!
//! NEON compares produce all-ones for "true", so `vcltq_u32(sum, a)` yields
//! the negated-carry encoding directly.

#![allow(unsafe_code)]
#![allow(unsafe_op_in_unsafe_fn)]

use core::arch::aarch64::{
    uint32x4_t, vaddq_u32, vcltq_u32, vdupq_n_u32, vld1q_u8, vreinterpretq_u32_u8, vst1q_u32,
};

use super::{Kernel, unavailable};
use crate::addc::{NegatedCarry, add_end_around};
use crate::features::Feature;
use crate::lanes::{BLOCK_LOADS, SPILL_AFTER_ADDS, fold_words, settle_masks};
use crate::tail::reduce_tail;

const BLOCK_LEN: usize = 16;

/// 4 x 32-bit lanes with negated-carry compares.
pub(crate) fn checksum_neon(data: &[u8], initial: u64) -> u64 {
    if !Feature::Vector128.usable() {
        unavailable(Kernel::Neon);
    }
    // SAFETY: the CPU reports NEON.
    unsafe { checksum_neon_impl(data, initial, SPILL_AFTER_ADDS) }
}

#[inline]
#[target_feature(enable = "neon")]
unsafe fn addc_negc_neon(a: uint32x4_t, b: uint32x4_t) -> (uint32x4_t, uint32x4_t) {
    let sum = vaddq_u32(a, b);
    (sum, vcltq_u32(sum, a))
}

#[inline]
#[target_feature(enable = "neon")]
unsafe fn absorb(bytes: &[u8], loads: usize, sums: &mut uint32x4_t, masks: &mut uint32x4_t) {
    let mut v = [vdupq_n_u32(0); BLOCK_LOADS];
    for (slot, chunk) in v.iter_mut().zip(bytes.chunks_exact(BLOCK_LEN)).take(loads) {
        *slot = vreinterpretq_u32_u8(vld1q_u8(chunk.as_ptr()));
    }
    let mut live = loads;
    while live > 1 {
        live /= 2;
        for i in 0..live {
            let (sum, carry) = addc_negc_neon(v[2 * i], v[2 * i + 1]);
            v[i] = sum;
            *masks = vaddq_u32(*masks, carry);
        }
    }
    let (sum, carry) = addc_negc_neon(*sums, v[0]);
    *sums = sum;
    *masks = vaddq_u32(*masks, carry);
}

#[inline]
#[target_feature(enable = "neon")]
unsafe fn lanes(v: uint32x4_t) -> [u32; 4] {
    let mut words = [0u32; 4];
    vst1q_u32(words.as_mut_ptr(), v);
    words
}

#[target_feature(enable = "neon")]
unsafe fn checksum_neon_impl(data: &[u8], initial: u64, spill_after: u32) -> u64 {
    let mut rest = data;
    let mut sums = vdupq_n_u32(0);
    let mut masks = vdupq_n_u32(0);
    let mut adds = 0u32;
    let mut spilled = 0u64;

    while rest.len() >= BLOCK_LEN * BLOCK_LOADS {
        absorb(rest, BLOCK_LOADS, &mut sums, &mut masks);
        adds += BLOCK_LOADS as u32;
        if adds >= spill_after {
            spilled += settle_masks::<NegatedCarry>(&lanes(masks), adds);
            masks = vdupq_n_u32(0);
            adds = 0;
        }
        rest = &rest[BLOCK_LEN * BLOCK_LOADS..];
    }
    for loads in [4, 2, 1] {
        if rest.len() >= BLOCK_LEN * loads {
            absorb(rest, loads, &mut sums, &mut masks);
            adds += loads as u32;
            rest = &rest[BLOCK_LEN * loads..];
        }
    }

    spilled += settle_masks::<NegatedCarry>(&lanes(masks), adds);
    let acc = add_end_around(fold_words(&lanes(sums), initial), spilled);
    reduce_tail(rest, acc)
}
