//! aarch64 NEON block.

#![allow(unsafe_op_in_unsafe_fn)]

use std::arch::aarch64::*;

use super::SimdBlock;

/// 4 × f32 in a Q register. NEON is always present on aarch64.
pub struct Neon;

impl SimdBlock for Neon {
    const LANES: usize = 4;

    type Reg = float32x4_t;

    #[inline(always)]
    unsafe fn zero() -> float32x4_t {
        vdupq_n_f32(0.0)
    }

    #[inline(always)]
    unsafe fn load(src: *const f32) -> float32x4_t {
        vld1q_f32(src)
    }

    #[inline(always)]
    unsafe fn store(dst: *mut f32, v: float32x4_t) {
        vst1q_f32(dst, v)
    }

    #[inline(always)]
    unsafe fn splat(src: *const f32) -> float32x4_t {
        vld1q_dup_f32(src)
    }

    #[inline(always)]
    unsafe fn mul_add(a: float32x4_t, b: float32x4_t, acc: float32x4_t) -> float32x4_t {
        vfmaq_f32(acc, a, b)
    }

    #[inline(always)]
    unsafe fn add(a: float32x4_t, b: float32x4_t) -> float32x4_t {
        vaddq_f32(a, b)
    }

    #[inline(always)]
    unsafe fn max(a: float32x4_t, b: float32x4_t) -> float32x4_t {
        vmaxq_f32(a, b)
    }
}
