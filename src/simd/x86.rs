//! x86_64 blocks: 4-lane SSE, 4-lane FMA and 8-lane AVX2.

#![allow(unsafe_op_in_unsafe_fn)]

use std::arch::x86_64::*;

use super::SimdBlock;

/// 4 × f32 in an XMM register.
///
/// SSE2 is part of the x86_64 baseline, so this needs no feature detection.
/// There's no FMA at this level: `mul_add` is a multiply then an add.
pub struct Sse;

impl SimdBlock for Sse {
    const LANES: usize = 4;

    type Reg = __m128;

    #[inline(always)]
    unsafe fn zero() -> __m128 {
        _mm_setzero_ps()
    }

    #[inline(always)]
    unsafe fn load(src: *const f32) -> __m128 {
        _mm_loadu_ps(src)
    }

    #[inline(always)]
    unsafe fn store(dst: *mut f32, v: __m128) {
        _mm_storeu_ps(dst, v)
    }

    #[inline(always)]
    unsafe fn splat(src: *const f32) -> __m128 {
        _mm_load1_ps(src)
    }

    #[inline(always)]
    unsafe fn mul_add(a: __m128, b: __m128, acc: __m128) -> __m128 {
        _mm_add_ps(_mm_mul_ps(a, b), acc)
    }

    #[inline(always)]
    unsafe fn add(a: __m128, b: __m128) -> __m128 {
        _mm_add_ps(a, b)
    }

    #[inline(always)]
    unsafe fn max(a: __m128, b: __m128) -> __m128 {
        _mm_max_ps(a, b)
    }
}

/// 4 × f32 in an XMM register, fused multiply-add.
///
/// Same register as [`Sse`] but with VEX-encoded `vfmadd`, so it has the
/// same rounding as [`Avx2`]. Only sound from code compiled with
/// `avx2,fma`; `backend::run_fma` is its entry point.
pub struct Fma;

impl SimdBlock for Fma {
    const LANES: usize = 4;

    type Reg = __m128;

    #[inline(always)]
    unsafe fn zero() -> __m128 {
        _mm_setzero_ps()
    }

    #[inline(always)]
    unsafe fn load(src: *const f32) -> __m128 {
        _mm_loadu_ps(src)
    }

    #[inline(always)]
    unsafe fn store(dst: *mut f32, v: __m128) {
        _mm_storeu_ps(dst, v)
    }

    #[inline(always)]
    unsafe fn splat(src: *const f32) -> __m128 {
        _mm_broadcast_ss(&*src)
    }

    #[inline(always)]
    unsafe fn mul_add(a: __m128, b: __m128, acc: __m128) -> __m128 {
        _mm_fmadd_ps(a, b, acc)
    }

    #[inline(always)]
    unsafe fn add(a: __m128, b: __m128) -> __m128 {
        _mm_add_ps(a, b)
    }

    #[inline(always)]
    unsafe fn max(a: __m128, b: __m128) -> __m128 {
        _mm_max_ps(a, b)
    }
}

/// 8 × f32 in a YMM register.
///
/// Only sound to use from code compiled with `avx2,fma` enabled; see
/// `backend::run_avx2`, which is the single entry point for this block.
pub struct Avx2;

impl SimdBlock for Avx2 {
    const LANES: usize = 8;

    type Reg = __m256;

    #[inline(always)]
    unsafe fn zero() -> __m256 {
        _mm256_setzero_ps()
    }

    #[inline(always)]
    unsafe fn load(src: *const f32) -> __m256 {
        _mm256_loadu_ps(src)
    }

    #[inline(always)]
    unsafe fn store(dst: *mut f32, v: __m256) {
        _mm256_storeu_ps(dst, v)
    }

    #[inline(always)]
    unsafe fn splat(src: *const f32) -> __m256 {
        _mm256_broadcast_ss(&*src)
    }

    #[inline(always)]
    unsafe fn mul_add(a: __m256, b: __m256, acc: __m256) -> __m256 {
        _mm256_fmadd_ps(a, b, acc)
    }

    #[inline(always)]
    unsafe fn add(a: __m256, b: __m256) -> __m256 {
        _mm256_add_ps(a, b)
    }

    #[inline(always)]
    unsafe fn max(a: __m256, b: __m256) -> __m256 {
        _mm256_max_ps(a, b)
    }
}
