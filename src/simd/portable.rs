//! Array-backed block, no intrinsics.
//!
//! This is what runs when nothing better is available. LLVM usually turns
//! the lane loops into whatever vector instructions the target has anyway.

#![allow(unsafe_op_in_unsafe_fn)]

use super::SimdBlock;

/// `B` lanes stored as a plain `[f32; B]`.
pub struct Portable<const B: usize>;

impl<const B: usize> SimdBlock for Portable<B> {
    const LANES: usize = B;

    type Reg = [f32; B];

    #[inline(always)]
    unsafe fn zero() -> [f32; B] {
        [0.0; B]
    }

    #[inline(always)]
    unsafe fn load(src: *const f32) -> [f32; B] {
        src.cast::<[f32; B]>().read_unaligned()
    }

    #[inline(always)]
    unsafe fn store(dst: *mut f32, v: [f32; B]) {
        dst.cast::<[f32; B]>().write_unaligned(v)
    }

    #[inline(always)]
    unsafe fn splat(src: *const f32) -> [f32; B] {
        [*src; B]
    }

    #[inline(always)]
    unsafe fn mul_add(a: [f32; B], b: [f32; B], mut acc: [f32; B]) -> [f32; B] {
        for i in 0..B {
            acc[i] += a[i] * b[i];
        }
        acc
    }

    #[inline(always)]
    unsafe fn add(mut a: [f32; B], b: [f32; B]) -> [f32; B] {
        for i in 0..B {
            a[i] += b[i];
        }
        a
    }

    #[inline(always)]
    unsafe fn max(mut a: [f32; B], b: [f32; B]) -> [f32; B] {
        for i in 0..B {
            a[i] = a[i].max(b[i]);
        }
        a
    }
}
