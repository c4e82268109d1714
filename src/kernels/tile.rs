//! F×O output tile: the register block every kernel variant accumulates into.

use std::mem::size_of;
use std::ptr;

use super::variant::ConvKind;
use crate::simd::SimdBlock;

/// How the input and filter cursors move while a tile is accumulated.
#[derive(Clone, Copy, Debug)]
pub struct Walk {
    /// Kernel rows, or input channel blocks for pointwise.
    pub rows: usize,
    /// Kernel columns (1 for pointwise).
    pub cols: usize,
    /// Input advance between kernel columns (the blocked dilation width).
    pub col_step: usize,
    /// Input advance after the last column of a row.
    pub row_step: usize,
    /// Input distance between neighbouring output columns.
    pub stride_width: usize,
    /// Distance between filter rows.
    pub filter_stride: usize,
}

/// Valid part of the input row, consulted only by the single-column path.
#[derive(Clone, Copy, Debug)]
pub struct Window {
    /// First valid element of the first kernel row.
    pub base: *const f32,
    /// Valid elements per row.
    pub width: usize,
    /// How far `base` moves per kernel row.
    pub row_advance: usize,
}

impl Window {
    /// For kernels that never pad.
    pub const EMPTY: Window = Window {
        base: ptr::null(),
        width: 0,
        row_advance: 0,
    };

    /// `at - base` in `[0, width)`. Positions left of `base` wrap around to
    /// huge values, so one unsigned compare covers both edges.
    #[inline(always)]
    fn admits(&self, base: *const f32, at: *const f32) -> bool {
        (at as usize).wrapping_sub(base as usize) < self.width * size_of::<f32>()
    }
}

/// `F` filter rows × `O` output columns of accumulators, one register each.
pub struct Tile<V: SimdBlock, const F: usize, const O: usize> {
    acc: [[V::Reg; O]; F],
}

impl<V: SimdBlock, const F: usize, const O: usize> Tile<V, F, O> {
    /// # Safety
    ///
    /// The CPU must support `V`.
    #[inline(always)]
    pub unsafe fn zeroed() -> Self {
        Tile {
            acc: [[unsafe { V::zero() }; O]; F],
        }
    }

    pub fn accumulators(&self) -> &[[V::Reg; O]; F] {
        &self.acc
    }

    /// Runs the whole `walk` for this tile's output columns.
    ///
    /// With `CHECKED` every tap is tested against `window` first and skipped
    /// when it falls in padding; cursors advance either way. Only `O == 1`
    /// tiles are launched checked.
    ///
    /// # Safety
    ///
    /// - CPU supports `V`
    /// - `input` is the position of the first tap of the first column; every
    ///   tap the walk reaches (and `window` admits, when `CHECKED`) must be
    ///   readable for `V::LANES` elements at each `o * stride_width` offset
    /// - `filter` is readable for `walk.rows * walk.cols` taps on each of the
    ///   `F` rows, `filter_stride` apart
    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    pub unsafe fn accumulate<K: ConvKind, const CHECKED: bool>(
        &mut self,
        input: *const f32,
        filter: *const f32,
        walk: &Walk,
        window: &Window,
    ) {
        debug_assert!(!CHECKED || O == 1);

        let filter_step = K::filter_step(V::LANES);
        let mut input = input;
        let mut filter = filter;
        let mut base = window.base;

        for _ in 0..walk.rows {
            for _ in 0..walk.cols {
                if !CHECKED || window.admits(base, input) {
                    self.tap::<K>(input, filter, walk);
                }
                input = input.wrapping_add(walk.col_step);
                filter = filter.wrapping_add(filter_step);
            }
            input = input.wrapping_add(walk.row_step);
            if CHECKED {
                base = base.wrapping_add(window.row_advance);
            }
        }
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn tap<K: ConvKind>(&mut self, input: *const f32, filter: *const f32, walk: &Walk) {
        if K::BLOCKED_FILTER {
            // One broadcast per (column, input lane), shared by all F filter rows.
            for i in 0..V::LANES {
                let mut x = [V::zero(); O];
                for (o, slot) in x.iter_mut().enumerate() {
                    *slot = V::splat(input.add(o * walk.stride_width + i));
                }
                for (f, row) in self.acc.iter_mut().enumerate() {
                    let w = V::load(filter.add(f * walk.filter_stride + i * V::LANES));
                    for (acc, &x) in row.iter_mut().zip(&x) {
                        *acc = V::mul_add(x, w, *acc);
                    }
                }
            }
        } else {
            for (f, row) in self.acc.iter_mut().enumerate() {
                let w = V::load(filter.add(f * walk.filter_stride));
                for (o, acc) in row.iter_mut().enumerate() {
                    *acc = V::mul_add(V::load(input.add(o * walk.stride_width)), w, *acc);
                }
            }
        }
    }
}
