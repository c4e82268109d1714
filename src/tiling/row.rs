//! Filter-count / output-count dispatcher.
//!
//! Turns a runtime filter count and a [`RowPlan`] into calls of the
//! const-generic tile code, so every tile shape gets its own fully unrolled
//! loop and nothing inside the tap loop branches on the shape.

use super::plan::{MID_TILE, NARROW_TILE, RowPlan, Step, WIDE_TILE};
use crate::kernels::{ConvKind, PostProcess, Tile, Walk, Window};
use crate::params::{ConvParams, KernelFlags, MAX_FILTER_COUNT, PointwiseParams};
use crate::simd::SimdBlock;

/// Everything one kernel launch needs, as raw cursors.
///
/// This is the parameter block after it has been bound to buffers. Nothing
/// in here outlives the launch.
#[derive(Clone, Copy, Debug)]
pub struct RowArgs {
    /// First tap of output column 0 (may point before the buffer when the
    /// row starts with left padding; never dereferenced there).
    pub input: *const f32,
    pub window: Window,
    pub filter: *const f32,
    pub output: *mut f32,
    pub bias: Option<*const f32>,
    pub walk: Walk,
    pub output_stride: usize,
    pub flags: KernelFlags,
    pub left_pad: usize,
    pub output_count: usize,
    pub right_pad: usize,
}

impl RowArgs {
    /// Binds grouped/depthwise parameters to buffers. `input` is the start
    /// of the input buffer that `params` offsets are relative to.
    pub fn spatial(
        input: *const f32,
        filter: *const f32,
        output: *mut f32,
        stride_width: usize,
        dilation_width: usize,
        params: &ConvParams<'_>,
    ) -> Self {
        RowArgs {
            input: input.wrapping_offset(params.input_offset),
            window: Window {
                base: input.wrapping_add(params.input_base),
                width: params.input_width,
                row_advance: params.dilated_input_width,
            },
            filter,
            output,
            bias: params.bias.map(<[f32]>::as_ptr),
            walk: Walk {
                rows: params.kernel_height,
                cols: params.kernel_width,
                col_step: dilation_width,
                row_step: params.input_stride,
                stride_width,
                filter_stride: params.filter_stride,
            },
            output_stride: params.output_stride,
            flags: params.flags,
            left_pad: params.output_count_left_pad,
            output_count: params.output_count,
            right_pad: params.output_count_right_pad,
        }
    }

    /// Binds pointwise parameters: the "kernel rows" are input channel
    /// blocks, one tap each.
    pub fn pointwise(
        input: *const f32,
        filter: *const f32,
        output: *mut f32,
        stride_width: usize,
        input_channels: usize,
        params: &PointwiseParams<'_>,
    ) -> Self {
        RowArgs {
            input,
            window: Window::EMPTY,
            filter,
            output,
            bias: params.bias.map(<[f32]>::as_ptr),
            walk: Walk {
                rows: input_channels,
                cols: 1,
                col_step: 0,
                row_step: params.input_stride,
                stride_width,
                filter_stride: params.filter_stride,
            },
            output_stride: params.output_stride,
            flags: params.flags,
            left_pad: 0,
            output_count: params.output_count,
            right_pad: 0,
        }
    }

    pub fn output_width(&self) -> usize {
        self.left_pad + self.output_count + self.right_pad
    }
}

/// Where the next tile starts.
#[derive(Clone, Copy, Debug)]
struct Cursor {
    input: *const f32,
    output: *mut f32,
}

impl Cursor {
    #[inline(always)]
    fn advance(self, columns: usize, stride_width: usize, lanes: usize) -> Cursor {
        Cursor {
            input: self.input.wrapping_add(columns * stride_width),
            output: self.output.wrapping_add(columns * lanes),
        }
    }
}

/// Computes one output row for `filter_count` filter rows.
///
/// # Safety
///
/// - CPU supports `V`
/// - `filter_count` in 1..=4
/// - every position reachable from `args` is valid (what
///   `ConvParams::validate` checks for the safe entry points)
#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn convolve<V: SimdBlock, K: ConvKind, P: PostProcess>(
    args: &RowArgs,
    filter_count: usize,
    post: &P,
) {
    debug_assert!((1..=MAX_FILTER_COUNT).contains(&filter_count));
    debug_assert!(K::SPATIAL || args.left_pad + args.right_pad == 0);

    match filter_count {
        4 => convolve_filters::<V, K, P, 4>(args, post),
        3 => convolve_filters::<V, K, P, 3>(args, post),
        2 => convolve_filters::<V, K, P, 2>(args, post),
        _ => convolve_filters::<V, K, P, 1>(args, post),
    }
}

#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn convolve_filters<V: SimdBlock, K: ConvKind, P: PostProcess, const F: usize>(
    args: &RowArgs,
    post: &P,
) {
    let plan = if K::SPATIAL {
        RowPlan::padded(args.left_pad, args.output_count, args.right_pad)
    } else {
        RowPlan::unpadded(args.output_count)
    };

    let mut cursor = Cursor {
        input: args.input,
        output: args.output,
    };

    for step in plan {
        cursor = match step {
            Step::Tile { columns: WIDE_TILE } => tile::<V, K, P, F, WIDE_TILE, false>(args, cursor, post),
            Step::Tile { columns: MID_TILE } => tile::<V, K, P, F, MID_TILE, false>(args, cursor, post),
            Step::Tile { columns: NARROW_TILE } => {
                tile::<V, K, P, F, NARROW_TILE, false>(args, cursor, post)
            }
            Step::Tile { columns } | Step::Single { columns, padded: false } => {
                single_columns::<V, K, P, F, false>(args, cursor, columns, post)
            }
            Step::Single { columns, padded: true } => {
                single_columns::<V, K, P, F, true>(args, cursor, columns, post)
            }
        };
    }
}

#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn single_columns<V: SimdBlock, K: ConvKind, P: PostProcess, const F: usize, const CHECKED: bool>(
    args: &RowArgs,
    mut cursor: Cursor,
    columns: usize,
    post: &P,
) -> Cursor {
    for _ in 0..columns {
        cursor = tile::<V, K, P, F, 1, CHECKED>(args, cursor, post);
    }
    cursor
}

#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn tile<V: SimdBlock, K: ConvKind, P: PostProcess, const F: usize, const O: usize, const CHECKED: bool>(
    args: &RowArgs,
    cursor: Cursor,
    post: &P,
) -> Cursor {
    let mut tile = Tile::<V, F, O>::zeroed();
    tile.accumulate::<K, CHECKED>(cursor.input, args.filter, &args.walk, &args.window);
    post.finish(&tile, cursor.output, args.output_stride, args.bias, args.flags);
    cursor.advance(O, args.walk.stride_width, V::LANES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{FusedPostProcess, Grouped, Pointwise};
    use crate::simd::Portable;

    type P4 = Portable<4>;
    const B: usize = 4;

    // Records which columns each tile wrote by marking the output.
    fn marks(left: usize, count: usize, right: usize) -> Vec<f32> {
        let width = left + count + right;
        let input = vec![0.0f32; (width + 2) * B];
        let filter = vec![0.0f32; B * B];
        let mut output = vec![-1.0f32; width * B];
        let bias = vec![1.0f32; B];

        let params = ConvParams {
            input_offset: 0,
            kernel_height: 1,
            kernel_width: 1,
            input_width: (width + 2) * B,
            output_count_left_pad: left,
            output_count: count,
            output_count_right_pad: right,
            bias: Some(&bias[..]),
            flags: KernelFlags::ACCUMULATE_OUTPUT | KernelFlags::BIAS_ADDITION,
            ..Default::default()
        };
        let args = RowArgs::spatial(input.as_ptr(), filter.as_ptr(), output.as_mut_ptr(), B, B, &params);

        unsafe { convolve::<P4, Grouped, _>(&args, 1, &FusedPostProcess::default()) };
        output
    }

    #[test]
    fn test_row_writes_every_column_once() {
        for (left, count, right) in [(0, 1, 0), (2, 13, 1), (3, 0, 4), (1, 5, 0), (0, 20, 0)] {
            let output = marks(left, count, right);
            // -1 + 1 bias: each visit adds exactly one.
            assert!(
                output.iter().all(|&v| v == 0.0),
                "{left}/{count}/{right}: {output:?}"
            );
        }
    }

    #[test]
    fn test_pointwise_filter_rows() {
        // 2 channel blocks, 7 outputs, 3 filter rows.
        let (channels, count, filters) = (2, 7, 3);
        let input: Vec<f32> = (0..channels * count * B).map(|i| (i % 7) as f32).collect();
        let filter: Vec<f32> = (0..filters * channels * B * B).map(|i| (i % 3) as f32 - 1.0).collect();
        let mut output = vec![0.0f32; filters * count * B];

        let params = PointwiseParams {
            input_stride: count * B,
            filter_stride: channels * B * B,
            output_stride: count * B,
            output_count: count,
            ..Default::default()
        };
        let args = RowArgs::pointwise(input.as_ptr(), filter.as_ptr(), output.as_mut_ptr(), B, channels, &params);
        unsafe { convolve::<P4, Pointwise, _>(&args, filters, &FusedPostProcess::default()) };

        for f in 0..filters {
            for o in 0..count {
                for j in 0..B {
                    let mut expected = 0.0;
                    for c in 0..channels {
                        for i in 0..B {
                            expected += input[c * count * B + o * B + i]
                                * filter[f * channels * B * B + c * B * B + i * B + j];
                        }
                    }
                    assert_eq!(output[f * count * B + o * B + j], expected, "f{f} o{o} j{j}");
                }
            }
        }
    }
}
