//! Direct f32 convolution kernels in Rust, built from scratch.
//!
//! I built this to understand how the inner loop of a CPU convolution gets
//! fast without going through im2col + GEMM. Turns out it's: a channel-blocked
//! layout so one block fills one register, a tile of accumulators that reuses
//! every load as often as possible, and a separate slow path for the padded
//! edges so the hot loop never has to check bounds.
//!
//! ## Usage
//!
//! The kernels compute one output row per call. The caller works out the
//! geometry (padding, clipped kernel rows, strides) and passes it in a
//! [`ConvParams`]. All distances are in f32 elements.
//!
//! ```
//! use sconv::{ConvParams, KernelFlags, conv_nchwc};
//!
//! // 4-channel blocks, 1×3 kernel over an 8-wide row, one padded column on
//! // each side.
//! const B: usize = 4;
//! let input = vec![1.0f32; 8 * B];
//! let filter = vec![0.25f32; 3 * B * B];
//! let bias = vec![0.5f32; B];
//! let mut output = vec![0.0f32; 8 * B];
//!
//! let params = ConvParams {
//!     input_offset: -(B as isize),
//!     kernel_height: 1,
//!     kernel_width: 3,
//!     input_width: 8 * B,
//!     dilated_input_width: 8 * B,
//!     output_count_left_pad: 1,
//!     output_count: 6,
//!     output_count_right_pad: 1,
//!     bias: Some(&bias[..]),
//!     flags: KernelFlags::BIAS_ADDITION,
//!     ..Default::default()
//! };
//!
//! conv_nchwc::<B>(&input, &filter, &mut output, B, B, 1, &params).unwrap();
//!
//! // Edges only see two of the three taps.
//! assert_eq!(output[0], 2.0 * 4.0 * 0.25 + 0.5);
//! assert_eq!(output[4 * B], 3.0 * 4.0 * 0.25 + 0.5);
//! ```
//!
//! The `conv_*` functions look the backend up on every call (the CPU feature
//! check itself runs once). In hot loops build a [`ConvKernel`] once and reuse
//! it; it also lets you force a backend or plug in an activation function.
//!
//! ## What's inside
//!
//! - Grouped (NCHWc), depthwise and pointwise kernels on one tiling skeleton
//! - 1–4 filter rows × 6/3/2/1 output columns per register tile
//! - AVX2+FMA (8 lanes), FMA, SSE and NEON (4 lanes), portable fallback
//! - Bias, accumulate, ReLU and custom activation fused into the store

pub mod backend;
pub mod conv;
pub mod error;
pub mod kernels;
pub mod params;
pub mod reference;
pub mod simd;
pub mod tiling;

pub use backend::Backend;
pub use conv::ConvKernel;
pub use error::ConvError;
pub use params::{ConvParams, KernelFlags, MAX_FILTER_COUNT, PointwiseParams};

/// Grouped convolution of one output row on the fastest backend for your CPU.
///
/// See [`ConvKernel::nchwc`].
#[allow(clippy::too_many_arguments)]
pub fn conv_nchwc<const B: usize>(
    input: &[f32],
    filter: &[f32],
    output: &mut [f32],
    stride_width: usize,
    dilation_width: usize,
    filter_count: usize,
    params: &ConvParams<'_>,
) -> Result<(), ConvError> {
    ConvKernel::<B>::new().nchwc(
        input,
        filter,
        output,
        stride_width,
        dilation_width,
        filter_count,
        params,
    )
}

/// Depthwise convolution of one output row. See [`ConvKernel::depthwise`].
pub fn conv_depthwise<const B: usize>(
    input: &[f32],
    filter: &[f32],
    output: &mut [f32],
    stride_width: usize,
    dilation_width: usize,
    params: &ConvParams<'_>,
) -> Result<(), ConvError> {
    ConvKernel::<B>::new().depthwise(input, filter, output, stride_width, dilation_width, params)
}

/// Pointwise convolution of one output row. See [`ConvKernel::pointwise`].
#[allow(clippy::too_many_arguments)]
pub fn conv_pointwise<const B: usize>(
    input: &[f32],
    filter: &[f32],
    output: &mut [f32],
    stride_width: usize,
    input_channels: usize,
    filter_count: usize,
    params: &PointwiseParams<'_>,
) -> Result<(), ConvError> {
    ConvKernel::<B>::new().pointwise(
        input,
        filter,
        output,
        stride_width,
        input_channels,
        filter_count,
        params,
    )
}
