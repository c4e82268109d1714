//! Safe entry points.

use crate::backend::{self, Backend};
use crate::error::ConvError;
use crate::kernels::{ConvKind, Depthwise, FusedPostProcess, Grouped, Pointwise};
use crate::params::{BufferLens, ConvParams, Launch, PointwiseParams};
use crate::tiling::RowArgs;

/// Convolution kernels for `B`-lane channel blocks (4 or 8), bound to one
/// backend and post-processor.
///
/// Cheap to copy; build one and share it across threads. Each call computes
/// one output row and touches nothing but the buffers it's given.
///
/// ```
/// use sconv::{ConvKernel, ConvParams};
///
/// // One 4-channel block, 1×1 kernel, 3 outputs, no padding.
/// let input = vec![1.0f32; 3 * 4];
/// let mut filter = vec![0.0f32; 16];
/// for i in 0..4 {
///     filter[i * 4 + i] = 2.0; // 2 × identity
/// }
/// let mut output = vec![0.0f32; 3 * 4];
///
/// let params = ConvParams {
///     kernel_height: 1,
///     kernel_width: 1,
///     input_width: 3 * 4,
///     dilated_input_width: 3 * 4,
///     output_count: 3,
///     ..Default::default()
/// };
///
/// ConvKernel::<4>::new()
///     .nchwc(&input, &filter, &mut output, 4, 4, 1, &params)
///     .unwrap();
/// assert!(output.iter().all(|&v| v == 2.0));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ConvKernel<const B: usize> {
    backend: Backend,
    post: FusedPostProcess,
}

impl<const B: usize> ConvKernel<B> {
    const BLOCK: usize = {
        assert!(B == 4 || B == 8, "block size must be 4 or 8");
        B
    };

    /// Uses the fastest backend available on this CPU.
    pub fn new() -> Self {
        ConvKernel {
            backend: Backend::detect(Self::BLOCK),
            post: FusedPostProcess::default(),
        }
    }

    /// Forces a backend, e.g. to compare against the portable one.
    pub fn with_backend(backend: Backend) -> Result<Self, ConvError> {
        if !backend.supports(Self::BLOCK) {
            return Err(ConvError::BackendUnavailable { backend, block: B });
        }
        Ok(ConvKernel {
            backend,
            post: FusedPostProcess::default(),
        })
    }

    /// Function run over every stored block when `OTHER_ACTIVATION` is set.
    pub fn with_activation(mut self, activation: fn(f32) -> f32) -> Self {
        self.post.activation = Some(activation);
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Grouped (NCHWc) convolution of one output row for `filter_count`
    /// filter rows (1..=4).
    ///
    /// `stride_width` and `dilation_width` are in elements, i.e. already
    /// multiplied by `B`.
    #[allow(clippy::too_many_arguments)]
    pub fn nchwc(
        &self,
        input: &[f32],
        filter: &[f32],
        output: &mut [f32],
        stride_width: usize,
        dilation_width: usize,
        filter_count: usize,
        params: &ConvParams<'_>,
    ) -> Result<(), ConvError> {
        self.spatial::<Grouped>(
            input,
            filter,
            output,
            stride_width,
            dilation_width,
            filter_count,
            params,
        )
    }

    /// Depthwise convolution of one output row. Always one filter row;
    /// `params.filter_stride` and `params.output_stride` are ignored.
    pub fn depthwise(
        &self,
        input: &[f32],
        filter: &[f32],
        output: &mut [f32],
        stride_width: usize,
        dilation_width: usize,
        params: &ConvParams<'_>,
    ) -> Result<(), ConvError> {
        let params = ConvParams {
            filter_stride: 0,
            output_stride: 0,
            ..*params
        };
        self.spatial::<Depthwise>(
            input,
            filter,
            output,
            stride_width,
            dilation_width,
            1,
            &params,
        )
    }

    /// Pointwise (1×1) convolution of one output row, reducing over
    /// `input_channels` channel blocks.
    #[allow(clippy::too_many_arguments)]
    pub fn pointwise(
        &self,
        input: &[f32],
        filter: &[f32],
        output: &mut [f32],
        stride_width: usize,
        input_channels: usize,
        filter_count: usize,
        params: &PointwiseParams<'_>,
    ) -> Result<(), ConvError> {
        let launch = Launch {
            block: Self::BLOCK,
            stride_width,
            dilation_width: 0,
            filter_count,
            blocked_filter: true,
        };
        params.validate(&launch, input_channels, &lens(input, filter, output))?;

        log::trace!(
            "{}: {} filters x {} columns, {} input blocks",
            Pointwise::NAME,
            filter_count,
            params.output_count,
            input_channels
        );

        let args = RowArgs::pointwise(
            input.as_ptr(),
            filter.as_ptr(),
            output.as_mut_ptr(),
            stride_width,
            input_channels,
            params,
        );
        // SAFETY: validate() bounded every access; the backend was checked
        // against B when this kernel was built.
        unsafe { backend::launch::<Pointwise, _, B>(self.backend, &args, filter_count, &self.post) };
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn spatial<K: ConvKind>(
        &self,
        input: &[f32],
        filter: &[f32],
        output: &mut [f32],
        stride_width: usize,
        dilation_width: usize,
        filter_count: usize,
        params: &ConvParams<'_>,
    ) -> Result<(), ConvError> {
        let launch = Launch {
            block: Self::BLOCK,
            stride_width,
            dilation_width,
            filter_count,
            blocked_filter: K::BLOCKED_FILTER,
        };
        params.validate(&launch, &lens(input, filter, output))?;

        log::trace!(
            "{}: {} filters x {}+{}+{} columns, {}x{} kernel",
            K::NAME,
            filter_count,
            params.output_count_left_pad,
            params.output_count,
            params.output_count_right_pad,
            params.kernel_height,
            params.kernel_width
        );

        let args = RowArgs::spatial(
            input.as_ptr(),
            filter.as_ptr(),
            output.as_mut_ptr(),
            stride_width,
            dilation_width,
            params,
        );
        // SAFETY: as in `pointwise`.
        unsafe { backend::launch::<K, _, B>(self.backend, &args, filter_count, &self.post) };
        Ok(())
    }
}

impl<const B: usize> Default for ConvKernel<B> {
    fn default() -> Self {
        Self::new()
    }
}

fn lens(input: &[f32], filter: &[f32], output: &[f32]) -> BufferLens {
    BufferLens {
        input: input.len(),
        filter: filter.len(),
        output: output.len(),
    }
}
