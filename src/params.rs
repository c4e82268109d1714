//! Per-invocation geometry for the convolution kernels.
//!
//! One parameter block describes one output row for a run of filter rows.
//! Computing it (padding counts, clipped kernel rows, strides) is the job of
//! the caller; the kernels only walk what they're given.
//!
//! Everything is counted in f32 elements, not bytes.

use bitflags::bitflags;

use crate::error::ConvError;

/// Most filter rows a single launch can tile.
pub const MAX_FILTER_COUNT: usize = 4;

bitflags! {
    /// Post-processing applied to each finished output tile.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct KernelFlags: u32 {
        /// Add to the values already in the output instead of overwriting.
        const ACCUMULATE_OUTPUT = 0x0000_0001;
        /// Add the filter row's bias vector.
        const BIAS_ADDITION = 0x0000_0002;
        /// Clamp at zero.
        const RELU_ACTIVATION = 0x0000_0004;
        /// Run the kernel's configured activation function.
        const OTHER_ACTIVATION = 0x0000_0008;
    }
}

/// Geometry of one grouped (NCHWc) or depthwise launch.
///
/// Depthwise launches always process a single filter row and ignore
/// `filter_stride` and `output_stride`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConvParams<'a> {
    /// Input position of the first kernel tap of output column 0. Includes
    /// the left padding, so it can be negative.
    pub input_offset: isize,
    /// Input advance after the last kernel column of a row.
    pub input_stride: usize,
    /// Distance between consecutive filter rows.
    pub filter_stride: usize,
    /// Distance between the outputs of consecutive filter rows.
    pub output_stride: usize,
    /// Kernel rows left after the caller dropped rows that fall entirely in
    /// padding. Zero means "post-processing only".
    pub kernel_height: usize,
    pub kernel_width: usize,
    /// Input position of the first valid (unpadded) element of the first
    /// kernel row.
    pub input_base: usize,
    /// Valid elements per input row.
    pub input_width: usize,
    /// How far the valid window moves per kernel row.
    pub dilated_input_width: usize,
    pub output_count_left_pad: usize,
    pub output_count: usize,
    pub output_count_right_pad: usize,
    /// One block of bias values per filter row.
    pub bias: Option<&'a [f32]>,
    pub flags: KernelFlags,
}

/// Geometry of one pointwise (1×1) launch.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointwiseParams<'a> {
    /// Distance between consecutive input channel blocks.
    pub input_stride: usize,
    pub filter_stride: usize,
    pub output_stride: usize,
    pub output_count: usize,
    pub bias: Option<&'a [f32]>,
    pub flags: KernelFlags,
}

/// The per-call arguments that sit next to a parameter block.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Launch {
    pub block: usize,
    pub stride_width: usize,
    pub dilation_width: usize,
    pub filter_count: usize,
    /// B×B filter block per tap (grouped, pointwise) or one vector (depthwise).
    pub blocked_filter: bool,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct BufferLens {
    pub input: usize,
    pub filter: usize,
    pub output: usize,
}

impl ConvParams<'_> {
    /// Total output columns in the row.
    pub fn output_width(&self) -> usize {
        self.output_count_left_pad + self.output_count + self.output_count_right_pad
    }

    /// Input advance from one kernel row to the next.
    pub fn row_pitch(&self, dilation_width: usize) -> usize {
        self.kernel_width * dilation_width + self.input_stride
    }

    /// Checks that a launch with these parameters only touches memory inside
    /// the given buffers.
    ///
    /// All extents are computed with checked arithmetic; anything that
    /// doesn't fit the address space is `Overflow`, never a wrapped length.
    pub(crate) fn validate(&self, launch: &Launch, lens: &BufferLens) -> Result<(), ConvError> {
        let b = launch.block;

        check_filter_count(launch.filter_count)?;
        check_post(self.flags, self.bias, launch.filter_count, b)?;
        check_aligned(
            b,
            &[
                ("stride_width", launch.stride_width),
                ("dilation_width", launch.dilation_width),
                ("input_stride", self.input_stride),
                ("filter_stride", self.filter_stride),
                ("output_stride", self.output_stride),
                ("input_base", self.input_base),
                ("input_width", self.input_width),
                ("dilated_input_width", self.dilated_input_width),
            ],
        )?;

        let from_base = to_isize("input_base", self.input_base)
            .and_then(|base| self.input_offset.checked_sub(base).ok_or(overflow("input_offset")))?;
        if from_base.rem_euclid(b as isize) != 0 {
            return Err(ConvError::Unaligned {
                field: "input_offset",
                value: from_base.unsigned_abs(),
                block: b,
            });
        }

        let width = extent(
            "output row",
            &[
                (self.output_count_left_pad, 1),
                (self.output_count, 1),
                (self.output_count_right_pad, 1),
            ],
        )?;
        if width > 0 {
            let required = extent(
                "output",
                &[(launch.filter_count - 1, self.output_stride), (width, b)],
            )?;
            check_len("output", required, lens.output)?;
        }

        let (kh, kw) = (self.kernel_height, self.kernel_width);
        if kh == 0 || kw == 0 || width == 0 {
            return Ok(());
        }

        let per_tap = if launch.blocked_filter { b * b } else { b };
        let taps = extent("filter", &[(kh, kw)])?;
        let required = extent(
            "filter",
            &[(launch.filter_count - 1, self.filter_stride), (taps, per_tap)],
        )?;
        check_len("filter", required, lens.filter)?;

        // Every cursor position of the row, padded or not, must be
        // addressable, even where the window keeps it from being read.
        let pitch = extent("input", &[(kw, launch.dilation_width), (self.input_stride, 1)])?;
        let tap_reach = extent("input", &[(kh - 1, pitch), (kw - 1, launch.dilation_width), (b, 1)])?;
        let row_reach = extent("input", &[(width - 1, launch.stride_width), (tap_reach, 1)])?;
        to_isize("input", row_reach)
            .and_then(|reach| self.input_offset.checked_add(reach).ok_or(overflow("input")))?;

        // Steady-state tiles load without bounds checks.
        if self.output_count > 0 {
            let skip = extent("input", &[(self.output_count_left_pad, launch.stride_width)])?;
            // Fits: skip <= row_reach, and input_offset + row_reach was checked.
            let first = self.input_offset + skip as isize;
            if first < 0 {
                return Err(ConvError::InputUnderflow { offset: first });
            }
            let required = extent(
                "input",
                &[
                    (first as usize, 1),
                    (self.output_count - 1, launch.stride_width),
                    (tap_reach, 1),
                ],
            )?;
            check_len("input", required, lens.input)?;
        }

        // Padded columns only load inside the valid window.
        if self.output_count_left_pad + self.output_count_right_pad > 0 {
            let required = extent(
                "input",
                &[
                    (self.input_base, 1),
                    (kh - 1, self.dilated_input_width),
                    (self.input_width, 1),
                ],
            )?;
            check_len("input", required, lens.input)?;
        }

        Ok(())
    }
}

impl PointwiseParams<'_> {
    pub(crate) fn validate(
        &self,
        launch: &Launch,
        input_channels: usize,
        lens: &BufferLens,
    ) -> Result<(), ConvError> {
        let b = launch.block;

        check_filter_count(launch.filter_count)?;
        check_post(self.flags, self.bias, launch.filter_count, b)?;
        check_aligned(
            b,
            &[
                ("stride_width", launch.stride_width),
                ("input_stride", self.input_stride),
                ("filter_stride", self.filter_stride),
                ("output_stride", self.output_stride),
            ],
        )?;

        if self.output_count == 0 {
            return Ok(());
        }

        let required = extent(
            "output",
            &[(launch.filter_count - 1, self.output_stride), (self.output_count, b)],
        )?;
        check_len("output", required, lens.output)?;

        if input_channels == 0 {
            return Ok(());
        }

        let required = extent(
            "filter",
            &[(launch.filter_count - 1, self.filter_stride), (input_channels, b * b)],
        )?;
        check_len("filter", required, lens.filter)?;

        let required = extent(
            "input",
            &[
                (input_channels - 1, self.input_stride),
                (self.output_count - 1, launch.stride_width),
                (b, 1),
            ],
        )?;
        check_len("input", required, lens.input)
    }
}

/// Sum of products, or `Overflow` naming the extent being computed.
fn extent(name: &'static str, terms: &[(usize, usize)]) -> Result<usize, ConvError> {
    terms
        .iter()
        .try_fold(0usize, |sum, &(n, step)| {
            n.checked_mul(step).and_then(|p| sum.checked_add(p))
        })
        .ok_or(overflow(name))
}

fn to_isize(name: &'static str, value: usize) -> Result<isize, ConvError> {
    isize::try_from(value).map_err(|_| overflow(name))
}

fn overflow(extent: &'static str) -> ConvError {
    ConvError::Overflow { extent }
}

fn check_filter_count(filter_count: usize) -> Result<(), ConvError> {
    if (1..=MAX_FILTER_COUNT).contains(&filter_count) {
        Ok(())
    } else {
        Err(ConvError::FilterCount(filter_count))
    }
}

fn check_post(
    flags: KernelFlags,
    bias: Option<&[f32]>,
    filter_count: usize,
    block: usize,
) -> Result<(), ConvError> {
    if flags.contains(KernelFlags::RELU_ACTIVATION | KernelFlags::OTHER_ACTIVATION) {
        return Err(ConvError::ConflictingActivations);
    }
    if flags.contains(KernelFlags::BIAS_ADDITION) {
        let bias = bias.ok_or(ConvError::MissingBias)?;
        check_len("bias", filter_count * block, bias.len())?;
    }
    Ok(())
}

fn check_aligned(block: usize, fields: &[(&'static str, usize)]) -> Result<(), ConvError> {
    match fields.iter().find(|(_, value)| value % block != 0) {
        Some(&(field, value)) => Err(ConvError::Unaligned { field, value, block }),
        None => Ok(()),
    }
}

fn check_len(buffer: &'static str, required: usize, actual: usize) -> Result<(), ConvError> {
    if required > actual {
        Err(ConvError::BufferTooSmall {
            buffer,
            required,
            actual,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch(filter_count: usize) -> Launch {
        Launch {
            block: 4,
            stride_width: 4,
            dilation_width: 4,
            filter_count,
            blocked_filter: true,
        }
    }

    // 1 block, 3×3 kernel over an 8-wide row, 6 outputs, no padding.
    fn params() -> ConvParams<'static> {
        ConvParams {
            input_stride: 8 * 4 - 3 * 4,
            filter_stride: 9 * 16,
            output_stride: 6 * 4,
            kernel_height: 3,
            kernel_width: 3,
            input_width: 8 * 4,
            dilated_input_width: 8 * 4,
            output_count: 6,
            ..Default::default()
        }
    }

    fn lens() -> BufferLens {
        BufferLens {
            input: 3 * 8 * 4,
            filter: 9 * 16,
            output: 6 * 4,
        }
    }

    #[test]
    fn test_valid_geometry_passes() {
        assert_eq!(params().validate(&launch(1), &lens()), Ok(()));
    }

    #[test]
    fn test_exact_input_extent() {
        let short = BufferLens {
            input: 3 * 8 * 4 - 1,
            ..lens()
        };
        assert_eq!(
            params().validate(&launch(1), &short),
            Err(ConvError::BufferTooSmall {
                buffer: "input",
                required: 96,
                actual: 95
            })
        );
    }

    #[test]
    fn test_filter_count_range() {
        assert_eq!(
            params().validate(&launch(0), &lens()),
            Err(ConvError::FilterCount(0))
        );
        assert_eq!(
            params().validate(&launch(5), &lens()),
            Err(ConvError::FilterCount(5))
        );
    }

    #[test]
    fn test_second_filter_row_needs_room() {
        assert!(matches!(
            params().validate(&launch(2), &lens()),
            Err(ConvError::BufferTooSmall {
                buffer: "output",
                ..
            })
        ));
    }

    #[test]
    fn test_bias_flag_without_bias() {
        let p = ConvParams {
            flags: KernelFlags::BIAS_ADDITION,
            ..params()
        };
        assert_eq!(p.validate(&launch(1), &lens()), Err(ConvError::MissingBias));
    }

    #[test]
    fn test_activations_are_exclusive() {
        let p = ConvParams {
            flags: KernelFlags::RELU_ACTIVATION | KernelFlags::OTHER_ACTIVATION,
            ..params()
        };
        assert_eq!(
            p.validate(&launch(1), &lens()),
            Err(ConvError::ConflictingActivations)
        );
    }

    #[test]
    fn test_unaligned_stride() {
        let p = ConvParams {
            input_stride: 21,
            ..params()
        };
        assert_eq!(
            p.validate(&launch(1), &lens()),
            Err(ConvError::Unaligned {
                field: "input_stride",
                value: 21,
                block: 4
            })
        );
    }

    #[test]
    fn test_left_padding_underflow() {
        // Claims no left padding but starts one block before the buffer.
        let p = ConvParams {
            input_offset: -4,
            ..params()
        };
        assert_eq!(
            p.validate(&launch(1), &lens()),
            Err(ConvError::InputUnderflow { offset: -4 })
        );
    }

    #[test]
    fn test_pointwise_extents() {
        let p = PointwiseParams {
            input_stride: 10 * 4,
            filter_stride: 2 * 16,
            output_stride: 10 * 4,
            output_count: 10,
            ..Default::default()
        };
        let lens = BufferLens {
            input: 2 * 10 * 4,
            filter: 2 * 16,
            output: 10 * 4,
        };
        assert_eq!(p.validate(&launch(1), 2, &lens), Ok(()));
        assert_eq!(
            p.validate(&launch(1), 3, &lens),
            Err(ConvError::BufferTooSmall {
                buffer: "filter",
                required: 48,
                actual: 32
            })
        );
    }

    #[test]
    fn test_output_stride_overflow() {
        let p = ConvParams {
            output_stride: usize::MAX - 3,
            ..params()
        };
        assert_eq!(
            p.validate(&launch(2), &lens()),
            Err(ConvError::Overflow { extent: "output" })
        );
    }

    #[test]
    fn test_input_reach_overflow() {
        // Every field is block aligned; only the reach across kernel rows
        // leaves the address space.
        let p = ConvParams {
            input_stride: usize::MAX / 2 - 3,
            ..params()
        };
        assert_eq!(
            p.validate(&launch(1), &lens()),
            Err(ConvError::Overflow { extent: "input" })
        );

        let p = ConvParams {
            input_stride: isize::MAX as usize / 2 + 1,
            ..params()
        };
        assert_eq!(
            p.validate(&launch(1), &lens()),
            Err(ConvError::Overflow { extent: "input" })
        );
    }

    #[test]
    fn test_input_base_past_isize() {
        let p = ConvParams {
            input_base: usize::MAX - 3,
            ..params()
        };
        assert_eq!(
            p.validate(&launch(1), &lens()),
            Err(ConvError::Overflow { extent: "input_base" })
        );
    }

    #[test]
    fn test_filter_stride_overflow() {
        let p = ConvParams {
            filter_stride: usize::MAX - 3,
            ..params()
        };
        let lens = BufferLens {
            output: 2 * 6 * 4,
            ..lens()
        };
        assert_eq!(
            p.validate(&launch(2), &lens),
            Err(ConvError::Overflow { extent: "filter" })
        );
    }

    #[test]
    fn test_pointwise_overflow() {
        let p = PointwiseParams {
            input_stride: usize::MAX - 3,
            output_count: 1,
            ..Default::default()
        };
        let lens = BufferLens {
            input: 4,
            filter: 2 * 16,
            output: 4,
        };
        assert_eq!(
            p.validate(&launch(1), 2, &lens),
            Err(ConvError::Overflow { extent: "input" })
        );

        let p = PointwiseParams {
            output_stride: usize::MAX - 3,
            output_count: 1,
            ..Default::default()
        };
        assert_eq!(
            p.validate(&launch(2), 2, &lens),
            Err(ConvError::Overflow { extent: "output" })
        );
    }
}
