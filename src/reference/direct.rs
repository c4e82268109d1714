use crate::error::ConvError;
use crate::params::{BufferLens, ConvParams, KernelFlags, Launch, PointwiseParams};

/// Scalar grouped (NCHWc) convolution of one output row.
///
/// Takes exactly what [`ConvKernel::nchwc`](crate::ConvKernel::nchwc) takes,
/// plus the function used for `OTHER_ACTIVATION`. Padded columns check every
/// tap against the valid window; steady columns read unchecked, same as the
/// kernels.
#[allow(clippy::too_many_arguments)]
pub fn conv_nchwc_ref<const B: usize>(
    input: &[f32],
    filter: &[f32],
    output: &mut [f32],
    stride_width: usize,
    dilation_width: usize,
    filter_count: usize,
    params: &ConvParams<'_>,
    activation: Option<fn(f32) -> f32>,
) -> Result<(), ConvError> {
    let launch = Launch {
        block: B,
        stride_width,
        dilation_width,
        filter_count,
        blocked_filter: true,
    };
    params.validate(&launch, &lens(input, filter, output))?;
    spatial::<B>(input, filter, output, &launch, params, activation);
    Ok(())
}

/// Scalar depthwise convolution of one output row.
pub fn conv_depthwise_ref<const B: usize>(
    input: &[f32],
    filter: &[f32],
    output: &mut [f32],
    stride_width: usize,
    dilation_width: usize,
    params: &ConvParams<'_>,
    activation: Option<fn(f32) -> f32>,
) -> Result<(), ConvError> {
    let params = ConvParams {
        filter_stride: 0,
        output_stride: 0,
        ..*params
    };
    let launch = Launch {
        block: B,
        stride_width,
        dilation_width,
        filter_count: 1,
        blocked_filter: false,
    };
    params.validate(&launch, &lens(input, filter, output))?;
    spatial::<B>(input, filter, output, &launch, &params, activation);
    Ok(())
}

/// Scalar pointwise convolution of one output row.
#[allow(clippy::too_many_arguments)]
pub fn conv_pointwise_ref<const B: usize>(
    input: &[f32],
    filter: &[f32],
    output: &mut [f32],
    stride_width: usize,
    input_channels: usize,
    filter_count: usize,
    params: &PointwiseParams<'_>,
    activation: Option<fn(f32) -> f32>,
) -> Result<(), ConvError> {
    let launch = Launch {
        block: B,
        stride_width,
        dilation_width: 0,
        filter_count,
        blocked_filter: true,
    };
    params.validate(&launch, input_channels, &lens(input, filter, output))?;

    for f in 0..filter_count {
        for o in 0..params.output_count {
            let mut acc = [0.0f32; B];
            for c in 0..input_channels {
                let at = o * stride_width + c * params.input_stride;
                let w = f * params.filter_stride + c * B * B;
                for i in 0..B {
                    let x = input[at + i];
                    for (j, acc) in acc.iter_mut().enumerate() {
                        *acc += x * filter[w + i * B + j];
                    }
                }
            }

            let out = f * params.output_stride + o * B;
            post_process_ref(
                &mut output[out..out + B],
                &acc,
                bias_block::<B>(params.bias, params.flags, f),
                params.flags,
                activation,
            );
        }
    }
    Ok(())
}

/// Applies the flags to one finished block, in kernel order: accumulate,
/// bias, ReLU, store, then `activation` if `OTHER_ACTIVATION` is set.
pub fn post_process_ref(
    out: &mut [f32],
    acc: &[f32],
    bias: Option<&[f32]>,
    flags: KernelFlags,
    activation: Option<fn(f32) -> f32>,
) {
    let other = activation.filter(|_| flags.contains(KernelFlags::OTHER_ACTIVATION));

    for (j, out) in out.iter_mut().enumerate() {
        let mut v = acc[j];
        if flags.contains(KernelFlags::ACCUMULATE_OUTPUT) {
            v += *out;
        }
        if let Some(bias) = bias {
            v += bias[j];
        }
        if flags.contains(KernelFlags::RELU_ACTIVATION) {
            v = v.max(0.0);
        }
        *out = match other {
            Some(activation) => activation(v),
            None => v,
        };
    }
}

fn spatial<const B: usize>(
    input: &[f32],
    filter: &[f32],
    output: &mut [f32],
    launch: &Launch,
    params: &ConvParams<'_>,
    activation: Option<fn(f32) -> f32>,
) {
    let (kh, kw) = (params.kernel_height, params.kernel_width);
    let pitch = params.row_pitch(launch.dilation_width);
    let per_tap = if launch.blocked_filter { B * B } else { B };
    let steady = params.output_count_left_pad..params.output_count_left_pad + params.output_count;

    for f in 0..launch.filter_count {
        for o in 0..params.output_width() {
            let padded = !steady.contains(&o);
            let first = params.input_offset + (o * launch.stride_width) as isize;
            let mut acc = [0.0f32; B];

            for r in 0..kh {
                let base = (params.input_base + r * params.dilated_input_width) as isize;
                for c in 0..kw {
                    let at = first + (r * pitch + c * launch.dilation_width) as isize;
                    if padded && !(base..base + params.input_width as isize).contains(&at) {
                        continue;
                    }
                    let at = at as usize;
                    let w = f * params.filter_stride + (r * kw + c) * per_tap;

                    if launch.blocked_filter {
                        for i in 0..B {
                            let x = input[at + i];
                            for (j, acc) in acc.iter_mut().enumerate() {
                                *acc += x * filter[w + i * B + j];
                            }
                        }
                    } else {
                        for (j, acc) in acc.iter_mut().enumerate() {
                            *acc += input[at + j] * filter[w + j];
                        }
                    }
                }
            }

            let out = f * params.output_stride + o * B;
            post_process_ref(
                &mut output[out..out + B],
                &acc,
                bias_block::<B>(params.bias, params.flags, f),
                params.flags,
                activation,
            );
        }
    }
}

fn bias_block<const B: usize>(bias: Option<&[f32]>, flags: KernelFlags, f: usize) -> Option<&[f32]> {
    bias.filter(|_| flags.contains(KernelFlags::BIAS_ADDITION))
        .map(|b| &b[f * B..(f + 1) * B])
}

fn lens(input: &[f32], filter: &[f32], output: &[f32]) -> BufferLens {
    BufferLens {
        input: input.len(),
        filter: filter.len(),
        output: output.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_process_order() {
        let mut out = [1.0, -5.0, 2.0, 0.0];
        let acc = [1.0, 1.0, -10.0, 0.5];
        let bias = [0.5, 0.5, 0.5, 0.5];

        post_process_ref(
            &mut out,
            &acc,
            Some(&bias[..]),
            KernelFlags::ACCUMULATE_OUTPUT | KernelFlags::BIAS_ADDITION | KernelFlags::RELU_ACTIVATION,
            None,
        );
        assert_eq!(out, [2.5, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_activation_needs_flag() {
        fn negate(x: f32) -> f32 {
            -x
        }
        let mut out = [0.0; 4];
        post_process_ref(&mut out, &[1.0; 4], None, KernelFlags::empty(), Some(negate as fn(f32) -> f32));
        assert_eq!(out, [1.0; 4]);

        post_process_ref(
            &mut out,
            &[1.0; 4],
            None,
            KernelFlags::OTHER_ACTIVATION,
            Some(negate as fn(f32) -> f32),
        );
        assert_eq!(out, [-1.0; 4]);
    }

    // 1 block, one-tap kernel on a 4-wide row with one padded column each side.
    #[test]
    fn test_padded_columns_read_only_window() {
        let input: Vec<f32> = (0..4 * 4).map(|i| i as f32).collect();
        let mut filter = vec![0.0; 3 * 16];
        for tap in 0..3 {
            for i in 0..4 {
                filter[tap * 16 + i * 4 + i] = 1.0;
            }
        }
        let mut output = vec![0.0; 4 * 4];

        // 1×3 kernel, output o reads input columns o-1, o, o+1.
        let params = ConvParams {
            input_offset: -4,
            kernel_height: 1,
            kernel_width: 3,
            input_width: 16,
            dilated_input_width: 16,
            output_count_left_pad: 1,
            output_count: 2,
            output_count_right_pad: 1,
            ..Default::default()
        };
        conv_nchwc_ref::<4>(&input, &filter, &mut output, 4, 4, 1, &params, None).unwrap();

        for o in 0..4usize {
            for j in 0..4 {
                let expected: f32 = (o.saturating_sub(1)..(o + 2).min(4))
                    .map(|x| input[x * 4 + j])
                    .sum();
                assert_eq!(output[o * 4 + j], expected, "o{o} j{j}");
            }
        }
    }
}
