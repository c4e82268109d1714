//! Criterion benchmarks: one output row per iteration, kernels vs the scalar
//! reference, across filter counts and row widths.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;

use sconv::reference::conv_nchwc_ref;
use sconv::{Backend, ConvKernel, ConvParams, KernelFlags, PointwiseParams};

const B: usize = 8;
const K: usize = 3;
const WIDTHS: &[usize] = &[14, 56, 224];

/// 3×3, stride 1, pad 1 row over `width` columns.
fn row_params(width: usize, bias: &[f32]) -> ConvParams<'_> {
    ConvParams {
        input_offset: -(B as isize),
        input_stride: width * B - K * B,
        filter_stride: K * K * B * B,
        output_stride: width * B,
        kernel_height: K,
        kernel_width: K,
        input_width: width * B,
        dilated_input_width: width * B,
        output_count_left_pad: 1,
        output_count: width - 2,
        output_count_right_pad: 1,
        bias: Some(bias),
        flags: KernelFlags::BIAS_ADDITION | KernelFlags::RELU_ACTIVATION,
    }
}

fn bench_nchwc(c: &mut Criterion) {
    let mut group = c.benchmark_group("nchwc");
    group.warm_up_time(Duration::from_millis(500));

    let kernel = ConvKernel::<B>::new();
    let bias = vec![0.1f32; 4 * B];

    for &width in WIDTHS {
        let input: Vec<f32> = (0..K * width * B).map(|i| (i % 17) as f32 * 0.1).collect();
        let filter: Vec<f32> = (0..4 * K * K * B * B).map(|i| (i % 13) as f32 * 0.01).collect();
        let mut output = vec![0.0f32; 4 * width * B];
        let params = row_params(width, &bias);

        for filters in [1, 4] {
            group.throughput(Throughput::Elements((2 * filters * width * K * K * B * B) as u64));

            group.bench_with_input(
                BenchmarkId::new(format!("{}/f{filters}", kernel.backend().name()), width),
                &width,
                |b, _| {
                    b.iter(|| {
                        kernel
                            .nchwc(black_box(&input), &filter, &mut output, B, B, filters, &params)
                            .is_ok()
                    })
                },
            );

            if width <= 56 {
                group.bench_with_input(BenchmarkId::new(format!("reference/f{filters}"), width), &width, |b, _| {
                    b.iter(|| {
                        conv_nchwc_ref::<B>(black_box(&input), &filter, &mut output, B, B, filters, &params, None)
                            .is_ok()
                    })
                });
            }
        }
    }

    group.finish();
}

fn bench_depthwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("depthwise");

    let bias = vec![0.1f32; B];
    for backend in [Backend::Portable, Backend::detect(B)] {
        let kernel = match ConvKernel::<B>::with_backend(backend) {
            Ok(kernel) => kernel,
            Err(_) => continue,
        };

        for &width in WIDTHS {
            let input = vec![0.5f32; K * width * B];
            let filter = vec![0.25f32; K * K * B];
            let mut output = vec![0.0f32; width * B];
            let params = row_params(width, &bias);

            group.throughput(Throughput::Elements((2 * width * K * K * B) as u64));
            group.bench_with_input(BenchmarkId::new(backend.name(), width), &width, |b, _| {
                b.iter(|| kernel.depthwise(black_box(&input), &filter, &mut output, B, B, &params).is_ok())
            });
        }
    }

    group.finish();
}

fn bench_pointwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("pointwise");

    let kernel = ConvKernel::<B>::new();
    let (width, filters) = (56, 4);

    for channels in [4, 16, 64] {
        let params = PointwiseParams {
            input_stride: width * B,
            filter_stride: channels * B * B,
            output_stride: width * B,
            output_count: width,
            ..Default::default()
        };
        let input = vec![0.5f32; channels * width * B];
        let filter = vec![0.25f32; filters * channels * B * B];
        let mut output = vec![0.0f32; filters * width * B];

        group.throughput(Throughput::Elements((2 * filters * width * channels * B * B) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(channels), &channels, |b, &channels| {
            b.iter(|| {
                kernel
                    .pointwise(black_box(&input), &filter, &mut output, B, channels, filters, &params)
                    .is_ok()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_nchwc, bench_depthwise, bench_pointwise);
criterion_main!(benches);
