//! Benchmark runner for the convolution kernels.

use sconv::reference::{conv_depthwise_ref, conv_nchwc_ref, conv_pointwise_ref};
use sconv::{Backend, ConvKernel, ConvParams, PointwiseParams};
use std::time::Instant;

const B: usize = 8;

/// One output row of a `k × k`, stride 1, pad `k / 2` layer over `width`
/// columns, with the kernel rows fully inside the input.
struct Layer {
    name: &'static str,
    width: usize,
    k: usize,
    filters: usize,
}

impl Layer {
    fn params(&self) -> ConvParams<'static> {
        let pad = self.k / 2;
        ConvParams {
            input_offset: -((pad * B) as isize),
            input_stride: self.width * B - self.k * B,
            filter_stride: self.k * self.k * B * B,
            output_stride: self.width * B,
            kernel_height: self.k,
            kernel_width: self.k,
            input_width: self.width * B,
            dilated_input_width: self.width * B,
            output_count_left_pad: pad,
            output_count: self.width - 2 * pad,
            output_count_right_pad: pad,
            ..Default::default()
        }
    }

    fn flops(&self, per_tap: usize) -> f64 {
        2.0 * (self.filters * self.width * self.k * self.k * per_tap) as f64
    }
}

fn main() {
    println!("=== Direct Convolution Benchmark ({B}-lane blocks) ===\n");

    let detected = Backend::detect(B);
    println!("Backend: {}\n", detected.name());

    let layers = [
        Layer {
            name: "3×3 × 4 filters, 56 wide",
            width: 56,
            k: 3,
            filters: 4,
        },
        Layer {
            name: "3×3 × 1 filter, 224 wide",
            width: 224,
            k: 3,
            filters: 1,
        },
        Layer {
            name: "5×5 × 2 filters, 28 wide",
            width: 28,
            k: 5,
            filters: 2,
        },
    ];
    let iterations = 2000;

    for layer in &layers {
        println!("{}", layer.name);
        println!("{}", "-".repeat(50));

        let params = layer.params();
        let input: Vec<f32> = (0..layer.k * layer.width * B)
            .map(|i| (i % 17) as f32 * 0.1)
            .collect();
        let filter: Vec<f32> = (0..layer.filters * params.filter_stride)
            .map(|i| (i % 13) as f32 * 0.01)
            .collect();
        let mut output = vec![0.0f32; layer.filters * params.output_stride];

        let mut results = vec![(
            "Scalar reference",
            bench(iterations, layer.flops(B * B), || {
                conv_nchwc_ref::<B>(&input, &filter, &mut output, B, B, layer.filters, &params, None)
                    .is_ok()
            }),
        )];

        for (name, backend) in [("Portable", Backend::Portable), ("Detected", detected)] {
            let Ok(kernel) = ConvKernel::<B>::with_backend(backend) else {
                continue;
            };
            results.push((
                name,
                bench(iterations, layer.flops(B * B), || {
                    kernel
                        .nchwc(&input, &filter, &mut output, B, B, layer.filters, &params)
                        .is_ok()
                }),
            ));
        }

        print_results(&results);
    }

    bench_depthwise(detected, iterations);
    bench_pointwise(detected, iterations);
}

fn bench_depthwise(backend: Backend, iterations: usize) {
    println!("Depthwise 3×3, 112 wide");
    println!("{}", "-".repeat(50));

    let layer = Layer {
        name: "depthwise",
        width: 112,
        k: 3,
        filters: 1,
    };
    let params = layer.params();
    let input = vec![0.5f32; layer.k * layer.width * B];
    let filter = vec![0.25f32; layer.k * layer.k * B];
    let mut output = vec![0.0f32; layer.width * B];

    let mut results = vec![(
        "Scalar reference",
        bench(iterations, layer.flops(B), || {
            conv_depthwise_ref::<B>(&input, &filter, &mut output, B, B, &params, None).is_ok()
        }),
    )];
    if let Ok(kernel) = ConvKernel::<B>::with_backend(backend) {
        results.push((
            "Detected",
            bench(iterations, layer.flops(B), || {
                kernel.depthwise(&input, &filter, &mut output, B, B, &params).is_ok()
            }),
        ));
    }
    print_results(&results);
}

fn bench_pointwise(backend: Backend, iterations: usize) {
    println!("Pointwise, 16 input blocks × 4 filters, 56 wide");
    println!("{}", "-".repeat(50));

    let (channels, width, filters) = (16, 56, 4);
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
    let flops = 2.0 * (filters * width * channels * B * B) as f64;

    let mut results = vec![(
        "Scalar reference",
        bench(iterations, flops, || {
            conv_pointwise_ref::<B>(&input, &filter, &mut output, B, channels, filters, &params, None)
                .is_ok()
        }),
    )];
    if let Ok(kernel) = ConvKernel::<B>::with_backend(backend) {
        results.push((
            "Detected",
            bench(iterations, flops, || {
                kernel
                    .pointwise(&input, &filter, &mut output, B, channels, filters, &params)
                    .is_ok()
            }),
        ));
    }
    print_results(&results);
}

/// Times `f` and returns (µs per call, GFLOPS).
fn bench<F>(iterations: usize, flops: f64, mut f: F) -> (f64, f64)
where
    F: FnMut() -> bool,
{
    // Warmup
    assert!(f(), "benchmark geometry rejected");

    let start = Instant::now();
    for _ in 0..iterations {
        f();
    }
    let avg = start.elapsed().as_secs_f64() / iterations as f64;

    (avg * 1e6, flops / avg / 1e9)
}

fn print_results(results: &[(&str, (f64, f64))]) {
    let baseline_time = results[0].1.0;
    for (i, (name, (time_us, gflops))) in results.iter().enumerate() {
        println!(
            "{}. {:16} {:8.2} µs  {:6.2} GFLOPS  ({:.1}×)",
            i + 1,
            name,
            time_us,
            gflops,
            baseline_time / time_us
        );
    }
    println!();
}
