//! What happens to a tile after accumulation.
//!
//! The kernels only produce raw convolution sums. Bias, accumulation into
//! existing output, and activation are handed off through [`PostProcess`],
//! selected per tile by [`KernelFlags`].

use std::slice;

use super::tile::Tile;
use crate::params::KernelFlags;
use crate::simd::SimdBlock;

/// Finishes an output tile and writes it out.
pub trait PostProcess {
    /// Writes the `F × O` tile: filter row `f`, column `o` lands at
    /// `output + f * output_stride + o * V::LANES`.
    ///
    /// # Safety
    ///
    /// - CPU supports `V`
    /// - `output` is valid for reads and writes over the whole tile
    /// - with `BIAS_ADDITION`, `bias` holds `F * V::LANES` readable elements
    unsafe fn finish<V: SimdBlock, const F: usize, const O: usize>(
        &self,
        tile: &Tile<V, F, O>,
        output: *mut f32,
        output_stride: usize,
        bias: Option<*const f32>,
        flags: KernelFlags,
    );
}

/// Accumulate, bias and ReLU fused into the store.
///
/// Order per block: add existing output, add bias, clamp at zero, store.
/// `OTHER_ACTIVATION` runs `activation` over the stored block; with no
/// activation configured it's left for the caller to apply to the whole
/// output afterwards.
#[derive(Clone, Copy, Debug, Default)]
pub struct FusedPostProcess {
    pub activation: Option<fn(f32) -> f32>,
}

impl PostProcess for FusedPostProcess {
    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn finish<V: SimdBlock, const F: usize, const O: usize>(
        &self,
        tile: &Tile<V, F, O>,
        output: *mut f32,
        output_stride: usize,
        bias: Option<*const f32>,
        flags: KernelFlags,
    ) {
        let accumulate = flags.contains(KernelFlags::ACCUMULATE_OUTPUT);
        let relu = flags.contains(KernelFlags::RELU_ACTIVATION);
        let other = match self.activation {
            Some(f) if flags.contains(KernelFlags::OTHER_ACTIVATION) => Some(f),
            _ => None,
        };
        let bias = bias.filter(|_| flags.contains(KernelFlags::BIAS_ADDITION));
        debug_assert!(bias.is_some() || !flags.contains(KernelFlags::BIAS_ADDITION));

        for (f, row) in tile.accumulators().iter().enumerate() {
            let out = output.add(f * output_stride);
            let bias = bias.map(|b| V::load(b.add(f * V::LANES)));

            for (o, &acc) in row.iter().enumerate() {
                let dst = out.add(o * V::LANES);
                let mut v = acc;
                if accumulate {
                    v = V::add(v, V::load(dst));
                }
                if let Some(b) = bias {
                    v = V::add(v, b);
                }
                if relu {
                    v = V::max(v, V::zero());
                }
                V::store(dst, v);

                if let Some(activation) = other {
                    for x in slice::from_raw_parts_mut(dst, V::LANES) {
                        *x = activation(*x);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::Portable;

    type P4 = Portable<4>;

    fn finish(
        post: &FusedPostProcess,
        tile: &Tile<P4, 2, 2>,
        output: &mut [f32],
        bias: &[f32],
        flags: KernelFlags,
    ) {
        unsafe { post.finish(tile, output.as_mut_ptr(), 8, Some(bias.as_ptr()), flags) };
    }

    fn bias() -> Vec<f32> {
        vec![1.0, -2.0, 3.0, -4.0, 10.0, 20.0, 30.0, 40.0]
    }

    #[test]
    fn test_zero_tile_with_bias_broadcasts_bias() {
        let tile = unsafe { Tile::<P4, 2, 2>::zeroed() };
        let mut output = vec![99.0; 16];

        finish(
            &FusedPostProcess::default(),
            &tile,
            &mut output,
            &bias(),
            KernelFlags::BIAS_ADDITION,
        );

        // Row 0 gets bias[0..4] in both columns, row 1 gets bias[4..8].
        assert_eq!(&output[0..4], &[1.0, -2.0, 3.0, -4.0]);
        assert_eq!(&output[4..8], &[1.0, -2.0, 3.0, -4.0]);
        assert_eq!(&output[8..12], &[10.0, 20.0, 30.0, 40.0]);
        assert_eq!(&output[12..16], &[10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_accumulate_bias_relu_order() {
        let tile = unsafe { Tile::<P4, 2, 2>::zeroed() };
        let mut output: Vec<f32> = (0..16).map(|i| i as f32 - 8.0).collect();
        let before = output.clone();

        finish(
            &FusedPostProcess::default(),
            &tile,
            &mut output,
            &bias(),
            KernelFlags::ACCUMULATE_OUTPUT | KernelFlags::BIAS_ADDITION | KernelFlags::RELU_ACTIVATION,
        );

        for i in 0..16 {
            let expected = (before[i] + bias()[(i / 8) * 4 + i % 4]).max(0.0);
            assert_eq!(output[i], expected, "index {i}");
        }
    }

    #[test]
    fn test_no_flags_overwrites() {
        let tile = unsafe { Tile::<P4, 2, 2>::zeroed() };
        let mut output = vec![5.0; 16];

        finish(&FusedPostProcess::default(), &tile, &mut output, &bias(), KernelFlags::empty());

        assert!(output.iter().all(|&v| v == 0.0));
    }

    fn halve(x: f32) -> f32 {
        x * 0.5
    }

    #[test]
    fn test_other_activation() {
        let tile = unsafe { Tile::<P4, 2, 2>::zeroed() };
        let mut output = vec![0.0; 16];
        let post = FusedPostProcess {
            activation: Some(halve as fn(f32) -> f32),
        };

        finish(
            &post,
            &tile,
            &mut output,
            &bias(),
            KernelFlags::BIAS_ADDITION | KernelFlags::OTHER_ACTIVATION,
        );
        assert_eq!(&output[0..4], &[0.5, -1.0, 1.5, -2.0]);

        // Without a configured function the flag is left to the caller.
        let mut output = vec![0.0; 16];
        finish(
            &FusedPostProcess::default(),
            &tile,
            &mut output,
            &bias(),
            KernelFlags::BIAS_ADDITION | KernelFlags::OTHER_ACTIVATION,
        );
        assert_eq!(&output[0..4], &[1.0, -2.0, 3.0, -4.0]);
    }
}
