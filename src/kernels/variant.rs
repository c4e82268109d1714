//! Kernel shapes that share the tiling skeleton.
//!
//! The three variants differ in only two ways, so they're described by two
//! flags instead of three copies of the ladder:
//!
//! | variant   | filter per tap     | walk                          |
//! |-----------|--------------------|-------------------------------|
//! | Grouped   | B×B block          | kernel rows × columns, padded |
//! | Depthwise | one B-vector       | kernel rows × columns, padded |
//! | Pointwise | B×B block          | input channel blocks          |

/// Capability descriptor for a kernel shape.
pub trait ConvKind {
    const NAME: &'static str;

    /// Each tap holds a B×B block (input lane × output lane). Otherwise each
    /// tap is one vector multiplied lane-wise with the input block.
    const BLOCKED_FILTER: bool;

    /// Walks a spatial window, which means the row can have padded columns.
    /// Non-spatial kernels reduce over input channel blocks and never pad.
    const SPATIAL: bool;

    /// Filter elements consumed per tap.
    #[inline(always)]
    fn filter_step(lanes: usize) -> usize {
        if Self::BLOCKED_FILTER { lanes * lanes } else { lanes }
    }
}

/// Standard channel-blocked convolution (NCHWc).
pub struct Grouped;

/// One filter vector per output channel block, no cross-channel reduction.
pub struct Depthwise;

/// 1×1 convolution: a reduction over input channel blocks.
pub struct Pointwise;

impl ConvKind for Grouped {
    const NAME: &'static str = "nchwc";
    const BLOCKED_FILTER: bool = true;
    const SPATIAL: bool = true;
}

impl ConvKind for Depthwise {
    const NAME: &'static str = "depthwise";
    const BLOCKED_FILTER: bool = false;
    const SPATIAL: bool = true;
}

impl ConvKind for Pointwise {
    const NAME: &'static str = "pointwise";
    const BLOCKED_FILTER: bool = true;
    const SPATIAL: bool = false;
}
