//! Register-tile kernels for direct convolution.
//!
//! A tile is F filter rows × O output columns of accumulators, each one SIMD
//! register holding a channel block. Every input broadcast is reused by all
//! F filter rows and every filter load by all O columns, which is where the
//! throughput comes from.
//!
//! - `tile`: the accumulators and the tap loop (including the bounds-checked
//!   single-column walk used for padding)
//! - `variant`: grouped / depthwise / pointwise capability descriptors
//! - `postprocess`: bias, accumulate and activation on the way out

pub mod postprocess;
pub mod tile;
pub mod variant;

pub use postprocess::{FusedPostProcess, PostProcess};
pub use tile::{Tile, Walk, Window};
pub use variant::{ConvKind, Depthwise, Grouped, Pointwise};
