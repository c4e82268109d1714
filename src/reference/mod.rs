//! Scalar reference convolutions.
//!
//! Straight loops over the same parameter blocks the SIMD kernels take. They
//! are slow and meant as correctness baselines, not for inference.
//!
//! The summation order matches the tiled kernels tap for tap, so on the
//! unfused backends (portable, SSE) the results are bit-identical.

pub mod direct;

pub use direct::{conv_depthwise_ref, conv_nchwc_ref, conv_pointwise_ref, post_process_ref};
