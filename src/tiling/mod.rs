//! Output-row tiling.
//!
//! These functions decide which tile shape covers which output columns and
//! then run the kernels from `crate::kernels` over them.
//!
//! - `plan`: the 6/3/2/1 ladder as a step iterator
//! - `row`: filter-count and output-count dispatch over a planned row

pub mod plan;
pub mod row;

pub use plan::{MID_TILE, NARROW_TILE, RowPlan, Step, WIDE_TILE};
pub use row::{RowArgs, convolve};
