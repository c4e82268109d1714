//! Vector backends for the convolution tiles.
//!
//! A channel block (4 or 8 f32 lanes) always lives in exactly one register,
//! so the kernels only need a handful of operations: load, store, broadcast,
//! FMA, add and max. Everything else is built on top of [`SimdBlock`].
//!
//! Available backends:
//! - `Portable<B>`: plain arrays, works everywhere (baseline)
//! - `Sse`: 4 lanes, x86_64 baseline (no FMA)
//! - `Fma`: 4 lanes, AVX2 + FMA
//! - `Avx2`: 8 lanes, AVX2 + FMA
//! - `Neon`: 4 lanes, aarch64 baseline (fused)

pub mod portable;

#[cfg(target_arch = "aarch64")]
pub mod neon;
#[cfg(target_arch = "x86_64")]
pub mod x86;

pub use portable::Portable;

#[cfg(target_arch = "aarch64")]
pub use neon::Neon;
#[cfg(target_arch = "x86_64")]
pub use x86::{Avx2, Fma, Sse};

/// One channel block held in a single vector register.
///
/// Implementors are zero-sized marker types; all operations are associated
/// functions so the tile code can be written once and monomorphised per
/// backend.
///
/// # Safety
///
/// Every method may use target-specific intrinsics. Callers must make sure
/// the CPU supports the backend and that pointers are valid for `LANES`
/// f32 reads/writes (`splat` reads one element).
pub trait SimdBlock {
    /// Channels per block.
    const LANES: usize;

    type Reg: Copy;

    unsafe fn zero() -> Self::Reg;
    unsafe fn load(src: *const f32) -> Self::Reg;
    unsafe fn store(dst: *mut f32, v: Self::Reg);
    /// Broadcast one element from memory to every lane.
    unsafe fn splat(src: *const f32) -> Self::Reg;
    /// `acc + a * b`
    unsafe fn mul_add(a: Self::Reg, b: Self::Reg, acc: Self::Reg) -> Self::Reg;
    unsafe fn add(a: Self::Reg, b: Self::Reg) -> Self::Reg;
    unsafe fn max(a: Self::Reg, b: Self::Reg) -> Self::Reg;
}
