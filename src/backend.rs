//! Which vector unit runs the kernels.

use std::sync::OnceLock;

use crate::kernels::{ConvKind, PostProcess};
use crate::simd::Portable;
use crate::tiling::{RowArgs, convolve};

#[cfg(target_arch = "aarch64")]
use crate::simd::Neon;
#[cfg(target_arch = "x86_64")]
use crate::simd::{Avx2, Fma, Sse};

/// A SIMD backend for one block size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    /// 8 lanes, AVX2 + FMA (x86_64, detected at runtime).
    Avx2,
    /// 4 lanes, AVX2 + FMA (x86_64, detected at runtime).
    Fma,
    /// 4 lanes, SSE2 (x86_64).
    Sse,
    /// 4 lanes, NEON (aarch64).
    Neon,
    /// Plain arrays, any block size, any target.
    Portable,
}

impl Backend {
    /// Fastest backend this CPU has for `block` lanes.
    ///
    /// AVX2 / FMA > SSE / NEON > portable. Detected once per block size, later
    /// calls return the cached answer.
    pub fn detect(block: usize) -> Backend {
        static DETECTED: [OnceLock<Backend>; 2] = [OnceLock::new(), OnceLock::new()];

        let slot = match block {
            4 => &DETECTED[0],
            8 => &DETECTED[1],
            _ => return Backend::Portable,
        };
        *slot.get_or_init(|| {
            let backend = [Backend::Avx2, Backend::Fma, Backend::Sse, Backend::Neon]
                .into_iter()
                .find(|b| b.supports(block))
                .unwrap_or(Backend::Portable);
            log::debug!("sconv: {}-lane kernels on {}", block, backend.name());
            backend
        })
    }

    /// Whether this backend can run `block`-lane kernels on this CPU.
    pub fn supports(self, block: usize) -> bool {
        match self {
            Backend::Avx2 => block == 8 && avx2_fma_available(),
            Backend::Fma => block == 4 && avx2_fma_available(),
            Backend::Sse => block == 4 && cfg!(target_arch = "x86_64"),
            Backend::Neon => block == 4 && cfg!(target_arch = "aarch64"),
            Backend::Portable => block == 4 || block == 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Backend::Avx2 => "avx2",
            Backend::Fma => "fma",
            Backend::Sse => "sse",
            Backend::Neon => "neon",
            Backend::Portable => "portable",
        }
    }
}

#[cfg(target_arch = "x86_64")]
fn avx2_fma_available() -> bool {
    is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
}

#[cfg(not(target_arch = "x86_64"))]
fn avx2_fma_available() -> bool {
    false
}

/// Runs one row on `backend`.
///
/// # Safety
///
/// - `backend.supports(B)` must hold
/// - `args` must satisfy the contract of [`convolve`]
#[allow(unsafe_op_in_unsafe_fn)]
pub(crate) unsafe fn launch<K: ConvKind, P: PostProcess, const B: usize>(
    backend: Backend,
    args: &RowArgs,
    filter_count: usize,
    post: &P,
) {
    debug_assert!(backend.supports(B));

    match backend {
        #[cfg(target_arch = "x86_64")]
        Backend::Avx2 => run_avx2::<K, P>(args, filter_count, post),
        #[cfg(target_arch = "x86_64")]
        Backend::Fma => run_fma::<K, P>(args, filter_count, post),
        #[cfg(target_arch = "x86_64")]
        Backend::Sse => run_sse::<K, P>(args, filter_count, post),
        #[cfg(target_arch = "aarch64")]
        Backend::Neon => run_neon::<K, P>(args, filter_count, post),
        _ => run_portable::<K, P, B>(args, filter_count, post),
    }
}

/// Everything below is inlined into here and compiled with AVX2 + FMA.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn run_avx2<K: ConvKind, P: PostProcess>(args: &RowArgs, filter_count: usize, post: &P) {
    convolve::<Avx2, K, P>(args, filter_count, post)
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn run_fma<K: ConvKind, P: PostProcess>(args: &RowArgs, filter_count: usize, post: &P) {
    convolve::<Fma, K, P>(args, filter_count, post)
}

#[cfg(target_arch = "x86_64")]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn run_sse<K: ConvKind, P: PostProcess>(args: &RowArgs, filter_count: usize, post: &P) {
    convolve::<Sse, K, P>(args, filter_count, post)
}

#[cfg(target_arch = "aarch64")]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn run_neon<K: ConvKind, P: PostProcess>(args: &RowArgs, filter_count: usize, post: &P) {
    convolve::<Neon, K, P>(args, filter_count, post)
}

#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn run_portable<K: ConvKind, P: PostProcess, const B: usize>(
    args: &RowArgs,
    filter_count: usize,
    post: &P,
) {
    convolve::<Portable<B>, K, P>(args, filter_count, post)
}
