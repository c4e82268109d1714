use thiserror::Error;

use crate::backend::Backend;

/// Rejected kernel launch.
///
/// The raw kernels trust their arguments; these errors come from the checks
/// the safe entry points run before handing pointers to them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvError {
    #[error("filter count must be in 1..=4, got {0}")]
    FilterCount(usize),

    #[error("{field} = {value} is not a multiple of the block size {block}")]
    Unaligned {
        field: &'static str,
        value: usize,
        block: usize,
    },

    #[error("{buffer} buffer too small: need {required} elements, have {actual}")]
    BufferTooSmall {
        buffer: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("{extent} extent overflows the address space")]
    Overflow { extent: &'static str },

    #[error("first unpadded input position {offset} is before the start of the input buffer")]
    InputUnderflow { offset: isize },

    #[error("bias addition requested without a bias buffer")]
    MissingBias,

    #[error("RELU and OTHER activation flags are mutually exclusive")]
    ConflictingActivations,

    #[error("backend {backend:?} is not available for block size {block}")]
    BackendUnavailable { backend: Backend, block: usize },
}
