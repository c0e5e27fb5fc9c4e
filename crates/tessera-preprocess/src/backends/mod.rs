//! Built-in capability backends.
//!
//! Each capability is a closed enum selected once when the pipeline is built.
//! The `Custom` variants hold user implementations of the capability traits.

mod code;
mod markdown;
mod math;
mod verbatim;

pub use code::CodeBackend;
pub use markdown::MarkdownBackend;
pub use math::MathBackend;
pub use verbatim::{VERBATIM_BUCKET, VerbatimBackend};
pub(crate) use verbatim::is_valid_wrapper;
