//! Parameter buffers (DPB, TPB, SPB, BPB)
//!
//! A [`ParameterBuffer`] is an ordered list of tagged [`Argument`]s. The
//! [`BufferKind`] decides how lengths and integers are laid out on the wire.

mod argument;
mod buffer;
pub mod clumplet;
mod tags;

pub use argument::{Argument, ArgumentValue};
pub use buffer::{BufferKind, ParameterBuffer};
pub use tags::{bpb, dpb, spb, tpb};
