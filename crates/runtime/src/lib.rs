//! The bytecode virtual machine: operand stack, call frames, globals,
//! upvalue capture/closing, and the dispatch loop that drives a compiled
//! chunk to completion.
//!
//! # Modules
//!
//! - `vm`: the [`Vm`] type and its `run()` dispatch loop.
//! - `frame`: a single call frame (`CallFrame`).
//! - `error`: [`VmError`] and [`InterpretResult`].
//! - `natives`: the native ("builtin") function implementations.

mod error;
mod frame;
mod natives;
mod vm;

pub use error::{InterpretResult, VmError};
pub use vm::Vm;
