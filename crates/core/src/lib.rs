//! Core value and bytecode representation shared by the compiler and the
//! virtual machine.
//!
//! # Modules
//!
//! - `value`: the `Value` type (tagged union, or NaN-boxed behind the
//!   `nanbox` feature).
//! - `object`: the heap object header and concrete object variants
//!   (strings, functions, natives, upvalues, closures, classes, instances,
//!   bound methods).
//! - `intern`: the string intern table.
//! - `chunk`: the bytecode container (instructions, line map, constants).
//! - `opcode`: the instruction set.
//! - `heap`: allocation and the mark-sweep collector's mechanics.

pub mod chunk;
pub mod heap;
pub mod intern;
pub mod object;
pub mod opcode;
pub mod value;

pub use chunk::Chunk;
pub use heap::Heap;
pub use intern::InternTable;
pub use object::{
    fnv1a_hash, NativeFn, ObjBoundMethod, ObjClass, ObjClosure, ObjFunction, ObjHeader, ObjInstance,
    ObjKind, ObjNative, ObjRef, ObjString, ObjUpvalue,
};
pub use opcode::OpCode;
pub use value::Value;
