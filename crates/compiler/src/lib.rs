//! Single-pass scanner, Pratt compiler, and disassembler.
//!
//! [`compile`] is the public entry point: it turns source text into the
//! top-level `<script>` function (an [`ObjRef`] pointing at an
//! `ObjFunction`, allocated in the caller's [`Heap`]) or the list of
//! diagnostics collected while trying.

mod compiler;
mod disassemble;
mod error;
mod fn_compile;
mod frame;
mod rules;
mod scanner;

pub use disassemble::{disassemble_chunk, disassemble_instruction};
pub use error::CompileError;
pub use scanner::{Scanner, Token, TokenType};

use compiler::Compiler;
use lox_core::{Heap, ObjRef};

/// Compile `source` to bytecode, allocating into `heap`.
///
/// On success, the returned [`ObjRef`] points at the implicit top-level
/// function wrapping the whole script (the implicit `<script>`), ready to be
/// wrapped in a closure and run. On failure, every diagnostic collected
/// while compiling to EOF is returned (error recovery keeps going past
/// the first syntax error so multiple mistakes are reported at once).
pub fn compile(source: &str, heap: &mut Heap) -> Result<ObjRef, Vec<CompileError>> {
    Compiler::new(source, heap).compile()
}
