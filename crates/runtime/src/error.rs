//! VM-level results: the `Result<(), VmError>` that `Vm::interpret` and
//! `Vm::run` return, distinguishing compile-time from runtime failure so
//! `crates/cli` can map either straight to an exit code without
//! string-sniffing a message.

use lox_compiler::CompileError;

/// Everything that can go wrong running a script, already carrying the
/// formatted stack trace for runtime failures.
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    /// The script failed to compile; every diagnostic collected by the
    /// single-pass compiler (it keeps going to EOF) is reported.
    Compile(Vec<CompileError>),
    /// A dispatch-time failure: type mismatch, arity mismatch, undefined
    /// variable, property error, stack overflow, or too many constants.
    /// `message` is the one-line error; `trace` is the frame-by-frame
    /// call stack, top frame first, already formatted as
    /// `"[line N] in <name>"` per frame.
    Runtime { message: String, trace: Vec<String> },
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmError::Compile(errors) => {
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{e}")?;
                }
                Ok(())
            }
            VmError::Runtime { message, trace } => {
                writeln!(f, "{message}")?;
                for (i, line) in trace.iter().enumerate() {
                    if i + 1 < trace.len() {
                        writeln!(f, "{line}")?;
                    } else {
                        write!(f, "{line}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for VmError {}

pub type InterpretResult = Result<(), VmError>;
