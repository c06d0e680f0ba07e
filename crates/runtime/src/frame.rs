//! The per-call activation record: a closure reference, an instruction
//! pointer into that closure's function's chunk, and a base pointer into
//! the operand stack.

use lox_core::ObjRef;

/// One entry in the VM's call-frame stack.
///
/// `ip` is a byte offset into `closure`'s function's chunk rather than a
/// raw pointer — the chunk is owned by the heap-allocated `ObjFunction`,
/// not by this frame, and an offset survives a GC collection (which never
/// moves objects, but keeping `ip` relative is still simpler than
/// threading a second borrow through every dispatch step).
#[derive(Clone, Copy)]
pub struct CallFrame {
    pub closure: ObjRef,
    pub ip: usize,
    /// Index into the VM's operand stack of this frame's slot 0 (the
    /// callee itself for methods, an anonymous placeholder otherwise).
    pub base: usize,
}

impl CallFrame {
    #[must_use]
    pub fn new(closure: ObjRef, base: usize) -> Self {
        Self { closure, ip: 0, base }
    }

    #[must_use]
    pub fn function(&self) -> &'static lox_core::ObjFunction {
        self.closure.as_closure().function.as_function()
    }
}
