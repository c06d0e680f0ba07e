//! Per-function compilation state.
//!
//! One [`CompilerFrame`] exists per function currently being compiled; the
//! `Compiler` in `mod.rs` keeps a stack of these (innermost last) instead
//! of a boxed `enclosing` link, since Rust has no convenient way to thread
//! a self-referential "parent compiler" pointer through recursive descent
//! without either an arena or a stack a level up. Slot 0 of `locals` is
//! always reserved: for a method or initializer it names `this`, otherwise
//! it is an anonymous placeholder that assignment/resolution never sees by
//! name.

use lox_core::ObjRef;

/// Maximum locals (and, independently, upvalues) a single function may
/// declare — a `GET_LOCAL`/`GET_UPVALUE` operand is one byte.
pub const MAX_LOCALS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionType {
    Script,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone)]
pub struct Local {
    pub name: String,
    /// `-1` means "declared but not yet initialized" — a read of a local
    /// at this depth is the `var x = x;` error.
    pub depth: i32,
    pub is_captured: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct UpvalueRef {
    pub index: u8,
    pub is_local: bool,
}

pub struct CompilerFrame {
    /// The function object under construction. Its `chunk` is written to
    /// directly as bytecode is emitted.
    pub function: ObjRef,
    pub function_type: FunctionType,
    pub locals: Vec<Local>,
    pub upvalues: Vec<UpvalueRef>,
    pub scope_depth: i32,
}

impl CompilerFrame {
    pub fn new(function: ObjRef, function_type: FunctionType) -> Self {
        let slot_zero_name = match function_type {
            FunctionType::Method | FunctionType::Initializer => "this",
            _ => "",
        };
        Self {
            function,
            function_type,
            locals: vec![Local {
                name: slot_zero_name.to_string(),
                depth: 0,
                is_captured: false,
            }],
            upvalues: Vec::new(),
            scope_depth: 0,
        }
    }

    /// Resolve a local by name, searching from the innermost declaration
    /// outward. The returned depth may be `-1` ("declared but not yet
    /// initialized"); the caller decides whether that is an error, reporting
    /// it but still returning the slot so compilation can continue.
    pub fn resolve_local(&self, name: &str) -> Option<(u8, i32)> {
        for (i, local) in self.locals.iter().enumerate().rev() {
            if local.name == name {
                return Some((i as u8, local.depth));
            }
        }
        None
    }

    pub fn add_upvalue(&mut self, index: u8, is_local: bool) -> Option<u8> {
        for (i, up) in self.upvalues.iter().enumerate() {
            if up.index == index && up.is_local == is_local {
                return Some(i as u8);
            }
        }
        if self.upvalues.len() >= MAX_LOCALS {
            return None;
        }
        self.upvalues.push(UpvalueRef { index, is_local });
        Some((self.upvalues.len() - 1) as u8)
    }
}
