//! The bytecode instruction set.
//!
//! One byte opcode followed by 0-3 bytes of inline operand, as described in
//! the compiler's "Emitted instruction set" (constants/literals, arithmetic,
//! variable access, control flow, calls/closures, object-oriented
//! dispatch, and `PRINT`).

/// A single bytecode instruction.
///
/// `#[repr(u8)]` so a `Chunk`'s code buffer can store these directly as
/// raw bytes and the VM can reinterpret a byte back into an `OpCode` via
/// [`OpCode::try_from`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Constant,
    Nil,
    True,
    False,
    Pop,
    GetLocal,
    SetLocal,
    GetGlobal,
    DefineGlobal,
    SetGlobal,
    GetUpvalue,
    SetUpvalue,
    GetProperty,
    SetProperty,
    GetSuper,
    Equal,
    Greater,
    Less,
    Add,
    Subtract,
    Multiply,
    Divide,
    Not,
    Negate,
    Print,
    Jump,
    JumpIfFalse,
    Loop,
    Call,
    Invoke,
    SuperInvoke,
    Closure,
    CloseUpvalue,
    Return,
    Class,
    Inherit,
    Method,
}

impl OpCode {
    /// Decode a raw byte into an opcode.
    ///
    /// Only ever fails on a corrupt chunk, which never happens for chunks
    /// produced by this workspace's own compiler; the VM still checks it
    /// because the chunk is crossed as raw bytes rather than as a typed
    /// instruction stream.
    #[must_use]
    pub fn from_u8(byte: u8) -> Option<Self> {
        use OpCode::{
            Add, Call, Class, Closure, CloseUpvalue, Constant, DefineGlobal, Divide, Equal,
            False, GetGlobal, GetLocal, GetProperty, GetSuper, GetUpvalue, Greater, Inherit,
            Invoke, Jump, JumpIfFalse, Less, Loop, Method, Multiply, Negate, Nil, Not, Pop, Print,
            Return, SetGlobal, SetLocal, SetProperty, SetUpvalue, Subtract, SuperInvoke, True,
        };
        let op = match byte {
            0 => Constant,
            1 => Nil,
            2 => True,
            3 => False,
            4 => Pop,
            5 => GetLocal,
            6 => SetLocal,
            7 => GetGlobal,
            8 => DefineGlobal,
            9 => SetGlobal,
            10 => GetUpvalue,
            11 => SetUpvalue,
            12 => GetProperty,
            13 => SetProperty,
            14 => GetSuper,
            15 => Equal,
            16 => Greater,
            17 => Less,
            18 => Add,
            19 => Subtract,
            20 => Multiply,
            21 => Divide,
            22 => Not,
            23 => Negate,
            24 => Print,
            25 => Jump,
            26 => JumpIfFalse,
            27 => Loop,
            28 => Call,
            29 => Invoke,
            30 => SuperInvoke,
            31 => Closure,
            32 => CloseUpvalue,
            33 => Return,
            34 => Class,
            35 => Inherit,
            36 => Method,
            _ => return None,
        };
        Some(op)
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}
