//! Disassembler: human-readable bytecode listings, gated behind the CLI's
//! `--dump` flag and the `trace` feature (the runtime prints one
//! instruction per call before it executes). Diagnostics-only — never on
//! the interpretation fast path.

use std::fmt::Write as _;

use lox_core::{Chunk, OpCode};

/// Disassemble an entire chunk into a listing headed by `name`.
#[must_use]
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {name} ==");
    let mut offset = 0;
    while offset < chunk.len() {
        let (line, next) = disassemble_instruction(chunk, offset);
        out.push_str(&line);
        out.push('\n');
        offset = next;
    }
    out
}

/// Disassemble the single instruction at `offset`, returning its textual
/// form and the offset of the next instruction.
#[must_use]
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut out = format!("{offset:04} ");
    if offset > 0 && chunk.line_at(offset) == chunk.line_at(offset - 1) {
        out.push_str("   | ");
    } else {
        let _ = write!(out, "{:4} ", chunk.line_at(offset));
    }

    let Some(op) = OpCode::from_u8(chunk.byte_at(offset)) else {
        let _ = write!(out, "Unknown opcode {}", chunk.byte_at(offset));
        return (out, offset + 1);
    };

    let next = match op {
        OpCode::Constant => constant_instruction(&mut out, "OP_CONSTANT", chunk, offset),
        OpCode::Nil => simple_instruction(&mut out, "OP_NIL", offset),
        OpCode::True => simple_instruction(&mut out, "OP_TRUE", offset),
        OpCode::False => simple_instruction(&mut out, "OP_FALSE", offset),
        OpCode::Pop => simple_instruction(&mut out, "OP_POP", offset),
        OpCode::GetLocal => byte_instruction(&mut out, "OP_GET_LOCAL", chunk, offset),
        OpCode::SetLocal => byte_instruction(&mut out, "OP_SET_LOCAL", chunk, offset),
        OpCode::GetGlobal => constant_instruction(&mut out, "OP_GET_GLOBAL", chunk, offset),
        OpCode::DefineGlobal => constant_instruction(&mut out, "OP_DEFINE_GLOBAL", chunk, offset),
        OpCode::SetGlobal => constant_instruction(&mut out, "OP_SET_GLOBAL", chunk, offset),
        OpCode::GetUpvalue => byte_instruction(&mut out, "OP_GET_UPVALUE", chunk, offset),
        OpCode::SetUpvalue => byte_instruction(&mut out, "OP_SET_UPVALUE", chunk, offset),
        OpCode::GetProperty => constant_instruction(&mut out, "OP_GET_PROPERTY", chunk, offset),
        OpCode::SetProperty => constant_instruction(&mut out, "OP_SET_PROPERTY", chunk, offset),
        OpCode::GetSuper => constant_instruction(&mut out, "OP_GET_SUPER", chunk, offset),
        OpCode::Equal => simple_instruction(&mut out, "OP_EQUAL", offset),
        OpCode::Greater => simple_instruction(&mut out, "OP_GREATER", offset),
        OpCode::Less => simple_instruction(&mut out, "OP_LESS", offset),
        OpCode::Add => simple_instruction(&mut out, "OP_ADD", offset),
        OpCode::Subtract => simple_instruction(&mut out, "OP_SUBTRACT", offset),
        OpCode::Multiply => simple_instruction(&mut out, "OP_MULTIPLY", offset),
        OpCode::Divide => simple_instruction(&mut out, "OP_DIVIDE", offset),
        OpCode::Not => simple_instruction(&mut out, "OP_NOT", offset),
        OpCode::Negate => simple_instruction(&mut out, "OP_NEGATE", offset),
        OpCode::Print => simple_instruction(&mut out, "OP_PRINT", offset),
        OpCode::Jump => jump_instruction(&mut out, "OP_JUMP", 1, chunk, offset),
        OpCode::JumpIfFalse => jump_instruction(&mut out, "OP_JUMP_IF_FALSE", 1, chunk, offset),
        OpCode::Loop => jump_instruction(&mut out, "OP_LOOP", -1, chunk, offset),
        OpCode::Call => byte_instruction(&mut out, "OP_CALL", chunk, offset),
        OpCode::Invoke => invoke_instruction(&mut out, "OP_INVOKE", chunk, offset),
        OpCode::SuperInvoke => invoke_instruction(&mut out, "OP_SUPER_INVOKE", chunk, offset),
        OpCode::Closure => closure_instruction(&mut out, chunk, offset),
        OpCode::CloseUpvalue => simple_instruction(&mut out, "OP_CLOSE_UPVALUE", offset),
        OpCode::Return => simple_instruction(&mut out, "OP_RETURN", offset),
        OpCode::Class => constant_instruction(&mut out, "OP_CLASS", chunk, offset),
        OpCode::Inherit => simple_instruction(&mut out, "OP_INHERIT", offset),
        OpCode::Method => constant_instruction(&mut out, "OP_METHOD", chunk, offset),
    };
    (out, next)
}

fn simple_instruction(out: &mut String, name: &str, offset: usize) -> usize {
    out.push_str(name);
    offset + 1
}

fn byte_instruction(out: &mut String, name: &str, chunk: &Chunk, offset: usize) -> usize {
    let slot = chunk.byte_at(offset + 1);
    let _ = write!(out, "{name:<16} {slot:4}");
    offset + 2
}

fn constant_instruction(out: &mut String, name: &str, chunk: &Chunk, offset: usize) -> usize {
    let index = chunk.byte_at(offset + 1);
    let value = chunk.constant(index);
    let _ = write!(out, "{name:<16} {index:4} '{value}'");
    offset + 2
}

fn jump_instruction(out: &mut String, name: &str, sign: i32, chunk: &Chunk, offset: usize) -> usize {
    let hi = chunk.byte_at(offset + 1) as u16;
    let lo = chunk.byte_at(offset + 2) as u16;
    let jump = ((hi << 8) | lo) as i32;
    let target = offset as i32 + 3 + sign * jump;
    let _ = write!(out, "{name:<16} {offset:4} -> {target}");
    offset + 3
}

fn invoke_instruction(out: &mut String, name: &str, chunk: &Chunk, offset: usize) -> usize {
    let index = chunk.byte_at(offset + 1);
    let argc = chunk.byte_at(offset + 2);
    let value = chunk.constant(index);
    let _ = write!(out, "{name:<16} ({argc} args) {index:4} '{value}'");
    offset + 3
}

fn closure_instruction(out: &mut String, chunk: &Chunk, offset: usize) -> usize {
    let mut offset = offset + 1;
    let index = chunk.byte_at(offset);
    let value = chunk.constant(index);
    let _ = write!(out, "{:<16} {index:4} '{value}'", "OP_CLOSURE");
    offset += 1;

    if let Some(function_obj) = value.as_obj() {
        let upvalue_count = function_obj.as_function().upvalue_count;
        for _ in 0..upvalue_count {
            let is_local = chunk.byte_at(offset) != 0;
            let upvalue_index = chunk.byte_at(offset + 1);
            let kind = if is_local { "local" } else { "upvalue" };
            let _ = write!(out, "\n{offset:04}      |                     {kind} {upvalue_index}");
            offset += 2;
        }
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use lox_core::Value;

    #[test]
    fn disassembles_a_constant_and_return() {
        let mut chunk = Chunk::new();
        let idx = chunk.add_constant(Value::number(1.5)).unwrap();
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(idx, 1);
        chunk.write_op(OpCode::Return, 1);
        let listing = disassemble_chunk(&chunk, "test");
        assert!(listing.contains("== test =="));
        assert!(listing.contains("OP_CONSTANT"));
        assert!(listing.contains("1.5"));
        assert!(listing.contains("OP_RETURN"));
    }

    #[test]
    fn same_line_instructions_elide_the_line_number() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 3);
        chunk.write_op(OpCode::Return, 3);
        let listing = disassemble_chunk(&chunk, "lines");
        let lines: Vec<&str> = listing.lines().collect();
        assert!(lines[1].contains("3 "));
        assert!(lines[2].contains("|"));
    }
}
