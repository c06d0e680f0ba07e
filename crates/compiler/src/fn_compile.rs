//! Function-body compilation, split out from `compiler.rs` because it is
//! the one piece of the compiler that needs to thread the frame stack
//! *and* patch bytecode in the enclosing frame once the nested frame is
//! done — the `CLOSURE` instruction (with its trailing `(is_local, index)`
//! pairs) is emitted into the function that *contains* the `fun`/method,
//! not the one being defined.

use lox_core::{OpCode, Value};

use crate::compiler::Compiler;
use crate::frame::{CompilerFrame, FunctionType};
use crate::scanner::TokenType;

impl<'src> Compiler<'src> {
    /// Compile a function's parameter list and body. On entry,
    /// `self.previous` is the function's name token (already consumed by
    /// the caller, which is also how the name ends up in the new
    /// function's `ObjFunction::name`).
    pub(crate) fn function(&mut self, function_type: FunctionType) {
        let name_text = self.previous.lexeme.to_string();
        let name_obj = self.heap.intern_string(name_text.as_bytes());
        let function_obj = self.heap.alloc_function(Some(name_obj));

        self.frames.push(CompilerFrame::new(function_obj, function_type));
        self.begin_scope();

        self.consume(TokenType::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenType::RightParen) {
            loop {
                let arity = function_obj.as_function().arity;
                if arity == u8::MAX {
                    self.error_at_current("Can't have more than 255 parameters.");
                } else {
                    function_obj.as_function_mut().arity = arity + 1;
                }
                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.");
        self.consume(TokenType::LeftBrace, "Expect '{' before function body.");
        self.block();

        let compiled_frame = self.end_compiler();
        let upvalue_count = compiled_frame.upvalues.len();
        function_obj.as_function_mut().upvalue_count = upvalue_count as u8;

        let constant = self.make_constant(Value::obj(function_obj));
        self.emit_two(OpCode::Closure, constant);
        for upvalue in &compiled_frame.upvalues {
            self.emit_byte(u8::from(upvalue.is_local));
            self.emit_byte(upvalue.index);
        }
    }
}
