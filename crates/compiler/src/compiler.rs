//! The single-pass Pratt compiler: parser state, expression parsing, and
//! statement/declaration compiling. Function-body compilation (shared by
//! top-level script, `fun` declarations, and methods) lives in
//! `fn_compile.rs`.

use lox_core::{Heap, ObjRef, OpCode, Value};

use crate::error::CompileError;
use crate::frame::{CompilerFrame, FunctionType, Local, MAX_LOCALS};
use crate::rules::{get_rule, Precedence};
use crate::scanner::{Scanner, Token, TokenType};

pub(crate) struct ClassCompiler {
    pub(crate) has_superclass: bool,
}

/// Parser + per-function compiler state. One `Compiler` compiles one
/// translation unit (a whole script, or one REPL line); nested `fun`/method
/// bodies push and pop [`CompilerFrame`]s on `frames` rather than holding a
/// boxed `enclosing` pointer, since the `frames` stack already gives every
/// frame access to its ancestors by index.
pub struct Compiler<'src> {
    scanner: Scanner<'src>,
    pub(crate) previous: Token<'src>,
    pub(crate) current: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    errors: Vec<CompileError>,
    pub(crate) frames: Vec<CompilerFrame>,
    pub(crate) classes: Vec<ClassCompiler>,
    pub(crate) heap: &'src mut Heap,
}

impl<'src> Compiler<'src> {
    #[must_use]
    pub fn new(source: &'src str, heap: &'src mut Heap) -> Self {
        let script_function = heap.alloc_function(None);
        let dummy = Token {
            kind: TokenType::Eof,
            lexeme: "",
            line: 0,
        };
        let mut compiler = Self {
            scanner: Scanner::new(source),
            previous: dummy,
            current: dummy,
            had_error: false,
            panic_mode: false,
            errors: Vec::new(),
            frames: vec![CompilerFrame::new(script_function, FunctionType::Script)],
            classes: Vec::new(),
            heap,
        };
        compiler.advance();
        compiler
    }

    /// Compile the whole source to EOF, returning the top-level function
    /// (the implicit `<script>`) or the diagnostics collected along the
    /// way.
    pub fn compile(mut self) -> Result<ObjRef, Vec<CompileError>> {
        while !self.check(TokenType::Eof) {
            self.declaration();
        }
        self.consume(TokenType::Eof, "Expect end of expression.");
        let function = self.end_compiler().function;
        if self.had_error {
            Err(self.errors)
        } else {
            Ok(function)
        }
    }

    // --- token stream plumbing ---

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenType::Error {
                break;
            }
            let message = self.current.lexeme.to_string();
            self.error_at_current(&message);
        }
    }

    pub(crate) fn consume(&mut self, kind: TokenType, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    pub(crate) fn check(&self, kind: TokenType) -> bool {
        self.current.kind == kind
    }

    pub(crate) fn match_token(&mut self, kind: TokenType) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    pub(crate) fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        let lexeme = if token.kind == TokenType::Eof {
            None
        } else {
            Some(token.lexeme.to_string())
        };
        self.errors.push(CompileError {
            line: token.line,
            lexeme,
            message: message.to_string(),
        });
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenType::Eof {
            if self.previous.kind == TokenType::Semicolon {
                return;
            }
            match self.current.kind {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // --- frame / chunk plumbing ---

    pub(crate) fn current_frame(&self) -> &CompilerFrame {
        self.frames.last().expect("compiler frame stack is never empty")
    }

    pub(crate) fn current_frame_mut(&mut self) -> &mut CompilerFrame {
        self.frames.last_mut().expect("compiler frame stack is never empty")
    }

    fn current_chunk_len(&self) -> usize {
        self.current_frame().function.as_function().chunk.len()
    }

    pub(crate) fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        let function = self.current_frame().function;
        function.as_function_mut().chunk.write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op.into());
    }

    pub(crate) fn emit_two(&mut self, op: OpCode, byte: u8) {
        self.emit_op(op);
        self.emit_byte(byte);
    }

    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.current_chunk_len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        let jump = self.current_chunk_len() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }
        let function = self.current_frame().function;
        let chunk = &mut function.as_function_mut().chunk;
        chunk.patch_byte(offset, ((jump >> 8) & 0xff) as u8);
        chunk.patch_byte(offset + 1, (jump & 0xff) as u8);
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);
        let offset = self.current_chunk_len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
        }
        self.emit_byte(((offset >> 8) & 0xff) as u8);
        self.emit_byte((offset & 0xff) as u8);
    }

    fn emit_return(&mut self) {
        if self.current_frame().function_type == FunctionType::Initializer {
            self.emit_two(OpCode::GetLocal, 0);
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.emit_op(OpCode::Return);
    }

    /// Pop the current frame, emitting its implicit trailing return first.
    pub(crate) fn end_compiler(&mut self) -> CompilerFrame {
        self.emit_return();
        self.frames.pop().expect("compiler frame stack is never empty")
    }

    pub(crate) fn make_constant(&mut self, value: Value) -> u8 {
        let function = self.current_frame().function;
        match function.as_function_mut().chunk.add_constant(value) {
            Some(idx) => idx,
            None => {
                self.error("Too many constants in one function.");
                0
            }
        }
    }

    fn emit_constant(&mut self, value: Value) {
        let idx = self.make_constant(value);
        self.emit_two(OpCode::Constant, idx);
    }

    fn identifier_constant(&mut self, name: &str) -> u8 {
        let obj = self.heap.intern_string(name.as_bytes());
        self.make_constant(Value::obj(obj))
    }

    // --- scopes and variables ---

    pub(crate) fn begin_scope(&mut self) {
        self.current_frame_mut().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.current_frame_mut().scope_depth -= 1;
        let depth = self.current_frame().scope_depth;
        loop {
            let should_pop = matches!(self.current_frame().locals.last(), Some(local) if local.depth > depth);
            if !should_pop {
                break;
            }
            let captured = self.current_frame().locals.last().unwrap().is_captured;
            if captured {
                self.emit_op(OpCode::CloseUpvalue);
            } else {
                self.emit_op(OpCode::Pop);
            }
            self.current_frame_mut().locals.pop();
        }
    }

    fn declare_variable(&mut self, name: &str) {
        if self.current_frame().scope_depth == 0 {
            return;
        }
        let depth = self.current_frame().scope_depth;
        let mut duplicate = false;
        for local in self.current_frame().locals.iter().rev() {
            if local.depth != -1 && local.depth < depth {
                break;
            }
            if local.name == name {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            self.error("Already a variable with this name in this scope.");
        }
        self.add_local(name);
    }

    fn add_local(&mut self, name: &str) {
        if self.current_frame().locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.current_frame_mut().locals.push(Local {
            name: name.to_string(),
            depth: -1,
            is_captured: false,
        });
    }

    pub(crate) fn parse_variable(&mut self, message: &str) -> u8 {
        self.consume(TokenType::Identifier, message);
        let name = self.previous.lexeme.to_string();
        self.declare_variable(&name);
        if self.current_frame().scope_depth > 0 {
            return 0;
        }
        self.identifier_constant(&name)
    }

    fn mark_initialized(&mut self) {
        if self.current_frame().scope_depth == 0 {
            return;
        }
        let depth = self.current_frame().scope_depth;
        if let Some(local) = self.current_frame_mut().locals.last_mut() {
            local.depth = depth;
        }
    }

    pub(crate) fn define_variable(&mut self, global: u8) {
        if self.current_frame().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_two(OpCode::DefineGlobal, global);
    }

    fn resolve_local_in(&mut self, frame_idx: usize, name: &str) -> Option<u8> {
        let found = self.frames[frame_idx].resolve_local(name);
        found.map(|(slot, depth)| {
            if depth == -1 {
                self.error("Can't read local variable in its own initializer.");
            }
            slot
        })
    }

    fn resolve_upvalue(&mut self, frame_idx: usize, name: &str) -> Option<u8> {
        if frame_idx == 0 {
            return None;
        }
        let enclosing_idx = frame_idx - 1;
        if let Some(local_slot) = self.resolve_local_in(enclosing_idx, name) {
            self.frames[enclosing_idx].locals[local_slot as usize].is_captured = true;
            return Some(self.add_upvalue(frame_idx, local_slot, true));
        }
        if let Some(upvalue_idx) = self.resolve_upvalue(enclosing_idx, name) {
            return Some(self.add_upvalue(frame_idx, upvalue_idx, false));
        }
        None
    }

    /// Add an upvalue to `frame_idx`, reporting a compile error and
    /// returning slot 0 if the function already captures the maximum
    /// number of variables, so the caller can keep emitting valid bytecode
    /// instead of silently falling back to a global lookup.
    fn add_upvalue(&mut self, frame_idx: usize, index: u8, is_local: bool) -> u8 {
        match self.frames[frame_idx].add_upvalue(index, is_local) {
            Some(slot) => slot,
            None => {
                self.error("Too many closure variables in function.");
                0
            }
        }
    }

    fn resolve_variable(&mut self, name: &str) -> (OpCode, OpCode, u8) {
        let frame_idx = self.frames.len() - 1;
        if let Some(slot) = self.resolve_local_in(frame_idx, name) {
            return (OpCode::GetLocal, OpCode::SetLocal, slot);
        }
        if let Some(upvalue_idx) = self.resolve_upvalue(frame_idx, name) {
            return (OpCode::GetUpvalue, OpCode::SetUpvalue, upvalue_idx);
        }
        let arg = self.identifier_constant(name);
        (OpCode::GetGlobal, OpCode::SetGlobal, arg)
    }

    fn named_variable(&mut self, name: &str, can_assign: bool) {
        let (get_op, set_op, arg) = self.resolve_variable(name);
        if can_assign && self.match_token(TokenType::Equal) {
            self.expression();
            self.emit_two(set_op, arg);
        } else {
            self.emit_two(get_op, arg);
        }
    }

    // --- expressions (Pratt parsing) ---

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix_rule) = get_rule::<'src>(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix_rule(self, can_assign);

        while precedence <= get_rule::<'src>(self.current.kind).precedence {
            self.advance();
            let infix_rule = get_rule::<'src>(self.previous.kind)
                .infix
                .expect("a token whose precedence qualified must have an infix rule");
            infix_rule(self, can_assign);
        }

        if can_assign && self.match_token(TokenType::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    pub(crate) fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after expression.");
    }

    pub(crate) fn unary(&mut self, _can_assign: bool) {
        let operator_kind = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match operator_kind {
            TokenType::Bang => self.emit_op(OpCode::Not),
            TokenType::Minus => self.emit_op(OpCode::Negate),
            _ => unreachable!("unary() only ever called for ! or -"),
        }
    }

    pub(crate) fn binary(&mut self, _can_assign: bool) {
        let operator_kind = self.previous.kind;
        let rule_precedence = get_rule::<'src>(operator_kind).precedence;
        self.parse_precedence(rule_precedence.next());
        match operator_kind {
            TokenType::BangEqual => {
                self.emit_op(OpCode::Equal);
                self.emit_op(OpCode::Not);
            }
            TokenType::EqualEqual => self.emit_op(OpCode::Equal),
            TokenType::Greater => self.emit_op(OpCode::Greater),
            TokenType::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
            TokenType::Less => self.emit_op(OpCode::Less),
            TokenType::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            TokenType::Plus => self.emit_op(OpCode::Add),
            TokenType::Minus => self.emit_op(OpCode::Subtract),
            TokenType::Star => self.emit_op(OpCode::Multiply),
            TokenType::Slash => self.emit_op(OpCode::Divide),
            _ => unreachable!("binary() only ever called for a binary operator token"),
        }
    }

    pub(crate) fn number(&mut self, _can_assign: bool) {
        let value: f64 = self.previous.lexeme.parse().unwrap_or(f64::NAN);
        self.emit_constant(Value::number(value));
    }

    pub(crate) fn string(&mut self, _can_assign: bool) {
        let lexeme = self.previous.lexeme;
        let contents = &lexeme[1..lexeme.len() - 1];
        let obj = self.heap.intern_string(contents.as_bytes());
        self.emit_constant(Value::obj(obj));
    }

    pub(crate) fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenType::False => self.emit_op(OpCode::False),
            TokenType::Nil => self.emit_op(OpCode::Nil),
            TokenType::True => self.emit_op(OpCode::True),
            _ => unreachable!("literal() only ever called for false/nil/true"),
        }
    }

    pub(crate) fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme.to_string();
        self.named_variable(&name, can_assign);
    }

    pub(crate) fn this_(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("Can't use 'this' outside of a class.");
        }
        self.named_variable("this", false);
    }

    pub(crate) fn super_(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("Can't use 'super' outside of a class.");
        } else if !self.classes.last().unwrap().has_superclass {
            self.error("Can't use 'super' in a class with no superclass.");
        }
        self.consume(TokenType::Dot, "Expect '.' after 'super'.");
        self.consume(TokenType::Identifier, "Expect superclass method name.");
        let method_name = self.previous.lexeme.to_string();
        let name_const = self.identifier_constant(&method_name);

        self.named_variable("this", false);
        if self.match_token(TokenType::LeftParen) {
            let argc = self.argument_list();
            self.named_variable("super", false);
            self.emit_two(OpCode::SuperInvoke, name_const);
            self.emit_byte(argc);
        } else {
            self.named_variable("super", false);
            self.emit_two(OpCode::GetSuper, name_const);
        }
    }

    pub(crate) fn and_(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    pub(crate) fn or_(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn argument_list(&mut self) -> u8 {
        let mut argc: u32 = 0;
        if !self.check(TokenType::RightParen) {
            loop {
                self.expression();
                if argc == 255 {
                    self.error("Can't have more than 255 arguments.");
                }
                argc += 1;
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after arguments.");
        argc as u8
    }

    pub(crate) fn call(&mut self, _can_assign: bool) {
        let argc = self.argument_list();
        self.emit_two(OpCode::Call, argc);
    }

    pub(crate) fn dot(&mut self, can_assign: bool) {
        self.consume(TokenType::Identifier, "Expect property name after '.'.");
        let name = self.previous.lexeme.to_string();
        let name_const = self.identifier_constant(&name);

        if can_assign && self.match_token(TokenType::Equal) {
            self.expression();
            self.emit_two(OpCode::SetProperty, name_const);
        } else if self.match_token(TokenType::LeftParen) {
            let argc = self.argument_list();
            self.emit_two(OpCode::Invoke, name_const);
            self.emit_byte(argc);
        } else {
            self.emit_two(OpCode::GetProperty, name_const);
        }
    }

    // --- statements and declarations ---

    pub(crate) fn declaration(&mut self) {
        if self.match_token(TokenType::Class) {
            self.class_declaration();
        } else if self.match_token(TokenType::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenType::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn class_declaration(&mut self) {
        self.consume(TokenType::Identifier, "Expect class name.");
        let class_name = self.previous.lexeme.to_string();
        let name_const = self.identifier_constant(&class_name);
        self.declare_variable(&class_name);

        self.emit_two(OpCode::Class, name_const);
        self.define_variable(name_const);

        self.classes.push(ClassCompiler { has_superclass: false });

        if self.match_token(TokenType::Less) {
            self.consume(TokenType::Identifier, "Expect superclass name.");
            let superclass_name = self.previous.lexeme.to_string();
            self.variable(false);
            if superclass_name == class_name {
                self.error("A class can't inherit from itself.");
            }

            self.begin_scope();
            self.add_local("super");
            self.define_variable(0);

            self.named_variable(&class_name, false);
            self.emit_op(OpCode::Inherit);
            self.classes.last_mut().unwrap().has_superclass = true;
        }

        self.named_variable(&class_name, false);
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.");
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::Eof) {
            self.method();
        }
        self.consume(TokenType::RightBrace, "Expect '}' after class body.");
        self.emit_op(OpCode::Pop);

        if self.classes.last().unwrap().has_superclass {
            self.end_scope();
        }
        self.classes.pop();
    }

    fn method(&mut self) {
        self.consume(TokenType::Identifier, "Expect method name.");
        let method_name = self.previous.lexeme.to_string();
        let name_const = self.identifier_constant(&method_name);

        let function_type = if method_name == "init" {
            FunctionType::Initializer
        } else {
            FunctionType::Method
        };
        self.function(function_type);
        self.emit_two(OpCode::Method, name_const);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.function(FunctionType::Function);
        self.define_variable(global);
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");
        if self.match_token(TokenType::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.");
        self.define_variable(global);
    }

    fn statement(&mut self) {
        if self.match_token(TokenType::Print) {
            self.print_statement();
        } else if self.match_token(TokenType::For) {
            self.for_statement();
        } else if self.match_token(TokenType::If) {
            self.if_statement();
        } else if self.match_token(TokenType::Return) {
            self.return_statement();
        } else if self.match_token(TokenType::While) {
            self.while_statement();
        } else if self.match_token(TokenType::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    pub(crate) fn block(&mut self) {
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::Eof) {
            self.declaration();
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.");
    }

    fn if_statement(&mut self) {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        if self.match_token(TokenType::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk_len();
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.");
        if self.match_token(TokenType::Semicolon) {
            // no initializer clause
        } else if self.match_token(TokenType::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_chunk_len();
        let mut exit_jump: Option<usize> = None;
        if !self.match_token(TokenType::Semicolon) {
            self.expression();
            self.consume(TokenType::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        if !self.match_token(TokenType::RightParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.current_chunk_len();
            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenType::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(OpCode::Pop);
        }

        self.end_scope();
    }

    fn return_statement(&mut self) {
        if self.current_frame().function_type == FunctionType::Script {
            self.error("Can't return from top-level code.");
        }
        if self.match_token(TokenType::Semicolon) {
            self.emit_return();
        } else {
            if self.current_frame().function_type == FunctionType::Initializer {
                self.error("Can't return a value from an initializer.");
            }
            self.expression();
            self.consume(TokenType::Semicolon, "Expect ';' after return value.");
            self.emit_op(OpCode::Return);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lox_core::Heap;

    fn compile_ok(source: &str) -> ObjRef {
        let mut heap = Heap::new();
        Compiler::new(source, &mut heap).compile().unwrap_or_else(|errors| {
            panic!("expected {source:?} to compile, got: {errors:?}")
        })
    }

    fn compile_err(source: &str) -> Vec<CompileError> {
        let mut heap = Heap::new();
        match Compiler::new(source, &mut heap).compile() {
            Ok(_) => panic!("expected {source:?} to fail to compile"),
            Err(errors) => errors,
        }
    }

    fn disassembly(function: ObjRef) -> String {
        crate::disassemble::disassemble_chunk(&function.as_function().chunk, "test")
    }

    #[test]
    fn compiles_an_arithmetic_expression_statement() {
        let function = compile_ok("1 + 2 * 3;");
        let listing = disassembly(function);
        assert!(listing.contains("OP_CONSTANT"));
        assert!(listing.contains("OP_ADD"));
        assert!(listing.contains("OP_MULTIPLY"));
        // every expression statement ends with a pop, and every function an
        // implicit nil return.
        assert!(listing.contains("OP_POP"));
        assert!(listing.contains("OP_NIL"));
        assert!(listing.contains("OP_RETURN"));
    }

    #[test]
    fn global_declaration_emits_define_global() {
        let function = compile_ok("var a = 1;");
        assert!(disassembly(function).contains("OP_DEFINE_GLOBAL"));
    }

    #[test]
    fn local_variable_use_emits_get_set_local_not_global() {
        let function = compile_ok("{ var a = 1; a = a + 1; print a; }");
        let listing = disassembly(function);
        assert!(listing.contains("OP_GET_LOCAL"));
        assert!(listing.contains("OP_SET_LOCAL"));
        assert!(!listing.contains("OP_GET_GLOBAL"));
        assert!(!listing.contains("OP_DEFINE_GLOBAL"));
    }

    fn nested_function_constant(function: ObjRef) -> ObjRef {
        function
            .as_function()
            .chunk
            .constants()
            .iter()
            .find_map(|v| v.as_obj())
            .filter(|o| o.kind() == lox_core::ObjKind::Function)
            .expect("expected a nested function in the constant pool")
    }

    #[test]
    fn nested_function_closes_over_enclosing_local_via_upvalue() {
        let script = compile_ok("fun make(x) { fun inner() { return x; } return inner; }");
        // `make`'s own chunk is a constant of the top-level script; `inner`
        // is in turn a constant of `make`'s chunk, and it must read the
        // captured parameter `x` as an upvalue rather than a local.
        let make = nested_function_constant(script);
        assert!(disassembly(make).contains("OP_CLOSURE"));
        let inner = nested_function_constant(make);
        assert!(disassembly(inner).contains("OP_GET_UPVALUE"));
    }

    #[test]
    fn self_initializing_local_is_a_compile_error() {
        let errors = compile_err("{ var a = a; }");
        assert!(errors.iter().any(|e| e.message.contains("its own initializer")));
    }

    #[test]
    fn duplicate_local_in_same_scope_is_a_compile_error() {
        let errors = compile_err("{ var a = 1; var a = 2; }");
        assert!(errors.iter().any(|e| e.message.contains("Already a variable")));
    }

    #[test]
    fn too_many_local_variables_is_a_compile_error() {
        let mut source = String::from("{ ");
        for i in 0..300 {
            source.push_str(&format!("var v{i} = {i};"));
        }
        source.push('}');
        let errors = compile_err(&source);
        assert!(errors.iter().any(|e| e.message.contains("Too many local variables")));
    }

    #[test]
    fn too_many_captured_variables_is_a_compile_error_not_a_global_fallback() {
        // `outer` has 256 locals (v0..v255) and `g` has its own 256 locals
        // (w0..w255). `f`, nested inside `g`, first captures all of
        // `outer`'s locals (as upvalues-of-an-upvalue, via `g`) which
        // exactly fills its 256-slot upvalue table, then captures `g`'s own
        // locals directly — the very first of those is the 257th distinct
        // capture and must overflow with a diagnostic rather than silently
        // falling back to a global lookup.
        let mut source = String::from("fun outer() {");
        for i in 0..256 {
            source.push_str(&format!("var v{i} = {i};"));
        }
        source.push_str("fun g() {");
        for i in 0..256 {
            source.push_str(&format!("var w{i} = {i};"));
        }
        source.push_str("fun f() {");
        for i in 0..256 {
            source.push_str(&format!("print v{i};"));
        }
        for i in 0..256 {
            source.push_str(&format!("print w{i};"));
        }
        source.push_str("} f; } g; }");
        let errors = compile_err(&source);
        assert!(errors.iter().any(|e| e.message.contains("Too many closure variables")));
    }

    #[test]
    fn this_outside_a_class_is_a_compile_error() {
        let errors = compile_err("print this;");
        assert!(errors.iter().any(|e| e.message.contains("Can't use 'this' outside of a class.")));
    }

    #[test]
    fn super_outside_a_class_is_a_compile_error() {
        let errors = compile_err("fun f() { super.foo(); }");
        assert!(errors.iter().any(|e| e.message.contains("Can't use 'super' outside of a class.")));
    }

    #[test]
    fn super_in_a_class_without_a_superclass_is_a_compile_error() {
        let errors = compile_err("class A { m() { super.m(); } }");
        assert!(errors
            .iter()
            .any(|e| e.message.contains("Can't use 'super' in a class with no superclass.")));
    }

    #[test]
    fn return_from_top_level_is_a_compile_error() {
        let errors = compile_err("return 1;");
        assert!(errors.iter().any(|e| e.message.contains("Can't return from top-level code.")));
    }

    #[test]
    fn returning_a_value_from_an_initializer_is_a_compile_error() {
        let errors = compile_err("class A { init() { return 1; } }");
        assert!(errors
            .iter()
            .any(|e| e.message.contains("Can't return a value from an initializer.")));
    }

    #[test]
    fn a_class_with_inheritance_emits_inherit_and_copies_methods_at_runtime() {
        let function = compile_ok("class A {} class B < A { m() {} }");
        let listing = disassembly(function);
        assert!(listing.contains("OP_CLASS"));
        assert!(listing.contains("OP_INHERIT"));
        assert!(listing.contains("OP_METHOD"));
    }

    #[test]
    fn error_recovery_keeps_compiling_past_the_first_syntax_error() {
        // Two independent syntax errors on two statements; the parser must
        // resynchronize at the `;` and report both rather than stopping
        // after the first.
        let errors = compile_err("var = 1; var = 2;");
        assert!(errors.len() >= 2, "expected both statements' errors, got: {errors:?}");
    }

    #[test]
    fn if_else_compiles_to_forward_patched_jumps() {
        let function = compile_ok("if (true) { print 1; } else { print 2; }");
        let listing = disassembly(function);
        assert!(listing.contains("OP_JUMP_IF_FALSE"));
        assert!(listing.contains("OP_JUMP "));
    }

    #[test]
    fn while_loop_compiles_to_a_backward_loop_instruction() {
        let function = compile_ok("var i = 0; while (i < 3) { i = i + 1; }");
        assert!(disassembly(function).contains("OP_LOOP"));
    }
}
