//! The Pratt parser's precedence ladder and per-token rule table.

use crate::compiler::Compiler;
use crate::scanner::TokenType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

pub type ParseFn<'src> = fn(&mut Compiler<'src>, bool);

pub struct ParseRule<'src> {
    pub prefix: Option<ParseFn<'src>>,
    pub infix: Option<ParseFn<'src>>,
    pub precedence: Precedence,
}

/// Look up the `(prefix, infix, precedence)` triple for a token type —
/// the rule table for Pratt parsing, expressed as a `match` rather than
/// an array indexed by `TokenType as usize` since Rust enums are not
/// guaranteed contiguous and a `match` is exhaustiveness-checked by the
/// compiler for free.
#[must_use]
pub fn get_rule<'src>(kind: TokenType) -> ParseRule<'src> {
    use Precedence as P;
    use TokenType as T;
    let (prefix, infix, precedence): (Option<ParseFn<'src>>, Option<ParseFn<'src>>, Precedence) = match kind {
        T::LeftParen => (Some(Compiler::grouping), Some(Compiler::call), P::Call),
        T::Dot => (None, Some(Compiler::dot), P::Call),
        T::Minus => (Some(Compiler::unary), Some(Compiler::binary), P::Term),
        T::Plus => (None, Some(Compiler::binary), P::Term),
        T::Slash => (None, Some(Compiler::binary), P::Factor),
        T::Star => (None, Some(Compiler::binary), P::Factor),
        T::Bang => (Some(Compiler::unary), None, P::None),
        T::BangEqual => (None, Some(Compiler::binary), P::Equality),
        T::EqualEqual => (None, Some(Compiler::binary), P::Equality),
        T::Greater => (None, Some(Compiler::binary), P::Comparison),
        T::GreaterEqual => (None, Some(Compiler::binary), P::Comparison),
        T::Less => (None, Some(Compiler::binary), P::Comparison),
        T::LessEqual => (None, Some(Compiler::binary), P::Comparison),
        T::Identifier => (Some(Compiler::variable), None, P::None),
        T::String => (Some(Compiler::string), None, P::None),
        T::Number => (Some(Compiler::number), None, P::None),
        T::And => (None, Some(Compiler::and_), P::And),
        T::Or => (None, Some(Compiler::or_), P::Or),
        T::False | T::Nil | T::True => (Some(Compiler::literal), None, P::None),
        T::This => (Some(Compiler::this_), None, P::None),
        T::Super => (Some(Compiler::super_), None, P::None),
        _ => (None, None, P::None),
    };
    ParseRule { prefix, infix, precedence }
}
