//! Pull-based tokenizer: one call to [`Scanner::scan_token`] produces one
//! token. Whitespace and `//` line comments are skipped; newlines advance
//! the line counter. Strings are double-quoted, may span lines, and do not
//! support escape sequences. Numbers are base-10 with an optional
//! fractional part. Unknown characters and unterminated strings produce an
//! error token whose lexeme is the diagnostic message.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum TokenType {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,
    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    // Literals.
    Identifier,
    String,
    Number,
    // Keywords.
    And,
    Class,
    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,
    // Bookkeeping.
    Error,
    Eof,
}

/// A single scanned token. `lexeme` borrows directly from the source text
/// (or, for an [`TokenType::Error`] token, holds the diagnostic message).
#[derive(Debug, Clone, Copy)]
pub struct Token<'src> {
    pub kind: TokenType,
    pub lexeme: &'src str,
    pub line: u32,
}

pub struct Scanner<'src> {
    source: &'src [u8],
    /// Byte offset of the start of the token currently being scanned.
    start: usize,
    /// Byte offset of the next unconsumed byte.
    current: usize,
    line: u32,
}

impl<'src> Scanner<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn scan_token(&mut self) -> Token<'src> {
        self.skip_whitespace();
        self.start = self.current;

        if self.is_at_end() {
            return self.make_token(TokenType::Eof);
        }

        let c = self.advance();

        if is_alpha(c) {
            return self.identifier();
        }
        if c.is_ascii_digit() {
            return self.number();
        }

        match c {
            b'(' => self.make_token(TokenType::LeftParen),
            b')' => self.make_token(TokenType::RightParen),
            b'{' => self.make_token(TokenType::LeftBrace),
            b'}' => self.make_token(TokenType::RightBrace),
            b';' => self.make_token(TokenType::Semicolon),
            b',' => self.make_token(TokenType::Comma),
            b'.' => self.make_token(TokenType::Dot),
            b'-' => self.make_token(TokenType::Minus),
            b'+' => self.make_token(TokenType::Plus),
            b'/' => self.make_token(TokenType::Slash),
            b'*' => self.make_token(TokenType::Star),
            b'!' => {
                let kind = if self.matches(b'=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.make_token(kind)
            }
            b'=' => {
                let kind = if self.matches(b'=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.make_token(kind)
            }
            b'<' => {
                let kind = if self.matches(b'=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.make_token(kind)
            }
            b'>' => {
                let kind = if self.matches(b'=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.make_token(kind)
            }
            b'"' => self.string(),
            _ => self.error_token("Unexpected character."),
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> u8 {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.source.len() {
            0
        } else {
            self.source[self.current + 1]
        }
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn make_token(&self, kind: TokenType) -> Token<'src> {
        let lexeme = std::str::from_utf8(&self.source[self.start..self.current])
            .unwrap_or("<invalid utf-8>");
        Token {
            kind,
            lexeme,
            line: self.line,
        }
    }

    fn error_token(&self, message: &'static str) -> Token<'src> {
        Token {
            kind: TokenType::Error,
            lexeme: message,
            line: self.line,
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.advance();
                }
                b'\n' => {
                    self.line += 1;
                    self.advance();
                }
                b'/' if self.peek_next() == b'/' => {
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn string(&mut self) -> Token<'src> {
        while self.peek() != b'"' && !self.is_at_end() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.advance();
        }
        if self.is_at_end() {
            return self.error_token("Unterminated string.");
        }
        self.advance(); // closing quote
        self.make_token(TokenType::String)
    }

    fn number(&mut self) -> Token<'src> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        self.make_token(TokenType::Number)
    }

    fn identifier(&mut self) -> Token<'src> {
        while is_alpha(self.peek()) || self.peek().is_ascii_digit() {
            self.advance();
        }
        let kind = self.identifier_type();
        self.make_token(kind)
    }

    /// Hand-written keyword trie over the reserved-word set.
    fn identifier_type(&self) -> TokenType {
        let text = &self.source[self.start..self.current];
        match text.first() {
            Some(b'a') => self.check_keyword(1, "nd", TokenType::And),
            Some(b'c') => self.check_keyword(1, "lass", TokenType::Class),
            Some(b'e') => self.check_keyword(1, "lse", TokenType::Else),
            Some(b'f') if text.len() > 1 => match text[1] {
                b'a' => self.check_keyword(2, "lse", TokenType::False),
                b'o' => self.check_keyword(2, "r", TokenType::For),
                b'u' => self.check_keyword(2, "n", TokenType::Fun),
                _ => TokenType::Identifier,
            },
            Some(b'i') => self.check_keyword(1, "f", TokenType::If),
            Some(b'n') => self.check_keyword(1, "il", TokenType::Nil),
            Some(b'o') => self.check_keyword(1, "r", TokenType::Or),
            Some(b'p') => self.check_keyword(1, "rint", TokenType::Print),
            Some(b'r') => self.check_keyword(1, "eturn", TokenType::Return),
            Some(b's') => self.check_keyword(1, "uper", TokenType::Super),
            Some(b't') if text.len() > 1 => match text[1] {
                b'h' => self.check_keyword(2, "is", TokenType::This),
                b'r' => self.check_keyword(2, "ue", TokenType::True),
                _ => TokenType::Identifier,
            },
            Some(b'v') => self.check_keyword(1, "ar", TokenType::Var),
            Some(b'w') => self.check_keyword(1, "hile", TokenType::While),
            _ => TokenType::Identifier,
        }
    }

    fn check_keyword(&self, start: usize, rest: &str, kind: TokenType) -> TokenType {
        let text = &self.source[self.start..self.current];
        if text.len() == start + rest.len() && &text[start..] == rest.as_bytes() {
            kind
        } else {
            TokenType::Identifier
        }
    }
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenType> {
        let mut scanner = Scanner::new(src);
        let mut out = Vec::new();
        loop {
            let tok = scanner.scan_token();
            let done = tok.kind == TokenType::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn scans_arithmetic_expression() {
        let kinds = kinds("1 + 2 * 3;");
        assert_eq!(
            kinds,
            vec![
                TokenType::Number,
                TokenType::Plus,
                TokenType::Number,
                TokenType::Star,
                TokenType::Number,
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_recognized_and_identifiers_are_not_confused() {
        assert_eq!(kinds("classy"), vec![TokenType::Identifier, TokenType::Eof]);
        assert_eq!(kinds("class"), vec![TokenType::Class, TokenType::Eof]);
        assert_eq!(kinds("this that"), vec![TokenType::This, TokenType::Identifier, TokenType::Eof]);
    }

    #[test]
    fn tracks_line_numbers_across_newlines_and_multiline_strings() {
        let mut scanner = Scanner::new("var a = 1;\nvar b = \"line1\nline2\";\nprint b;");
        let mut last_line = 0;
        loop {
            let tok = scanner.scan_token();
            last_line = tok.line;
            if tok.kind == TokenType::Eof {
                break;
            }
        }
        assert_eq!(last_line, 3);
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let mut scanner = Scanner::new("\"never closed");
        let tok = scanner.scan_token();
        assert_eq!(tok.kind, TokenType::Error);
        assert_eq!(tok.lexeme, "Unterminated string.");
    }

    #[test]
    fn unknown_character_is_an_error_token() {
        let mut scanner = Scanner::new("@");
        let tok = scanner.scan_token();
        assert_eq!(tok.kind, TokenType::Error);
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(kinds("// all a comment\n1;"), vec![TokenType::Number, TokenType::Semicolon, TokenType::Eof]);
    }
}
