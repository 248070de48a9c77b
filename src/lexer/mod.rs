//! Line-oriented tokenizer for Pep/8 assembly.
//!
//! A deterministic scanner over [`Cursor`]: each call to
//! [`Cursor::advance_token`] consumes one token of the line, and `\n`
//! produces an [`TokenKind::Eol`] so the parser can restart its state
//! machine per line. Invalid input never panics the scanner; it yields an
//! [`TokenKind::Invalid`] token the parser turns into a diagnostic.

pub mod cursor;

use crate::isa::AddrMode;
use crate::symbol::{Span, SrcOffset};
use cursor::Cursor;

/// Maximum identifier and dot-command length.
pub const IDENT_LENGTH: usize = 8;
/// Maximum significant characters in a decimal constant (sign included).
pub const DEC_LENGTH: usize = 6;
/// Maximum hex digits in a hex constant.
pub const HEX_LENGTH: usize = 4;
/// Maximum source characters in a string literal.
pub const STRING_LENGTH: usize = 96;
/// Comments longer than this are truncated, not rejected.
pub const COMMENT_LENGTH: usize = 64;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// Bare identifier: a mnemonic or a symbol reference.
    Ident,
    /// Identifier immediately followed by `:`.
    SymbolDecl,
    /// `.` followed by letters.
    Dot,
    /// Decimal constant; range checks happen at the use site.
    Dec(i32),
    /// Hex constant `0x…`, at most four digits.
    Hex(u16),
    /// Character constant with its decoded byte.
    Char(u8),
    /// String literal with its decoded bytes.
    Str(Vec<u8>),
    /// `,` followed by an addressing-mode code.
    Mode(AddrMode),
    /// `;` to end of line; the span covers the comment text, truncated
    /// to [`COMMENT_LENGTH`] characters.
    Comment,
    /// End of line (or of input).
    Eol,
    Invalid(InvalidKind),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InvalidKind {
    Syntax,
    Mode,
    Char,
    Dec,
    Dot,
    Hex,
    Str,
}

/// Byte value of a single-character escape, shared by char and string
/// constants.
fn escape_byte(c: char) -> Option<u8> {
    match c {
        '\\' => Some(b'\\'),
        '\'' => Some(b'\''),
        '"' => Some(b'"'),
        'b' => Some(0x08),
        'f' => Some(0x0C),
        'n' => Some(0x0A),
        'r' => Some(0x0D),
        't' => Some(0x09),
        'v' => Some(0x0B),
        _ => None,
    }
}

fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

fn hex_value(c: char) -> u16 {
    c.to_digit(16).unwrap() as u16
}

impl<'src> Cursor<'src> {
    /// Scan the next token. Spaces and tabs separate tokens; `\n` is a
    /// token of its own.
    pub fn advance_token(&mut self) -> Token {
        self.take_while(|c| c == ' ' || c == '\t' || c == '\r');
        let start = self.pos();
        if self.is_eof() {
            return self.token(TokenKind::Eol, start);
        }
        match self.first() {
            '\n' => {
                self.bump();
                self.token(TokenKind::Eol, start)
            }
            ',' => self.scan_mode(start),
            '\'' => self.scan_char(start),
            ';' => self.scan_comment(),
            '.' => self.scan_dot(start),
            '"' => self.scan_string(start),
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_ident(start),
            '+' | '-' => self.scan_signed_dec(start),
            '0' if matches!(self.second(), 'x' | 'X') => self.scan_hex(start),
            c if c.is_ascii_digit() => self.scan_dec(start, String::new()),
            _ => {
                self.bump();
                self.token(TokenKind::Invalid(InvalidKind::Syntax), start)
            }
        }
    }

    /// Discard the remainder of the current line, the terminating `\n`
    /// included. Used for error recovery between lines.
    pub fn skip_to_eol(&mut self) {
        self.take_while(|c| c != '\n');
        self.bump();
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: Span::new(SrcOffset(start), self.pos() - start),
        }
    }

    fn scan_mode(&mut self, start: usize) -> Token {
        self.bump(); // comma
        self.take_while(|c| c == ' ' || c == '\t');
        let kind = match self.first().to_ascii_lowercase() {
            'i' | 'd' | 'n' | 'x' => {
                let c = self.bump().unwrap().to_ascii_lowercase();
                TokenKind::Mode(AddrMode::parse(&c.to_string()).unwrap())
            }
            's' => {
                self.bump();
                match self.first().to_ascii_lowercase() {
                    'f' => {
                        self.bump();
                        TokenKind::Mode(AddrMode::StackRelDef)
                    }
                    'x' => {
                        self.bump();
                        if self.first().to_ascii_lowercase() == 'f' {
                            self.bump();
                            TokenKind::Mode(AddrMode::StackIndexedDef)
                        } else {
                            TokenKind::Mode(AddrMode::StackIndexed)
                        }
                    }
                    _ => TokenKind::Mode(AddrMode::StackRel),
                }
            }
            _ => TokenKind::Invalid(InvalidKind::Mode),
        };
        self.token(kind, start)
    }

    fn scan_char(&mut self, start: usize) -> Token {
        self.bump(); // opening quote
        let byte = match self.first() {
            '\\' => {
                self.bump();
                match self.first() {
                    'x' | 'X' => {
                        self.bump();
                        let hi = self.first();
                        let lo = self.second();
                        if is_hex_digit(hi) && is_hex_digit(lo) {
                            self.bump();
                            self.bump();
                            Some((hex_value(hi) * 16 + hex_value(lo)) as u8)
                        } else {
                            None
                        }
                    }
                    c => {
                        let byte = escape_byte(c);
                        if byte.is_some() {
                            self.bump();
                        }
                        byte
                    }
                }
            }
            '\'' | '\n' => None,
            c if !self.is_eof() => {
                self.bump();
                Some((c as u32 & 0xFF) as u8)
            }
            _ => None,
        };
        let kind = match byte {
            Some(byte) if self.first() == '\'' => {
                self.bump();
                TokenKind::Char(byte)
            }
            _ => TokenKind::Invalid(InvalidKind::Char),
        };
        self.token(kind, start)
    }

    fn scan_comment(&mut self) -> Token {
        self.bump(); // semicolon
        let text_start = self.pos();
        let mut kept = 0;
        let mut text_end = text_start;
        // consume to end of line, but the token keeps at most
        // COMMENT_LENGTH characters
        while self.first() != '\n' && !self.is_eof() {
            self.bump();
            if kept < COMMENT_LENGTH {
                kept += 1;
                text_end = self.pos();
            }
        }
        Token {
            kind: TokenKind::Comment,
            span: Span::new(SrcOffset(text_start), text_end - text_start),
        }
    }

    fn scan_dot(&mut self, start: usize) -> Token {
        self.bump(); // dot
        if !self.first().is_ascii_alphabetic() {
            return self.token(TokenKind::Invalid(InvalidKind::Dot), start);
        }
        let mut len = 0;
        while self.first().is_ascii_alphanumeric() && len < IDENT_LENGTH {
            self.bump();
            len += 1;
        }
        self.token(TokenKind::Dot, start)
    }

    fn scan_string(&mut self, start: usize) -> Token {
        self.bump(); // opening quote
        let mut bytes = Vec::new();
        let mut src_len = 0;
        loop {
            match self.first() {
                '"' => {
                    self.bump();
                    // the empty string is not a valid literal
                    if bytes.is_empty() {
                        return self.token(TokenKind::Invalid(InvalidKind::Str), start);
                    }
                    return self.token(TokenKind::Str(bytes), start);
                }
                '\n' => return self.token(TokenKind::Invalid(InvalidKind::Str), start),
                _ if self.is_eof() || src_len >= STRING_LENGTH => {
                    return self.token(TokenKind::Invalid(InvalidKind::Str), start)
                }
                '\\' => {
                    self.bump();
                    src_len += 1;
                    match self.first() {
                        'x' | 'X' => {
                            self.bump();
                            src_len += 1;
                            let hi = self.first();
                            let lo = self.second();
                            if is_hex_digit(hi) && is_hex_digit(lo) {
                                self.bump();
                                self.bump();
                                src_len += 2;
                                bytes.push((hex_value(hi) * 16 + hex_value(lo)) as u8);
                            } else {
                                return self.token(TokenKind::Invalid(InvalidKind::Str), start);
                            }
                        }
                        c => match escape_byte(c) {
                            Some(byte) => {
                                self.bump();
                                src_len += 1;
                                bytes.push(byte);
                            }
                            None => {
                                return self.token(TokenKind::Invalid(InvalidKind::Str), start)
                            }
                        },
                    }
                }
                c => {
                    self.bump();
                    src_len += 1;
                    bytes.push((c as u32 & 0xFF) as u8);
                }
            }
        }
    }

    fn scan_ident(&mut self, start: usize) -> Token {
        let mut len = 0;
        while (self.first().is_ascii_alphanumeric() || self.first() == '_') && len < IDENT_LENGTH {
            self.bump();
            len += 1;
        }
        let name_end = self.pos();
        if self.first() == ':' {
            self.bump();
            return Token {
                kind: TokenKind::SymbolDecl,
                span: Span::new(SrcOffset(start), name_end - start),
            };
        }
        self.token(TokenKind::Ident, start)
    }

    fn scan_signed_dec(&mut self, start: usize) -> Token {
        let sign = self.bump().unwrap();
        let mut text = String::new();
        if sign == '-' {
            text.push('-');
        }
        // a zero right after the sign ends the constant
        if self.first() == '0' {
            self.bump();
            return self.token(TokenKind::Dec(0), start);
        }
        if !self.first().is_ascii_digit() {
            return self.token(TokenKind::Invalid(InvalidKind::Dec), start);
        }
        self.scan_dec(start, text)
    }

    fn scan_dec(&mut self, start: usize, mut text: String) -> Token {
        while self.first().is_ascii_digit() && text.len() < DEC_LENGTH {
            text.push(self.bump().unwrap());
        }
        let value: i32 = text.parse().expect("scanned digits always parse");
        self.token(TokenKind::Dec(value), start)
    }

    fn scan_hex(&mut self, start: usize) -> Token {
        self.bump(); // 0
        self.bump(); // x
        if !is_hex_digit(self.first()) {
            return self.token(TokenKind::Invalid(InvalidKind::Hex), start);
        }
        let mut value: u16 = 0;
        let mut digits = 0;
        while is_hex_digit(self.first()) && digits < HEX_LENGTH {
            value = (value << 4) | hex_value(self.bump().unwrap());
            digits += 1;
        }
        self.token(TokenKind::Hex(value), start)
    }
}
