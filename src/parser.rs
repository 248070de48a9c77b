//! Per-line parse state machine and assembler first pass.
//!
//! Each source line restarts the state machine at [`LineState::Start`];
//! exactly one statement record or one error comes out of every line. The
//! first pass assigns addresses as it goes and keeps a list of symbol
//! references that were not yet declared; those are resolved after the last
//! line, when the symbol table is complete.

use crate::air::{Air, AsmLine, Burn, CommentLine, Operand, OperandKind, Stmt};
use crate::error::{AsmError, ErrorKind};
use crate::isa::{Mnemonic, MnemonClass};
use crate::lexer::cursor::Cursor;
use crate::lexer::{InvalidKind, TokenKind};
use crate::symbol::{Span, SrcOffset, SymbolTable};
use crate::trap::TrapRegistry;

/// Source lines beyond this overflow the listing.
const MAX_LINES: usize = 4096;
/// Ceiling on the first-pass address counter.
const CODE_MAX_SIZE: u16 = 32768;

/// Maximum signed/unsigned word operand.
const MIN_DEC: i32 = -32768;
const MAX_DEC: i32 = 65535;
const MIN_BYTE: i32 = -256;
const MAX_BYTE: i32 = 255;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Dot {
    Addrss,
    Ascii,
    Block,
    Burn,
    Byte,
    End,
    Equate,
    Word,
}

impl Dot {
    fn lookup(name: &str) -> Option<Dot> {
        match name.to_ascii_uppercase().as_str() {
            "ADDRSS" => Some(Dot::Addrss),
            "ASCII" => Some(Dot::Ascii),
            "BLOCK" => Some(Dot::Block),
            "BURN" => Some(Dot::Burn),
            "BYTE" => Some(Dot::Byte),
            "END" => Some(Dot::End),
            "EQUATE" => Some(Dot::Equate),
            "WORD" => Some(Dot::Word),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum LineState {
    Start,
    SymbolDecl,
    Instruction,
    OperandDec,
    OperandHex,
    OperandChar,
    OperandStr,
    OperandSym,
    DotCommand,
    Ascii,
    Equate,
    Close,
    Comment,
}

/// Transforms source text into AIR.
pub struct AsmParser<'a> {
    src: &'a str,
    cur: Cursor<'a>,
    traps: &'a TrapRegistry,
    /// Current source line, zero-based.
    line: usize,
    /// First-pass address counter.
    addr: u16,
    lines: Vec<AsmLine>,
    symtab: SymbolTable,
    comments: Vec<CommentLine>,
    burn: Option<Burn>,
    /// Symbol references to check once the table is complete.
    undeclared: Vec<(usize, Span, String)>,
    errors: Vec<AsmError>,
    reached_end: bool,
    overflowed: bool,
}

/// Assemble a complete source text against the given trap registry.
pub fn assemble(src: &str, traps: &TrapRegistry) -> Result<Air, Vec<AsmError>> {
    AsmParser::new(src, traps).assemble()
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str, traps: &'a TrapRegistry) -> Self {
        AsmParser {
            src,
            cur: Cursor::new(src),
            traps,
            line: 0,
            addr: 0,
            lines: Vec::new(),
            symtab: SymbolTable::new(),
            comments: Vec::new(),
            burn: None,
            undeclared: Vec::new(),
            errors: Vec::new(),
            reached_end: false,
            overflowed: false,
        }
    }

    /// Run the first pass and post-pass resolution. Errors never abort a
    /// line early enough to hide later lines; everything found in one run
    /// is reported together.
    pub fn assemble(mut self) -> Result<Air, Vec<AsmError>> {
        while !self.cur.is_eof() && !self.reached_end && !self.overflowed {
            self.parse_line();
            self.line += 1;
            self.check_overflow();
        }
        if !self.reached_end && !self.overflowed {
            let at = self.src.len().saturating_sub(1);
            self.errors.push(AsmError::new(
                self.line,
                Span::new(SrcOffset(at), self.src.len() - at),
                ErrorKind::MissingEnd,
            ));
        }
        for (line, span, name) in &self.undeclared {
            if !self.symtab.contains(name) {
                self.errors
                    .push(AsmError::new(*line, *span, ErrorKind::UndefinedSymbol));
            }
        }
        if !self.errors.is_empty() {
            self.errors.sort_by_key(|e| e.line);
            return Err(self.errors);
        }
        let mut air = Air {
            lines: self.lines,
            symtab: self.symtab,
            comments: self.comments,
            burn: self.burn,
            end_addr: self.addr,
        };
        air.relocate_burn();
        Ok(air)
    }

    fn check_overflow(&mut self) {
        if self.lines.len() >= MAX_LINES {
            self.errors.push(AsmError::new(
                self.line,
                Span::dummy(),
                ErrorKind::ListingOverflow,
            ));
            self.overflowed = true;
        } else if self.addr >= CODE_MAX_SIZE - 2 {
            self.errors.push(AsmError::new(
                self.line,
                Span::dummy(),
                ErrorKind::CodeOverflow,
            ));
            self.overflowed = true;
        }
    }

    fn span_text(&self, span: Span) -> &'a str {
        &self.src[span.as_range()]
    }

    /// Record an error, emit a placeholder line, and resynchronize at the
    /// next line so the rest of the file still gets checked.
    fn error_line(&mut self, span: Span, kind: ErrorKind, at_eol: bool, start_addr: u16) {
        self.errors.push(AsmError::new(self.line, span, kind));
        self.lines.push(AsmLine {
            line: self.line,
            addr: start_addr,
            stmt: Stmt::Empty,
        });
        if !at_eol {
            self.cur.skip_to_eol();
        }
    }

    /// One source line through the state machine.
    fn parse_line(&mut self) {
        use LineState::*;

        let start_addr = self.addr;
        let mut state = Start;
        let mut label: Option<(String, Span)> = None;
        let mut mnemon: Option<Mnemonic> = None;
        let mut dot = Dot::End;
        let mut operand: Option<Operand> = None;
        let mut stmt: Option<Stmt> = None;

        macro_rules! fail {
            ($span:expr, $kind:expr, $at_eol:expr) => {{
                self.error_line($span, $kind, $at_eol, start_addr);
                return;
            }};
        }

        loop {
            let tok = self.cur.advance_token();
            let at_eol = tok.kind == TokenKind::Eol;
            match state {
                Start | SymbolDecl => match tok.kind {
                    TokenKind::Ident => {
                        let name = self.span_text(tok.span);
                        match Mnemonic::lookup(name, self.traps) {
                            Some(mn) if mn.is_unary(self.traps) => {
                                stmt = Some(Stmt::Unary { opcode: mn.opcode });
                                self.addr = self.addr.wrapping_add(1);
                                state = Close;
                            }
                            Some(mn) => {
                                mnemon = Some(mn);
                                state = Instruction;
                            }
                            None => fail!(tok.span, ErrorKind::InvalidMnemonic, at_eol),
                        }
                    }
                    TokenKind::Dot => {
                        let name = &self.span_text(tok.span)[1..];
                        match Dot::lookup(name) {
                            Some(Dot::End) => {
                                stmt = Some(Stmt::End);
                                self.reached_end = true;
                                state = Close;
                            }
                            Some(Dot::Ascii) => state = Ascii,
                            Some(Dot::Equate) if state == SymbolDecl => state = Equate,
                            Some(d) => {
                                dot = d;
                                state = DotCommand;
                            }
                            None => fail!(tok.span, ErrorKind::InvalidDot, at_eol),
                        }
                    }
                    TokenKind::SymbolDecl if state == Start => {
                        let name = self.span_text(tok.span).to_string();
                        if self
                            .symtab
                            .declare(&name, self.line, self.addr)
                            .is_err()
                        {
                            fail!(tok.span, ErrorKind::SymbolPrevDefined, at_eol);
                        }
                        label = Some((name, tok.span));
                        state = SymbolDecl;
                    }
                    TokenKind::Eol if state == Start => {
                        stmt = Some(Stmt::Empty);
                        break;
                    }
                    TokenKind::Comment if state == Start => {
                        self.comments.push(CommentLine {
                            line: self.line,
                            span: tok.span,
                            on_code: false,
                        });
                        state = Comment;
                    }
                    TokenKind::Invalid(InvalidKind::Syntax) => {
                        fail!(tok.span, ErrorKind::InvalidSyntax, at_eol)
                    }
                    _ if state == Start => {
                        fail!(tok.span, ErrorKind::SymbolInstrDotExpected, at_eol)
                    }
                    _ => fail!(tok.span, ErrorKind::InstrDotExpected, at_eol),
                },
                Instruction => {
                    match tok.kind {
                        TokenKind::Ident => {
                            let name = self.span_text(tok.span).to_string();
                            operand =
                                Some(Operand::new(OperandKind::Sym(name), tok.span));
                            state = OperandSym;
                        }
                        TokenKind::Hex(v) => {
                            operand = Some(Operand::new(OperandKind::Hex(v), tok.span));
                            state = OperandHex;
                        }
                        TokenKind::Dec(v) => {
                            if !(MIN_DEC..=MAX_DEC).contains(&v) {
                                fail!(tok.span, ErrorKind::DecRange, at_eol);
                            }
                            operand = Some(Operand::new(OperandKind::Dec(v), tok.span));
                            state = OperandDec;
                        }
                        TokenKind::Char(b) => {
                            operand = Some(Operand::new(OperandKind::Char(b), tok.span));
                            state = OperandChar;
                        }
                        TokenKind::Str(bytes) => {
                            if bytes.len() > 2 {
                                fail!(tok.span, ErrorKind::StringTooLongOperand, at_eol);
                            }
                            operand =
                                Some(Operand::new(OperandKind::Str(bytes), tok.span));
                            state = OperandStr;
                        }
                        TokenKind::Invalid(kind) => {
                            fail!(tok.span, Self::invalid_error(kind), at_eol)
                        }
                        _ => fail!(tok.span, ErrorKind::OperandExpected, at_eol),
                    }
                }
                OperandDec | OperandHex | OperandChar | OperandStr | OperandSym => {
                    let mn = mnemon.expect("operand state always has a mnemonic");
                    match tok.kind {
                        TokenKind::Mode(mode) => {
                            if !mn.allows(mode, self.traps) {
                                fail!(tok.span, ErrorKind::IllegalMode, at_eol);
                            }
                            let operand =
                                operand.take().expect("operand state always has one");
                            if let OperandKind::Sym(name) = &operand.kind {
                                self.undeclared.push((
                                    self.line,
                                    operand.span,
                                    name.clone(),
                                ));
                            }
                            let opcode = mn.opcode
                                + mode.opcode_offset(mn.mode_optional());
                            stmt = Some(Stmt::NonUnary {
                                opcode,
                                operand,
                                mode: Some(mode),
                            });
                            self.addr = self.addr.wrapping_add(3);
                            state = Close;
                        }
                        TokenKind::Invalid(InvalidKind::Syntax) => {
                            fail!(tok.span, ErrorKind::InvalidSyntax, at_eol)
                        }
                        _ if matches!(state, OperandChar) && mn.mode_optional() => {
                            fail!(tok.span, ErrorKind::ModeRequiredChar, at_eol)
                        }
                        _ if matches!(state, OperandStr) && mn.mode_optional() => {
                            fail!(tok.span, ErrorKind::ModeRequiredString, at_eol)
                        }
                        TokenKind::Eol | TokenKind::Comment if mn.mode_optional() => {
                            // branches default to immediate
                            let operand =
                                operand.take().expect("operand state always has one");
                            if let OperandKind::Sym(name) = &operand.kind {
                                self.undeclared.push((
                                    self.line,
                                    operand.span,
                                    name.clone(),
                                ));
                            }
                            stmt = Some(Stmt::NonUnary {
                                opcode: mn.opcode,
                                operand,
                                mode: None,
                            });
                            self.addr = self.addr.wrapping_add(3);
                            if tok.kind == TokenKind::Comment {
                                self.comments.push(CommentLine {
                                    line: self.line,
                                    span: tok.span,
                                    on_code: true,
                                });
                                state = Comment;
                            } else {
                                break;
                            }
                        }
                        _ if mn.mode_optional() => {
                            fail!(tok.span, ErrorKind::ModeOrCommentExpected, at_eol)
                        }
                        _ => fail!(tok.span, ErrorKind::ModeExpected, at_eol),
                    }
                }
                DotCommand => match tok.kind {
                    TokenKind::Ident => {
                        let name = self.span_text(tok.span).to_string();
                        match dot {
                            Dot::Addrss => {
                                self.undeclared.push((self.line, tok.span, name.clone()));
                                stmt = Some(Stmt::Addrss {
                                    operand: Operand::new(OperandKind::Sym(name), tok.span),
                                });
                                self.addr = self.addr.wrapping_add(2);
                                state = Close;
                            }
                            Dot::Equate => {
                                fail!(tok.span, ErrorKind::SymbolBeforeEquate, at_eol)
                            }
                            _ => fail!(tok.span, ErrorKind::ConstantExpected, at_eol),
                        }
                    }
                    TokenKind::Hex(v) => {
                        let operand = Operand::new(OperandKind::Hex(v), tok.span);
                        match dot {
                            Dot::Addrss => {
                                fail!(tok.span, ErrorKind::SymbolAfterAddrss, at_eol)
                            }
                            Dot::Block => {
                                if v > MAX_BYTE as u16 {
                                    fail!(tok.span, ErrorKind::BlockRange, at_eol);
                                }
                                stmt = Some(Stmt::Block { len: v, operand });
                                self.addr = self.addr.wrapping_add(v);
                                state = Close;
                            }
                            Dot::Burn => {
                                if self.burn.is_some() {
                                    fail!(tok.span, ErrorKind::DuplicateBurn, at_eol);
                                }
                                self.burn = Some(Burn {
                                    addr: start_addr,
                                    target: v,
                                });
                                stmt = Some(Stmt::Burn { operand });
                                state = Close;
                            }
                            Dot::Byte => {
                                if v > MAX_BYTE as u16 {
                                    fail!(tok.span, ErrorKind::ByteRange, at_eol);
                                }
                                stmt = Some(Stmt::Byte {
                                    value: v as u8,
                                    operand,
                                });
                                self.addr = self.addr.wrapping_add(1);
                                state = Close;
                            }
                            Dot::Equate => {
                                fail!(tok.span, ErrorKind::SymbolBeforeEquate, at_eol)
                            }
                            Dot::Word => {
                                stmt = Some(Stmt::Word { operand });
                                self.addr = self.addr.wrapping_add(2);
                                state = Close;
                            }
                            Dot::Ascii | Dot::End => unreachable!(),
                        }
                    }
                    TokenKind::Dec(v) => {
                        let operand = Operand::new(OperandKind::Dec(v), tok.span);
                        match dot {
                            Dot::Addrss => {
                                fail!(tok.span, ErrorKind::SymbolAfterAddrss, at_eol)
                            }
                            Dot::Block => {
                                if !(0..=MAX_BYTE).contains(&v) {
                                    fail!(tok.span, ErrorKind::BlockRange, at_eol);
                                }
                                stmt = Some(Stmt::Block {
                                    len: v as u16,
                                    operand,
                                });
                                self.addr = self.addr.wrapping_add(v as u16);
                                state = Close;
                            }
                            Dot::Burn => {
                                if self.burn.is_some() {
                                    fail!(tok.span, ErrorKind::DuplicateBurn, at_eol);
                                }
                                if !(0..=MAX_DEC).contains(&v) {
                                    fail!(tok.span, ErrorKind::AddrRange, at_eol);
                                }
                                self.burn = Some(Burn {
                                    addr: start_addr,
                                    target: v as u16,
                                });
                                stmt = Some(Stmt::Burn { operand });
                                state = Close;
                            }
                            Dot::Byte => {
                                if !(MIN_BYTE..=MAX_BYTE).contains(&v) {
                                    fail!(tok.span, ErrorKind::ByteRange, at_eol);
                                }
                                stmt = Some(Stmt::Byte {
                                    value: (v & 0xFF) as u8,
                                    operand,
                                });
                                self.addr = self.addr.wrapping_add(1);
                                state = Close;
                            }
                            Dot::Equate => {
                                if !(MIN_DEC..=MAX_DEC).contains(&v) {
                                    fail!(tok.span, ErrorKind::DecRange, at_eol);
                                }
                                fail!(tok.span, ErrorKind::SymbolBeforeEquate, at_eol)
                            }
                            Dot::Word => {
                                if !(MIN_DEC..=MAX_DEC).contains(&v) {
                                    fail!(tok.span, ErrorKind::DecRange, at_eol);
                                }
                                stmt = Some(Stmt::Word { operand });
                                self.addr = self.addr.wrapping_add(2);
                                state = Close;
                            }
                            Dot::Ascii | Dot::End => unreachable!(),
                        }
                    }
                    TokenKind::Char(b) => {
                        let operand = Operand::new(OperandKind::Char(b), tok.span);
                        match dot {
                            Dot::Addrss => {
                                fail!(tok.span, ErrorKind::SymbolAfterAddrss, at_eol)
                            }
                            Dot::Block | Dot::Burn => {
                                fail!(tok.span, ErrorKind::DecHexExpected, at_eol)
                            }
                            Dot::Byte => {
                                stmt = Some(Stmt::Byte { value: b, operand });
                                self.addr = self.addr.wrapping_add(1);
                                state = Close;
                            }
                            Dot::Word => {
                                stmt = Some(Stmt::Word { operand });
                                self.addr = self.addr.wrapping_add(2);
                                state = Close;
                            }
                            Dot::Equate => {
                                fail!(tok.span, ErrorKind::SymbolBeforeEquate, at_eol)
                            }
                            Dot::Ascii | Dot::End => unreachable!(),
                        }
                    }
                    TokenKind::Str(bytes) => {
                        let len = bytes.len();
                        let operand = Operand::new(OperandKind::Str(bytes), tok.span);
                        match dot {
                            Dot::Addrss => {
                                fail!(tok.span, ErrorKind::SymbolAfterAddrss, at_eol)
                            }
                            Dot::Block | Dot::Burn => {
                                fail!(tok.span, ErrorKind::DecHexExpected, at_eol)
                            }
                            Dot::Byte => {
                                if len != 1 {
                                    fail!(tok.span, ErrorKind::StringTooLongByte, at_eol);
                                }
                                let value = operand.low_byte(&self.symtab);
                                stmt = Some(Stmt::Byte { value, operand });
                                self.addr = self.addr.wrapping_add(1);
                                state = Close;
                            }
                            Dot::Word => {
                                if len > 2 {
                                    fail!(tok.span, ErrorKind::StringTooLongWord, at_eol);
                                }
                                stmt = Some(Stmt::Word { operand });
                                self.addr = self.addr.wrapping_add(2);
                                state = Close;
                            }
                            Dot::Equate => {
                                fail!(tok.span, ErrorKind::SymbolBeforeEquate, at_eol)
                            }
                            Dot::Ascii | Dot::End => unreachable!(),
                        }
                    }
                    TokenKind::Invalid(kind) => {
                        fail!(tok.span, Self::invalid_error(kind), at_eol)
                    }
                    _ => fail!(tok.span, ErrorKind::ConstantExpected, at_eol),
                },
                Ascii => match tok.kind {
                    TokenKind::Str(bytes) => {
                        let len = bytes.len() as u16;
                        stmt = Some(Stmt::Ascii {
                            operand: Operand::new(OperandKind::Str(bytes), tok.span),
                        });
                        self.addr = self.addr.wrapping_add(len);
                        state = Close;
                    }
                    _ => fail!(tok.span, ErrorKind::InvalidString, at_eol),
                },
                Equate => {
                    let (name, _) = label.clone().expect("equate state always has a label");
                    let (value, operand) = match tok.kind {
                        TokenKind::Hex(v) => {
                            (v, Operand::new(OperandKind::Hex(v), tok.span))
                        }
                        TokenKind::Dec(v) => {
                            if !(MIN_DEC..=MAX_DEC).contains(&v) {
                                fail!(tok.span, ErrorKind::DecRange, at_eol);
                            }
                            (
                                (v as u32 & 0xFFFF) as u16,
                                Operand::new(OperandKind::Dec(v), tok.span),
                            )
                        }
                        TokenKind::Char(b) => {
                            (b as u16, Operand::new(OperandKind::Char(b), tok.span))
                        }
                        TokenKind::Str(bytes) => {
                            if bytes.len() > 2 {
                                fail!(tok.span, ErrorKind::StringTooLongEquate, at_eol);
                            }
                            let operand =
                                Operand::new(OperandKind::Str(bytes), tok.span);
                            (operand.word(&self.symtab), operand)
                        }
                        _ => fail!(tok.span, ErrorKind::InvalidSyntax, at_eol),
                    };
                    self.symtab.equate(&name, value);
                    stmt = Some(Stmt::Equate { operand });
                    state = Close;
                }
                Close => match tok.kind {
                    TokenKind::Eol => break,
                    TokenKind::Comment => {
                        self.comments.push(CommentLine {
                            line: self.line,
                            span: tok.span,
                            on_code: true,
                        });
                        state = Comment;
                    }
                    TokenKind::Invalid(InvalidKind::Syntax) => {
                        fail!(tok.span, ErrorKind::InvalidSyntax, at_eol)
                    }
                    TokenKind::Dec(_)
                    | TokenKind::Hex(_)
                    | TokenKind::Char(_)
                    | TokenKind::Str(_) => {
                        fail!(tok.span, ErrorKind::UnexpectedOperand, at_eol)
                    }
                    _ => fail!(tok.span, ErrorKind::CommentExpected, at_eol),
                },
                Comment => match tok.kind {
                    TokenKind::Eol => break,
                    _ => fail!(tok.span, ErrorKind::CommentExpected, at_eol),
                },
            }
        }

        self.lines.push(AsmLine {
            line: self.line,
            addr: start_addr,
            stmt: stmt.unwrap_or(Stmt::Empty),
        });
    }

    fn invalid_error(kind: InvalidKind) -> ErrorKind {
        match kind {
            InvalidKind::Syntax => ErrorKind::InvalidSyntax,
            InvalidKind::Mode => ErrorKind::InvalidMode,
            InvalidKind::Char => ErrorKind::InvalidChar,
            InvalidKind::Dec => ErrorKind::InvalidDec,
            InvalidKind::Dot => ErrorKind::InvalidDot,
            InvalidKind::Hex => ErrorKind::InvalidHex,
            InvalidKind::Str => ErrorKind::InvalidString,
        }
    }
}
