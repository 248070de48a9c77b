//! The closed set of assembly diagnostics.
//!
//! Errors are plain values collected during the pass; nothing in the
//! assembler unwinds. Rendering goes through miette so each error carries a
//! stable code, a help string, and a label into the source line.

use miette::{miette, LabeledSpan, Report, Severity};

use crate::symbol::Span;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    MissingEnd,
    ListingOverflow,
    CodeOverflow,
    SymbolPrevDefined,
    InvalidMnemonic,
    InvalidSyntax,
    SymbolInstrDotExpected,
    InstrDotExpected,
    CommentExpected,
    OperandExpected,
    InvalidDec,
    InvalidHex,
    InvalidChar,
    InvalidString,
    InvalidMode,
    InvalidDot,
    ModeExpected,
    ModeOrCommentExpected,
    IllegalMode,
    DecRange,
    ByteRange,
    BlockRange,
    AddrRange,
    UndefinedSymbol,
    DuplicateBurn,
    StringTooLongOperand,
    StringTooLongByte,
    StringTooLongWord,
    StringTooLongEquate,
    UnexpectedOperand,
    ModeRequiredChar,
    ModeRequiredString,
    SymbolAfterAddrss,
    SymbolBeforeEquate,
    DecHexExpected,
    ConstantExpected,
}

impl ErrorKind {
    pub fn message(self) -> &'static str {
        use ErrorKind::*;
        match self {
            MissingEnd => "Missing .END sentinel.",
            ListingOverflow => "Program too long. Listing table overflow.",
            CodeOverflow => "Program too long. Code table overflow.",
            SymbolPrevDefined => "Symbol previously defined.",
            InvalidMnemonic => "Invalid mnemonic.",
            InvalidSyntax => "Invalid syntax.",
            SymbolInstrDotExpected => "Symbol, instruction, or dot command expected.",
            InstrDotExpected => "Instruction or dot command expected.",
            CommentExpected => "Comment expected.",
            OperandExpected => "Operand specifier expected.",
            InvalidDec => "Invalid decimal constant.",
            InvalidHex => "Invalid hexadecimal constant.",
            InvalidChar => "Invalid character constant.",
            InvalidString => "Invalid string expression.",
            InvalidMode => "Invalid addressing mode.",
            InvalidDot => "Invalid dot command.",
            ModeExpected => "Addressing mode expected.",
            ModeOrCommentExpected => "Addressing mode or comment expected.",
            IllegalMode => "This instruction cannot have this addressing mode.",
            DecRange => "Decimal overflow. Range is -32768 to 65535.",
            ByteRange => "Byte value out of range.",
            BlockRange => "Constant overflow. Range is 0 to 255 (dec).",
            AddrRange => "Address overflow. Range is 0 to 65535 (dec).",
            UndefinedSymbol => "Reference to undefined symbol.",
            DuplicateBurn => "More than one .BURN pseudo-op not allowed in program.",
            StringTooLongOperand => "The string is too long to be a valid operand.",
            StringTooLongByte => "The string is too long to be used with .BYTE pseudo-op.",
            StringTooLongWord => "The string is too long to be used with .WORD pseudo-op.",
            StringTooLongEquate => "The string is too long to be used with .EQUATE pseudo-op.",
            UnexpectedOperand => "Unexpected operand specifier.",
            ModeRequiredChar => "Addressing mode always required with char constant operands.",
            ModeRequiredString => "Addressing mode always required with string operands.",
            SymbolAfterAddrss => "Symbol required after .ADDRSS pseudo-op.",
            SymbolBeforeEquate => "Symbol required before .EQUATE pseudo-op.",
            DecHexExpected => "Decimal or hex constant expected.",
            ConstantExpected => "Constant expected.",
        }
    }

    fn code(self) -> &'static str {
        use ErrorKind::*;
        match self {
            MissingEnd => "asm::missing_end",
            ListingOverflow | CodeOverflow => "asm::overflow",
            SymbolPrevDefined => "asm::duplicate_symbol",
            InvalidMnemonic => "asm::mnemonic",
            InvalidSyntax | SymbolInstrDotExpected | InstrDotExpected | CommentExpected
            | OperandExpected | ModeExpected | ModeOrCommentExpected | UnexpectedOperand
            | DecHexExpected | ConstantExpected => "asm::syntax",
            InvalidDec | InvalidHex | InvalidChar | InvalidString | InvalidDot => "asm::literal",
            InvalidMode | IllegalMode | ModeRequiredChar | ModeRequiredString => "asm::addr_mode",
            DecRange | ByteRange | BlockRange | AddrRange => "asm::range",
            UndefinedSymbol => "asm::undefined_symbol",
            DuplicateBurn => "asm::burn",
            StringTooLongOperand | StringTooLongByte | StringTooLongWord | StringTooLongEquate => {
                "asm::string_length"
            }
            SymbolAfterAddrss | SymbolBeforeEquate => "asm::symbol_required",
        }
    }

    fn help(self) -> &'static str {
        use ErrorKind::*;
        match self {
            MissingEnd => "every program must close with the .END sentinel",
            SymbolPrevDefined => "a symbol may be declared only once per program",
            InvalidMnemonic => "check the instruction set and the trap table for valid mnemonics",
            UndefinedSymbol => "declare the symbol with `name:` or .EQUATE before or after use",
            DuplicateBurn => "only the operating system source uses .BURN, and only once",
            IllegalMode => "check the addressing modes this instruction accepts",
            ModeRequiredChar | ModeRequiredString => {
                "append an addressing mode such as `,i` after the operand"
            }
            DecRange | ByteRange | BlockRange | AddrRange => {
                "use a constant inside the stated range"
            }
            _ => "see the Pep/8 assembly language reference",
        }
    }
}

/// One assembly error, bound to its source line.
#[derive(Clone, Debug)]
pub struct AsmError {
    /// Zero-based source line index.
    pub line: usize,
    pub span: Span,
    pub kind: ErrorKind,
}

impl AsmError {
    pub fn new(line: usize, span: Span, kind: ErrorKind) -> Self {
        AsmError { line, span, kind }
    }

    /// Render with source context for terminal output.
    pub fn report(&self, src: &str) -> Report {
        miette!(
            severity = Severity::Error,
            code = self.kind.code(),
            help = self.kind.help(),
            labels = vec![LabeledSpan::at(self.span, "here")],
            "Error on line {}: {}",
            self.line + 1,
            self.kind.message(),
        )
        .with_source_code(src.to_string())
    }
}
