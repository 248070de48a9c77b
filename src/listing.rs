//! Assembler listing (`.pepl`) generation.
//!
//! Fixed-column, human-facing text: address, object code, symbol
//! declaration, mnemonic, operand as written, comment; closed by a symbol
//! table sorted by identifier. Long `.BLOCK` and `.ASCII` statements spill
//! their object bytes onto continuation rows of three bytes each.

use std::io::{self, Write};

use crate::air::{Air, AsmLine, Operand, OperandKind, Stmt};
use crate::isa::Op;
use crate::trap::TrapRegistry;

/// Object-code column width in hex digits (three bytes per row).
const OBJ_DIGITS: usize = 6;
/// Operand column width.
const OPERAND_SPACES: usize = 14;
/// Comment width when sharing a line with code, with and without the
/// symbol column present. Whole-line comments use the lexer's cap.
const COMMENT_ON_CODE: usize = 34;
const COMMENT_ON_CODE_NO_SYMBOLS: usize = 43;

pub fn write_listing<W: Write>(
    w: &mut W,
    air: &Air,
    src: &str,
    traps: &TrapRegistry,
) -> io::Result<()> {
    let rule = "-".repeat(79);
    let has_symbols = !air.symtab.is_empty();
    writeln!(w, "{rule}")?;
    writeln!(w, "      Object")?;
    if has_symbols {
        writeln!(w, "Addr  code   Symbol   Mnemon  Operand       Comment")?;
    } else {
        writeln!(w, "Addr  code   Mnemon  Operand       Comment")?;
    }
    writeln!(w, "{rule}")?;
    for line in &air.lines {
        write_line(w, air, line, src, traps, has_symbols)?;
    }
    writeln!(w, "{rule}")?;
    if has_symbols {
        write_symbol_table(w, air)?;
    }
    Ok(())
}

fn write_line<W: Write>(
    w: &mut W,
    air: &Air,
    line: &AsmLine,
    src: &str,
    traps: &TrapRegistry,
    has_symbols: bool,
) -> io::Result<()> {
    if matches!(line.stmt, Stmt::Empty) {
        write!(w, "             ")?;
        write_comment(w, air, line.line, src, has_symbols)?;
        return writeln!(w);
    }

    // address column: .EQUATE lines occupy no address
    if matches!(line.stmt, Stmt::Equate { .. }) {
        write!(w, "      ")?;
    } else {
        write!(w, "{:04X}  ", line.addr)?;
    }

    // object-code column, blanked ahead of a .BURN
    if air.emits_object(line) {
        write!(w, "{}", object_column(line, &air.symtab))?;
    } else {
        write!(w, "       ")?;
    }

    // symbol column, only present when the program declares symbols
    if has_symbols {
        match air.symtab.declared_on(line.line) {
            Some(name) => write!(w, "{name}:{}", " ".repeat(8 - name.len()))?,
            None => write!(w, "         ")?,
        }
    }

    write!(w, "{}", mnemonic_column(&line.stmt, traps))?;
    write!(w, "{}", operand_column(&line.stmt, src))?;
    write_comment(w, air, line.line, src, has_symbols)?;
    writeln!(w)?;

    // continuation rows for object code past the first three bytes
    if air.emits_object(line) {
        match &line.stmt {
            Stmt::Block { len, .. } if *len > 3 => {
                write_continuation(w, &vec![0u8; *len as usize][3..])?;
            }
            Stmt::Ascii { operand } => {
                if let OperandKind::Str(bytes) = &operand.kind {
                    if bytes.len() > 3 {
                        write_continuation(w, &bytes[3..])?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Up to three object bytes, padded to seven columns.
fn object_column(line: &AsmLine, symtab: &crate::symbol::SymbolTable) -> String {
    let text = match &line.stmt {
        Stmt::End | Stmt::Burn { .. } | Stmt::Equate { .. } => String::new(),
        Stmt::Block { len, .. } => "00".repeat((*len).min(3) as usize),
        stmt => {
            let bytes = stmt.bytes(symtab);
            bytes
                .iter()
                .take(3)
                .map(|b| format!("{b:02X}"))
                .collect()
        }
    };
    format!("{text:<7}")
}

fn mnemonic_column(stmt: &Stmt, traps: &TrapRegistry) -> String {
    let text = match stmt {
        Stmt::Unary { opcode } | Stmt::NonUnary { opcode, .. } => Op::mnemonic(*opcode, traps),
        Stmt::End => ".END".into(),
        Stmt::Block { .. } => ".BLOCK".into(),
        Stmt::Burn { .. } => ".BURN".into(),
        Stmt::Byte { .. } => ".BYTE".into(),
        Stmt::Word { .. } => ".WORD".into(),
        Stmt::Ascii { .. } => ".ASCII".into(),
        Stmt::Addrss { .. } => ".ADDRSS".into(),
        Stmt::Equate { .. } => ".EQUATE".into(),
        Stmt::Empty => String::new(),
    };
    format!("{text:<8}")
}

/// The operand as originally written (hex normalized to four digits),
/// padded to the operand column width.
fn operand_column(stmt: &Stmt, src: &str) -> String {
    let text = match stmt {
        Stmt::Unary { .. } | Stmt::End | Stmt::Empty => String::new(),
        Stmt::NonUnary { operand, mode, .. } => {
            let mut text = operand_text(operand, src, false);
            if let Some(mode) = mode {
                text.push(',');
                text.push_str(mode.suffix());
            }
            text
        }
        Stmt::Byte { operand, .. } => operand_text(operand, src, true),
        Stmt::Block { operand, .. }
        | Stmt::Burn { operand }
        | Stmt::Word { operand }
        | Stmt::Ascii { operand }
        | Stmt::Addrss { operand }
        | Stmt::Equate { operand } => operand_text(operand, src, false),
    };
    if text.len() < OPERAND_SPACES {
        format!("{:<1$}", text, OPERAND_SPACES)
    } else {
        format!("{text} ")
    }
}

fn operand_text(operand: &Operand, src: &str, byte_context: bool) -> String {
    match &operand.kind {
        OperandKind::Dec(_) | OperandKind::Sym(_) => src[operand.span.as_range()].to_string(),
        OperandKind::Hex(v) => {
            if byte_context {
                format!("0x{:02X}", v & 0xFF)
            } else {
                format!("0x{v:04X}")
            }
        }
        // char and string spans include their quotes
        OperandKind::Char(_) | OperandKind::Str(_) => src[operand.span.as_range()].to_string(),
    }
}

fn write_comment<W: Write>(
    w: &mut W,
    air: &Air,
    line: usize,
    src: &str,
    has_symbols: bool,
) -> io::Result<()> {
    if let Some(comment) = air.comment_on(line) {
        let text = &src[comment.span.as_range()];
        if comment.on_code {
            let width = if has_symbols {
                COMMENT_ON_CODE
            } else {
                COMMENT_ON_CODE_NO_SYMBOLS
            };
            let text: String = text.chars().take(width).collect();
            write!(w, ";{text}")?;
        } else {
            write!(w, ";{text}")?;
        }
    }
    Ok(())
}

/// Rows of up to three further object bytes under the first.
fn write_continuation<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    for chunk in bytes.chunks(OBJ_DIGITS / 2) {
        let text: String = chunk.iter().map(|b| format!("{b:02X}")).collect();
        writeln!(w, "      {text:<7}")?;
    }
    Ok(())
}

fn write_symbol_table<W: Write>(w: &mut W, air: &Air) -> io::Result<()> {
    let rule = "-".repeat(38);
    writeln!(w)?;
    writeln!(w)?;
    writeln!(w, "Symbol table")?;
    writeln!(w, "{rule}")?;
    writeln!(w, "Symbol    Value        Symbol    Value")?;
    writeln!(w, "{rule}")?;
    let symbols = air.symtab.sorted();
    for pair in symbols.chunks(2) {
        match pair {
            [(a, va), (b, vb)] => {
                writeln!(w, "{a:<9} {va:04X}         {b:<9} {vb:04X}")?;
            }
            [(a, va)] => writeln!(w, "{a:<9} {va:04X}")?,
            _ => unreachable!(),
        }
    }
    writeln!(w, "{rule}")?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser;

    fn traps() -> TrapRegistry {
        TrapRegistry::parse(
            "NOP0\nNOP1\nNOP2\nNOP3\nNOP i\nDECI d n s sf x sx sxf\nDECO i d n s sf x sx sxf\nSTRO d n s sf x sx sxf\n",
        )
        .unwrap()
    }

    fn listing(src: &str) -> String {
        let traps = traps();
        let air = parser::assemble(src, &traps).unwrap();
        let mut out = Vec::new();
        write_listing(&mut out, &air, src, &traps).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn columns_for_instructions() {
        let src = "num: .EQUATE 9\n LDA num,i ;load\n STOP\n .END\n";
        let text = listing(src);
        assert!(text.contains("Addr  code   Symbol   Mnemon  Operand       Comment"));
        assert!(text.contains("             num:     .EQUATE 9             \n"));
        assert!(text.contains("0000  C00009          LDA     num,i         ;load\n"));
        assert!(text.contains("0003  00              STOP    "));
        assert!(text.contains("0004                  .END    "));
    }

    #[test]
    fn header_without_symbols() {
        let text = listing(" STOP\n .END\n");
        assert!(text.contains("Addr  code   Mnemon  Operand       Comment"));
        assert!(!text.contains("Symbol table"));
    }

    #[test]
    fn symbol_table_footer_sorted() {
        let text = listing("b: STOP\na: STOP\n .END\n");
        let footer = text.split("Symbol table").nth(1).unwrap();
        assert!(footer.contains("a         0001"));
        assert!(footer.contains("b         0000"));
        assert!(
            footer.find("a         0001").unwrap() < footer.find("b         0000").unwrap()
        );
    }

    #[test]
    fn long_ascii_spills_continuation_rows() {
        let text = listing("s: .ASCII \"hello\"\n STOP\n .END\n");
        // first three bytes on the statement row, the rest continue below
        assert!(text.contains("0000  68656C s:       .ASCII  \"hello\"       \n"));
        assert!(text.contains("\n      6C6F   \n"));
    }

    #[test]
    fn burn_blanks_object_column() {
        let src = "pad: .BYTE 0x12\n .BURN 0xFFC8\nos: STOP\n STOP\n .END\n";
        let traps = traps();
        let air = parser::assemble(src, &traps).unwrap();
        // pad sits ahead of the relocated burn address: listed but blank
        let mut out = Vec::new();
        write_listing(&mut out, &air, src, &traps).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("FFC6         pad:     .BYTE   0x12          \n"));
        assert!(text.contains("FFC7  00     os:      STOP    "));
    }

    #[test]
    fn byte_hex_prints_two_digits() {
        let text = listing("b: .BYTE 0x07\n .END\n");
        assert!(text.contains(".BYTE   0x07"));
    }
}
