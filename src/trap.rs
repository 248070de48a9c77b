//! The eight-entry registry of user-defined trap mnemonics, read from the
//! external `trap` file at startup. Read-only once loaded; the assembler
//! consults it for mnemonic validity and mode sets, the simulator for trace
//! output.

use std::fs;
use std::path::Path;

use miette::{miette, Result, Severity};

use crate::isa::{AddrMode, ModeSet};

pub const TRAP_COUNT: usize = 8;
/// The first four entries never take an operand.
pub const UNARY_TRAPS: usize = 4;
const MNEMON_LENGTH: usize = 8;

#[derive(Debug)]
pub struct TrapEntry {
    mnemonic: String,
    modes: ModeSet,
}

#[derive(Debug)]
pub struct TrapRegistry {
    entries: Vec<TrapEntry>,
}

impl TrapRegistry {
    /// Base opcode byte of each trap slot.
    pub const OPCODES: [u8; TRAP_COUNT] = [36, 37, 38, 39, 40, 48, 56, 64];

    /// Read the registry from a `trap` file.
    pub fn load(path: impl AsRef<Path>) -> Result<TrapRegistry> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|_| miette!(severity = Severity::Error, "Could not open trap file."))?;
        Self::parse(&text)
    }

    /// Parse the eight-line registry text. Each line carries a mnemonic of up
    /// to eight characters; lines five through eight follow it with a
    /// whitespace-separated addressing-mode list. Mode codes are folded to
    /// lower case, duplicates and unknown words are ignored.
    pub fn parse(text: &str) -> Result<TrapRegistry> {
        let mut entries = Vec::with_capacity(TRAP_COUNT);
        let mut lines = text.lines();
        for slot in 0..TRAP_COUNT {
            let line = lines.next().ok_or_else(|| {
                miette!(
                    severity = Severity::Error,
                    "Trap file must contain {TRAP_COUNT} lines; line {} is missing.",
                    slot + 1
                )
            })?;
            let mut words = line.split_whitespace();
            let mnemonic: String = words
                .next()
                .unwrap_or("")
                .chars()
                .take(MNEMON_LENGTH)
                .map(|c| c.to_ascii_uppercase())
                .collect();
            let mut modes = ModeSet::EMPTY;
            if slot >= UNARY_TRAPS {
                for word in words {
                    if let Some(mode) = AddrMode::parse(word) {
                        modes.insert(mode);
                    }
                }
            }
            entries.push(TrapEntry { mnemonic, modes });
        }
        Ok(TrapRegistry { entries })
    }

    pub fn mnemonic(&self, slot: u8) -> &str {
        &self.entries[slot as usize].mnemonic
    }

    pub fn modes(&self, slot: u8) -> ModeSet {
        self.entries[slot as usize].modes
    }

    /// Slot whose mnemonic matches the (already upper-cased) name.
    pub fn find(&self, upper_name: &str) -> Option<u8> {
        self.entries
            .iter()
            .position(|entry| entry.mnemonic == upper_name)
            .map(|slot| slot as u8)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const STANDARD: &str = "NOP0\nNOP1\nNOP2\nNOP3\nNOP i\nDECI d n s sf x sx sxf\nDECO i d n s sf x sx sxf\nSTRO d n s sf x sx sxf\n";

    #[test]
    fn parses_standard_table() {
        let reg = TrapRegistry::parse(STANDARD).unwrap();
        assert_eq!(reg.mnemonic(0), "NOP0");
        assert_eq!(reg.mnemonic(5), "DECI");
        assert!(reg.modes(5).contains(AddrMode::StackIndexedDef));
        assert!(!reg.modes(5).contains(AddrMode::Immediate));
        assert!(reg.modes(6).contains(AddrMode::Immediate));
        assert_eq!(reg.find("STRO"), Some(7));
        assert_eq!(reg.find("XYZZY"), None);
    }

    #[test]
    fn unary_lines_ignore_mode_lists() {
        let reg = TrapRegistry::parse("A i d\nB\nC\nD\nE\nF\nG\nH\n").unwrap();
        assert!(reg.modes(0).is_empty());
        // nonunary slot with no list is unary by convention
        assert!(reg.modes(4).is_empty());
    }

    #[test]
    fn folds_case_and_truncates() {
        let reg =
            TrapRegistry::parse("verylongname\nb\nc\nd\ne I D\nf N\ng SX\nh SXF SF\n").unwrap();
        assert_eq!(reg.mnemonic(0), "VERYLONG");
        assert!(reg.modes(4).contains(AddrMode::Immediate));
        assert!(reg.modes(4).contains(AddrMode::Direct));
        assert!(reg.modes(6).contains(AddrMode::StackIndexed));
        assert!(reg.modes(7).contains(AddrMode::StackIndexedDef));
        assert!(reg.modes(7).contains(AddrMode::StackRelDef));
    }

    #[test]
    fn duplicate_codes_are_ignored() {
        let reg = TrapRegistry::parse("a\nb\nc\nd\ne i i i\nf\ng\nh\n").unwrap();
        assert!(reg.modes(4).contains(AddrMode::Immediate));
    }

    #[test]
    fn short_file_is_an_error() {
        assert!(TrapRegistry::parse("a\nb\nc\n").is_err());
    }
}
