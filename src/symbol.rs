use std::ops::Range;

use fxhash::FxHashMap;
use miette::SourceSpan;

/// Location within source str
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Span {
    offs: SrcOffset,
    len: usize,
}

impl Span {
    pub fn new(offs: SrcOffset, len: usize) -> Self {
        Span { offs, len }
    }

    /// Non-source span
    pub fn dummy() -> Self {
        Span {
            offs: SrcOffset(0),
            len: 0,
        }
    }

    /// Returns a range that can be used to index the source
    pub fn as_range(&self) -> Range<usize> {
        self.offs()..self.end()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn offs(&self) -> usize {
        self.offs.0
    }

    pub fn end(&self) -> usize {
        self.offs.0 + self.len
    }
}

// Used for miette conversion
impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

impl From<Range<usize>> for Span {
    fn from(value: Range<usize>) -> Self {
        Span {
            offs: SrcOffset(value.start),
            len: value.end - value.start,
        }
    }
}

impl From<Span> for Range<usize> {
    fn from(value: Span) -> Self {
        value.offs()..value.end()
    }
}

/// Used to refer to offsets from the start of a source file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct SrcOffset(pub usize);

/// The assembler symbol table: a 16-bit value per identifier.
///
/// Declaration order is kept so the listing can place each `symbol:` next to
/// the line that declared it; the footer sorts by identifier instead.
/// `.EQUATE`d symbols are remembered separately because a `.BURN` shifts every
/// symbol value and equated values must then be put back.
#[derive(Default, Debug)]
pub struct SymbolTable {
    values: FxHashMap<String, u16>,
    decls: Vec<(String, usize)>,
    equates: Vec<(String, u16)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` on source line `line` with the given value.
    /// Errors if the identifier was already declared.
    pub fn declare(&mut self, name: &str, line: usize, value: u16) -> Result<(), ()> {
        if self.values.contains_key(name) {
            return Err(());
        }
        self.values.insert(name.to_string(), value);
        self.decls.push((name.to_string(), line));
        Ok(())
    }

    /// Overwrite the value of a declared symbol (`.EQUATE`) and remember the
    /// literal so a later `.BURN` shift can restore it.
    pub fn equate(&mut self, name: &str, value: u16) {
        self.values.insert(name.to_string(), value);
        self.equates.push((name.to_string(), value));
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Symbol declared on the given source line, if any.
    pub fn declared_on(&self, line: usize) -> Option<&str> {
        self.decls
            .iter()
            .find(|(_, l)| *l == line)
            .map(|(name, _)| name.as_str())
    }

    /// Shift every symbol by the `.BURN` offset, then restore equated
    /// symbols to their literal values.
    pub fn relocate(&mut self, offset: u16) {
        for value in self.values.values_mut() {
            *value = value.wrapping_add(offset);
        }
        for (name, value) in &self.equates {
            self.values.insert(name.clone(), *value);
        }
    }

    /// Symbols sorted by identifier, for the listing footer.
    pub fn sorted(&self) -> Vec<(&str, u16)> {
        let mut out: Vec<(&str, u16)> = self
            .values
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn declare_duplicate() {
        let mut sym = SymbolTable::new();
        assert!(sym.declare("main", 0, 0x0000).is_ok());
        assert!(sym.declare("main", 3, 0x0007).is_err());
        assert_eq!(sym.get("main"), Some(0x0000));
    }

    #[test]
    fn relocate_preserves_equates() {
        let mut sym = SymbolTable::new();
        sym.declare("start", 0, 0x0003).unwrap();
        sym.declare("nine", 1, 0).unwrap();
        sym.equate("nine", 9);
        sym.relocate(0xFF90);
        assert_eq!(sym.get("start"), Some(0xFF93));
        assert_eq!(sym.get("nine"), Some(9));
    }

    #[test]
    fn sorted_by_identifier() {
        let mut sym = SymbolTable::new();
        sym.declare("zeta", 0, 2).unwrap();
        sym.declare("alpha", 1, 1).unwrap();
        let names: Vec<&str> = sym.sorted().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
