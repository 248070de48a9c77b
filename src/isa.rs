//! Static model of the Pep/8 instruction set.
//!
//! The instruction specifier byte is carved into fixed opcode ranges rather
//! than bitfields; both the assembler and the simulator depend on the exact
//! ranges below, so changing them breaks object-file compatibility.

use crate::trap::TrapRegistry;

/// Register selected by an instruction's register bit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Reg {
    A,
    X,
}

/// The eight addressing modes, numbered as in the three-bit mode field.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum AddrMode {
    Immediate = 0,
    Direct,
    Indirect,
    StackRel,
    StackRelDef,
    Indexed,
    StackIndexed,
    StackIndexedDef,
}

impl AddrMode {
    pub const ALL: [AddrMode; 8] = [
        AddrMode::Immediate,
        AddrMode::Direct,
        AddrMode::Indirect,
        AddrMode::StackRel,
        AddrMode::StackRelDef,
        AddrMode::Indexed,
        AddrMode::StackIndexed,
        AddrMode::StackIndexedDef,
    ];

    /// Decode a three-bit mode field.
    pub fn from_bits(bits: u8) -> AddrMode {
        Self::ALL[(bits % 8) as usize]
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Assembly-source suffix, as written after the comma.
    pub fn suffix(self) -> &'static str {
        match self {
            AddrMode::Immediate => "i",
            AddrMode::Direct => "d",
            AddrMode::Indirect => "n",
            AddrMode::StackRel => "s",
            AddrMode::StackRelDef => "sf",
            AddrMode::Indexed => "x",
            AddrMode::StackIndexed => "sx",
            AddrMode::StackIndexedDef => "sxf",
        }
    }

    /// Long name, used in runtime error messages.
    pub fn name(self) -> &'static str {
        match self {
            AddrMode::Immediate => "immediate",
            AddrMode::Direct => "direct",
            AddrMode::Indirect => "indirect",
            AddrMode::StackRel => "stack relative",
            AddrMode::StackRelDef => "stack relative deferred",
            AddrMode::Indexed => "indexed",
            AddrMode::StackIndexed => "stack indexed",
            AddrMode::StackIndexedDef => "stack indexed deferred",
        }
    }

    pub fn parse(code: &str) -> Option<AddrMode> {
        let code = code.to_ascii_lowercase();
        AddrMode::ALL
            .into_iter()
            .find(|mode| mode.suffix() == code)
    }

    /// Amount added to the base opcode when assembling this mode. Branches
    /// encode only the indexed bit; everything else the three-bit field.
    pub fn opcode_offset(self, branch: bool) -> u8 {
        if branch {
            match self {
                AddrMode::Indexed => 1,
                _ => 0,
            }
        } else {
            self.bits()
        }
    }
}

/// A set over the eight addressing modes.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct ModeSet(u8);

impl ModeSet {
    pub const EMPTY: ModeSet = ModeSet(0);
    pub const ALL: ModeSet = ModeSet(0xFF);

    pub fn contains(self, mode: AddrMode) -> bool {
        self.0 & (1 << mode.bits()) != 0
    }

    pub fn insert(&mut self, mode: AddrMode) {
        self.0 |= 1 << mode.bits();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<AddrMode> for ModeSet {
    fn from_iter<T: IntoIterator<Item = AddrMode>>(iter: T) -> Self {
        let mut set = ModeSet::EMPTY;
        for mode in iter {
            set.insert(mode);
        }
        set
    }
}

/// Broad category of an operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Category {
    Control,
    Alu,
    LoadStore,
    Trap,
    Io,
    Return,
    StackAdjust,
}

/// Mnemonic families of the instruction set, one per opcode range.
///
/// Register-parameterized families (`NOTr`, `ADDr`, ...) collapse the A/X
/// pair into one variant; [`Op::reg`] recovers the register from the
/// specifier byte.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    Stop,
    Rettr,
    Movspa,
    Movflga,
    Br,
    Brle,
    Brlt,
    Breq,
    Brne,
    Brge,
    Brgt,
    Brv,
    Brc,
    Call,
    Not,
    Neg,
    Asl,
    Asr,
    Rol,
    Ror,
    /// One of the eight registry-defined trap mnemonics.
    Trap(u8),
    Chari,
    Charo,
    Ret,
    Addsp,
    Subsp,
    Add,
    Sub,
    And,
    Or,
    Cp,
    Ld,
    Ldbyte,
    St,
    Stbyte,
}

impl Op {
    /// Map an instruction-specifier byte to its mnemonic family.
    pub fn decode(spec: u8) -> Op {
        match spec {
            0 => Op::Stop,
            1 => Op::Rettr,
            2 => Op::Movspa,
            3 => Op::Movflga,
            4..=5 => Op::Br,
            6..=7 => Op::Brle,
            8..=9 => Op::Brlt,
            10..=11 => Op::Breq,
            12..=13 => Op::Brne,
            14..=15 => Op::Brge,
            16..=17 => Op::Brgt,
            18..=19 => Op::Brv,
            20..=21 => Op::Brc,
            22..=23 => Op::Call,
            24..=25 => Op::Not,
            26..=27 => Op::Neg,
            28..=29 => Op::Asl,
            30..=31 => Op::Asr,
            32..=33 => Op::Rol,
            34..=35 => Op::Ror,
            36 => Op::Trap(0),
            37 => Op::Trap(1),
            38 => Op::Trap(2),
            39 => Op::Trap(3),
            40..=47 => Op::Trap(4),
            48..=55 => Op::Trap(5),
            56..=63 => Op::Trap(6),
            64..=71 => Op::Trap(7),
            72..=79 => Op::Chari,
            80..=87 => Op::Charo,
            88..=95 => Op::Ret,
            96..=103 => Op::Addsp,
            104..=111 => Op::Subsp,
            112..=127 => Op::Add,
            128..=143 => Op::Sub,
            144..=159 => Op::And,
            160..=175 => Op::Or,
            176..=191 => Op::Cp,
            192..=207 => Op::Ld,
            208..=223 => Op::Ldbyte,
            224..=239 => Op::St,
            240..=255 => Op::Stbyte,
        }
    }

    /// Whether the instruction occupies one byte with no operand specifier.
    /// The first four trap slots are always unary; slots 4-7 carry a mode
    /// field and always fetch an operand specifier.
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Op::Stop
                | Op::Rettr
                | Op::Movspa
                | Op::Movflga
                | Op::Not
                | Op::Neg
                | Op::Asl
                | Op::Asr
                | Op::Rol
                | Op::Ror
                | Op::Ret
        ) || matches!(self, Op::Trap(slot) if slot < 4)
    }

    /// Branches and CALL encode a single indexed bit instead of the
    /// three-bit mode field.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Op::Br
                | Op::Brle
                | Op::Brlt
                | Op::Breq
                | Op::Brne
                | Op::Brge
                | Op::Brgt
                | Op::Brv
                | Op::Brc
                | Op::Call
        )
    }

    /// Byte variants touch only the low byte at the effective address.
    pub fn is_byte_op(self) -> bool {
        matches!(self, Op::Ldbyte | Op::Stbyte | Op::Chari | Op::Charo)
    }

    /// Addressing mode of a specifier byte, `None` for unary instructions.
    pub fn addr_mode(self, spec: u8) -> Option<AddrMode> {
        if self.is_unary() {
            None
        } else if self.is_branch() {
            Some(if spec % 2 == 0 {
                AddrMode::Immediate
            } else {
                AddrMode::Indexed
            })
        } else {
            Some(AddrMode::from_bits(spec % 8))
        }
    }

    /// Register selected by a specifier byte: the low bit for the one-byte
    /// register ops, bit 3 for the standard nonunary ops.
    pub fn reg(self, spec: u8) -> Option<Reg> {
        let bit = match self {
            Op::Not | Op::Neg | Op::Asl | Op::Asr | Op::Rol | Op::Ror => spec % 2,
            Op::Add
            | Op::Sub
            | Op::And
            | Op::Or
            | Op::Cp
            | Op::Ld
            | Op::Ldbyte
            | Op::St
            | Op::Stbyte => (spec / 8) % 2,
            _ => return None,
        };
        Some(if bit == 0 { Reg::A } else { Reg::X })
    }

    pub fn category(self) -> Category {
        match self {
            Op::Stop | Op::Br | Op::Brle | Op::Brlt | Op::Breq | Op::Brne | Op::Brge
            | Op::Brgt | Op::Brv | Op::Brc | Op::Call | Op::Movspa | Op::Movflga => {
                Category::Control
            }
            Op::Not | Op::Neg | Op::Asl | Op::Asr | Op::Rol | Op::Ror | Op::Add | Op::Sub
            | Op::And | Op::Or | Op::Cp => Category::Alu,
            Op::Trap(_) => Category::Trap,
            Op::Chari | Op::Charo => Category::Io,
            Op::Rettr | Op::Ret => Category::Return,
            Op::Addsp | Op::Subsp => Category::StackAdjust,
            Op::Ld | Op::Ldbyte | Op::St | Op::Stbyte => Category::LoadStore,
        }
    }

    /// Canonical mnemonic for an exact specifier byte, with the register
    /// suffix or `RETn` count folded in. Trap slots render their
    /// registry-defined name.
    pub fn mnemonic(spec: u8, traps: &TrapRegistry) -> String {
        let op = Op::decode(spec);
        let reg = match op.reg(spec) {
            Some(Reg::A) => "A",
            Some(Reg::X) => "X",
            None => "",
        };
        match op {
            Op::Stop => "STOP".into(),
            Op::Rettr => "RETTR".into(),
            Op::Movspa => "MOVSPA".into(),
            Op::Movflga => "MOVFLGA".into(),
            Op::Br => "BR".into(),
            Op::Brle => "BRLE".into(),
            Op::Brlt => "BRLT".into(),
            Op::Breq => "BREQ".into(),
            Op::Brne => "BRNE".into(),
            Op::Brge => "BRGE".into(),
            Op::Brgt => "BRGT".into(),
            Op::Brv => "BRV".into(),
            Op::Brc => "BRC".into(),
            Op::Call => "CALL".into(),
            Op::Not => format!("NOT{reg}"),
            Op::Neg => format!("NEG{reg}"),
            Op::Asl => format!("ASL{reg}"),
            Op::Asr => format!("ASR{reg}"),
            Op::Rol => format!("ROL{reg}"),
            Op::Ror => format!("ROR{reg}"),
            Op::Trap(slot) => traps.mnemonic(slot).to_string(),
            Op::Chari => "CHARI".into(),
            Op::Charo => "CHARO".into(),
            Op::Ret => format!("RET{}", spec % 8),
            Op::Addsp => "ADDSP".into(),
            Op::Subsp => "SUBSP".into(),
            Op::Add => format!("ADD{reg}"),
            Op::Sub => format!("SUB{reg}"),
            Op::And => format!("AND{reg}"),
            Op::Or => format!("OR{reg}"),
            Op::Cp => format!("CP{reg}"),
            Op::Ld => format!("LD{reg}"),
            Op::Ldbyte => format!("LDBYTE{reg}"),
            Op::St => format!("ST{reg}"),
            Op::Stbyte => format!("STBYTE{reg}"),
        }
    }
}

/// Operand policy of an assembler-visible mnemonic.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MnemonClass {
    /// One byte, no operand.
    Unary,
    /// Operand required, addressing mode optional, only `i` and `x` valid.
    Branch,
    /// Standard nonunary instruction accepting all eight modes.
    General,
    /// Nonunary instruction that rejects immediate (stores and CHARI).
    NoImmediate,
    /// Registry-defined trap with its own mode set (unary when empty).
    Trap(u8),
}

/// An assembler-visible mnemonic: its base opcode byte and operand policy.
#[derive(Clone, Copy, Debug)]
pub struct Mnemonic {
    pub opcode: u8,
    pub class: MnemonClass,
}

/// Fixed mnemonic table; trap mnemonics come from the registry instead.
const MNEMON_TABLE: &[(&str, u8, MnemonClass)] = &[
    ("STOP", 0, MnemonClass::Unary),
    ("RETTR", 1, MnemonClass::Unary),
    ("MOVSPA", 2, MnemonClass::Unary),
    ("MOVFLGA", 3, MnemonClass::Unary),
    ("BR", 4, MnemonClass::Branch),
    ("BRLE", 6, MnemonClass::Branch),
    ("BRLT", 8, MnemonClass::Branch),
    ("BREQ", 10, MnemonClass::Branch),
    ("BRNE", 12, MnemonClass::Branch),
    ("BRGE", 14, MnemonClass::Branch),
    ("BRGT", 16, MnemonClass::Branch),
    ("BRV", 18, MnemonClass::Branch),
    ("BRC", 20, MnemonClass::Branch),
    ("CALL", 22, MnemonClass::Branch),
    ("NOTA", 24, MnemonClass::Unary),
    ("NOTX", 25, MnemonClass::Unary),
    ("NEGA", 26, MnemonClass::Unary),
    ("NEGX", 27, MnemonClass::Unary),
    ("ASLA", 28, MnemonClass::Unary),
    ("ASLX", 29, MnemonClass::Unary),
    ("ASRA", 30, MnemonClass::Unary),
    ("ASRX", 31, MnemonClass::Unary),
    ("ROLA", 32, MnemonClass::Unary),
    ("ROLX", 33, MnemonClass::Unary),
    ("RORA", 34, MnemonClass::Unary),
    ("RORX", 35, MnemonClass::Unary),
    ("CHARI", 72, MnemonClass::NoImmediate),
    ("CHARO", 80, MnemonClass::General),
    ("RET0", 88, MnemonClass::Unary),
    ("RET1", 89, MnemonClass::Unary),
    ("RET2", 90, MnemonClass::Unary),
    ("RET3", 91, MnemonClass::Unary),
    ("RET4", 92, MnemonClass::Unary),
    ("RET5", 93, MnemonClass::Unary),
    ("RET6", 94, MnemonClass::Unary),
    ("RET7", 95, MnemonClass::Unary),
    ("ADDSP", 96, MnemonClass::General),
    ("SUBSP", 104, MnemonClass::General),
    ("ADDA", 112, MnemonClass::General),
    ("ADDX", 120, MnemonClass::General),
    ("SUBA", 128, MnemonClass::General),
    ("SUBX", 136, MnemonClass::General),
    ("ANDA", 144, MnemonClass::General),
    ("ANDX", 152, MnemonClass::General),
    ("ORA", 160, MnemonClass::General),
    ("ORX", 168, MnemonClass::General),
    ("CPA", 176, MnemonClass::General),
    ("CPX", 184, MnemonClass::General),
    ("LDA", 192, MnemonClass::General),
    ("LDX", 200, MnemonClass::General),
    ("LDBYTEA", 208, MnemonClass::General),
    ("LDBYTEX", 216, MnemonClass::General),
    ("STA", 224, MnemonClass::NoImmediate),
    ("STX", 232, MnemonClass::NoImmediate),
    ("STBYTEA", 240, MnemonClass::NoImmediate),
    ("STBYTEX", 248, MnemonClass::NoImmediate),
];

impl Mnemonic {
    /// Case-insensitive lookup over the fixed table and the trap registry.
    pub fn lookup(name: &str, traps: &TrapRegistry) -> Option<Mnemonic> {
        let upper = name.to_ascii_uppercase();
        if let Some(&(_, opcode, class)) = MNEMON_TABLE.iter().find(|(n, _, _)| *n == upper) {
            return Some(Mnemonic { opcode, class });
        }
        traps.find(&upper).map(|slot| Mnemonic {
            opcode: TrapRegistry::OPCODES[slot as usize],
            class: MnemonClass::Trap(slot),
        })
    }

    pub fn is_unary(&self, traps: &TrapRegistry) -> bool {
        match self.class {
            MnemonClass::Unary => true,
            MnemonClass::Trap(slot) => slot < 4 || traps.modes(slot).is_empty(),
            _ => false,
        }
    }

    /// Branches may omit the addressing mode (defaulting to immediate).
    pub fn mode_optional(&self) -> bool {
        matches!(self.class, MnemonClass::Branch)
    }

    pub fn allows(&self, mode: AddrMode, traps: &TrapRegistry) -> bool {
        match self.class {
            MnemonClass::Unary => false,
            MnemonClass::Branch => matches!(mode, AddrMode::Immediate | AddrMode::Indexed),
            MnemonClass::General => true,
            MnemonClass::NoImmediate => mode != AddrMode::Immediate,
            MnemonClass::Trap(slot) => traps.modes(slot).contains(mode),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::trap::TrapRegistry;

    fn traps() -> TrapRegistry {
        TrapRegistry::parse(
            "NOP0\nNOP1\nNOP2\nNOP3\nNOP i\nDECI d n s sf x sx sxf\nDECO i d n s sf x sx sxf\nSTRO d n s sf x sx sxf\n",
        )
        .unwrap()
    }

    #[test]
    fn decode_is_total_and_matches_ranges() {
        for spec in 0..=255u8 {
            let op = Op::decode(spec);
            let expected = match spec {
                0 => Op::Stop,
                1 => Op::Rettr,
                2 => Op::Movspa,
                3 => Op::Movflga,
                4..=23 => match (spec - 4) / 2 {
                    0 => Op::Br,
                    1 => Op::Brle,
                    2 => Op::Brlt,
                    3 => Op::Breq,
                    4 => Op::Brne,
                    5 => Op::Brge,
                    6 => Op::Brgt,
                    7 => Op::Brv,
                    8 => Op::Brc,
                    _ => Op::Call,
                },
                24..=35 => match (spec - 24) / 2 {
                    0 => Op::Not,
                    1 => Op::Neg,
                    2 => Op::Asl,
                    3 => Op::Asr,
                    4 => Op::Rol,
                    _ => Op::Ror,
                },
                36..=39 => Op::Trap(spec - 36),
                40..=71 => Op::Trap(4 + (spec - 40) / 8),
                72..=79 => Op::Chari,
                80..=87 => Op::Charo,
                88..=95 => Op::Ret,
                96..=103 => Op::Addsp,
                104..=111 => Op::Subsp,
                112..=127 => Op::Add,
                128..=143 => Op::Sub,
                144..=159 => Op::And,
                160..=175 => Op::Or,
                176..=191 => Op::Cp,
                192..=207 => Op::Ld,
                208..=223 => Op::Ldbyte,
                224..=239 => Op::St,
                _ => Op::Stbyte,
            };
            assert_eq!(op, expected, "spec {spec:#04x}");
        }
    }

    #[test]
    fn unary_set() {
        let unary: Vec<u8> = (0..=255u8).filter(|s| Op::decode(*s).is_unary()).collect();
        let mut expected: Vec<u8> = (0..=3).collect();
        expected.extend(24..=39);
        expected.extend(88..=95);
        assert_eq!(unary, expected);
    }

    #[test]
    fn branch_mode_is_one_bit() {
        assert_eq!(Op::Br.addr_mode(4), Some(AddrMode::Immediate));
        assert_eq!(Op::Br.addr_mode(5), Some(AddrMode::Indexed));
        assert_eq!(Op::Call.addr_mode(23), Some(AddrMode::Indexed));
    }

    #[test]
    fn register_selectors() {
        assert_eq!(Op::decode(24).reg(24), Some(Reg::A));
        assert_eq!(Op::decode(25).reg(25), Some(Reg::X));
        // ADDA spans 112..=119, ADDX 120..=127
        assert_eq!(Op::decode(115).reg(115), Some(Reg::A));
        assert_eq!(Op::decode(123).reg(123), Some(Reg::X));
        assert_eq!(Op::decode(0).reg(0), None);
    }

    #[test]
    fn mode_offset_for_indexed() {
        // `,x` on a branch sets the low bit; on anything else it adds 5
        assert_eq!(AddrMode::Indexed.opcode_offset(true), 1);
        assert_eq!(AddrMode::Indexed.opcode_offset(false), 5);
        assert_eq!(AddrMode::StackIndexedDef.opcode_offset(false), 7);
    }

    #[test]
    fn mnemonic_lookup_is_case_insensitive() {
        let traps = traps();
        let lda = Mnemonic::lookup("lDa", &traps).unwrap();
        assert_eq!(lda.opcode, 192);
        assert!(Mnemonic::lookup("deci", &traps).is_some());
        assert!(Mnemonic::lookup("FROB", &traps).is_none());
    }

    #[test]
    fn store_rejects_immediate() {
        let traps = traps();
        let sta = Mnemonic::lookup("STA", &traps).unwrap();
        assert!(!sta.allows(AddrMode::Immediate, &traps));
        assert!(sta.allows(AddrMode::StackRel, &traps));
    }

    #[test]
    fn trap_modes_come_from_registry() {
        let traps = traps();
        let deci = Mnemonic::lookup("DECI", &traps).unwrap();
        assert_eq!(deci.opcode, 48);
        assert!(!deci.allows(AddrMode::Immediate, &traps));
        assert!(deci.allows(AddrMode::Direct, &traps));
        let nop = Mnemonic::lookup("NOP", &traps).unwrap();
        assert!(!nop.is_unary(&traps));
        assert!(nop.allows(AddrMode::Immediate, &traps));
    }

    #[test]
    fn operation_categories() {
        assert_eq!(Op::Br.category(), Category::Control);
        assert_eq!(Op::Asl.category(), Category::Alu);
        assert_eq!(Op::Trap(5).category(), Category::Trap);
        assert_eq!(Op::Chari.category(), Category::Io);
        assert_eq!(Op::Ret.category(), Category::Return);
        assert_eq!(Op::Subsp.category(), Category::StackAdjust);
        assert_eq!(Op::Stbyte.category(), Category::LoadStore);
    }

    #[test]
    fn mnemonic_rendering() {
        let traps = traps();
        assert_eq!(Op::mnemonic(0, &traps), "STOP");
        assert_eq!(Op::mnemonic(29, &traps), "ASLX");
        assert_eq!(Op::mnemonic(93, &traps), "RET5");
        assert_eq!(Op::mnemonic(50, &traps), "DECI");
        assert_eq!(Op::mnemonic(216, &traps), "LDBYTEX");
    }
}
