//! The Pep/8 machine: 64 KiB of memory split by the ROM boundary, six
//! registers, four status flags, and the von Neumann cycle over them.
//!
//! Everything mutable lives in [`RunState`]; the execution loop is the only
//! writer. I/O goes through the seams in [`crate::io`] so the loop can be
//! driven by scripted bytes under test.

use std::io;

use miette::{miette, Report, Severity};

use crate::io::MachineIo;
use crate::isa::{AddrMode, Op, Reg};

pub const MEM_SIZE: usize = 0x10000;

/// The four vectors in the top eight bytes of memory.
pub const USER_SP_VEC: u16 = 0xFFF8;
pub const SYSTEM_SP_VEC: u16 = 0xFFFA;
pub const LOADER_PC_VEC: u16 = 0xFFFC;
pub const INTERRUPT_PC_VEC: u16 = 0xFFFE;

/// Instruction register: the specifier byte plus the operand-specifier
/// word, overwritten on every fetch.
#[derive(Clone, Copy, Default, Debug)]
pub struct Ir {
    pub spec: u8,
    pub operand: u16,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    Running,
    Halted,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RuntimeErrorKind {
    /// Reached an instruction whose addressing mode it cannot execute;
    /// only possible from a hand-crafted object image.
    IllegalMode(AddrMode),
    /// CHARI past the end of input.
    EndOfInput,
}

/// A diagnosed fault, carrying the address of the faulting instruction.
#[derive(Clone, Copy, Debug)]
pub struct RuntimeError {
    pub addr: u16,
    pub spec: u8,
    pub kind: RuntimeErrorKind,
}

#[derive(Debug)]
pub enum StepError {
    Runtime(RuntimeError),
    Io(io::Error),
}

impl From<io::Error> for StepError {
    fn from(e: io::Error) -> Self {
        StepError::Io(e)
    }
}

/// Complete machine state.
pub struct RunState {
    mem: Box<[u8; MEM_SIZE]>,
    pub a: u16,
    pub x: u16,
    pub sp: u16,
    pub pc: u16,
    pub ir: Ir,
    pub n: bool,
    pub z: bool,
    pub v: bool,
    pub c: bool,
    /// Lowest read-only address; writes at or above it are dropped.
    rom_start: usize,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        RunState {
            mem: vec![0u8; MEM_SIZE].into_boxed_slice().try_into().unwrap(),
            a: 0,
            x: 0,
            sp: 0,
            pc: 0,
            ir: Ir::default(),
            n: false,
            z: false,
            v: false,
            c: false,
            rom_start: MEM_SIZE,
        }
    }

    /// Copy the OS image into the top of memory; its size fixes the ROM
    /// boundary. The top eight bytes of the image carry the vectors.
    pub fn install_rom(&mut self, image: &[u8]) -> Result<(), Report> {
        if image.is_empty() || image.len() >= MEM_SIZE {
            return Err(miette!(
                severity = Severity::Error,
                "OS is too big to fit into main memory."
            ));
        }
        self.rom_start = MEM_SIZE - image.len();
        self.mem[self.rom_start..].copy_from_slice(image);
        Ok(())
    }

    pub fn rom_start(&self) -> usize {
        self.rom_start
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    /// Big-endian word read; the address wraps, so a read at 0xFFFF takes
    /// its low byte from 0x0000.
    pub fn read_word(&self, addr: u16) -> u16 {
        u16::from_be_bytes([self.read_byte(addr), self.read_byte(addr.wrapping_add(1))])
    }

    /// Writes into ROM are silently dropped.
    pub fn write_byte(&mut self, addr: u16, val: u8) {
        if (addr as usize) < self.rom_start {
            self.mem[addr as usize] = val;
        }
    }

    pub fn write_word(&mut self, addr: u16, val: u16) {
        let [hi, lo] = val.to_be_bytes();
        self.write_byte(addr, hi);
        self.write_byte(addr.wrapping_add(1), lo);
    }

    /// Unguarded store, for test setup and image installation.
    pub fn poke(&mut self, addr: u16, val: u8) {
        self.mem[addr as usize] = val;
    }

    pub fn poke_word(&mut self, addr: u16, val: u16) {
        let [hi, lo] = val.to_be_bytes();
        self.poke(addr, hi);
        self.poke(addr.wrapping_add(1), lo);
    }

    pub fn load_image(&mut self, addr: u16, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            self.poke(addr.wrapping_add(i as u16), *byte);
        }
    }

    pub fn reg(&self, r: Reg) -> u16 {
        match r {
            Reg::A => self.a,
            Reg::X => self.x,
        }
    }

    pub fn set_reg(&mut self, r: Reg, val: u16) {
        match r {
            Reg::A => self.a = val,
            Reg::X => self.x = val,
        }
    }

    /// Flags compacted as NZVC in the low nibble.
    pub fn flag_bits(&self) -> u8 {
        (self.n as u8) << 3 | (self.z as u8) << 2 | (self.v as u8) << 1 | self.c as u8
    }

    pub fn set_flag_bits(&mut self, bits: u8) {
        self.n = bits & 0b1000 != 0;
        self.z = bits & 0b0100 != 0;
        self.v = bits & 0b0010 != 0;
        self.c = bits & 0b0001 != 0;
    }

    /// Point SP at the user stack and PC at address zero.
    pub fn begin_execute(&mut self) {
        self.sp = self.read_word(USER_SP_VEC);
        self.pc = 0;
    }

    /// Point SP at the system stack and PC at the OS loader.
    pub fn begin_load(&mut self) {
        self.sp = self.read_word(SYSTEM_SP_VEC);
        self.pc = self.read_word(LOADER_PC_VEC);
    }

    /// Effective address for the given mode, or the operand specifier
    /// itself for immediate. Additions are modular, no flag updates.
    pub fn resolve(&self, mode: AddrMode) -> u16 {
        let os = self.ir.operand;
        match mode {
            AddrMode::Immediate | AddrMode::Direct => os,
            AddrMode::Indirect => self.read_word(os),
            AddrMode::StackRel => self.sp.wrapping_add(os),
            AddrMode::StackRelDef => self.read_word(self.sp.wrapping_add(os)),
            AddrMode::Indexed => self.x.wrapping_add(os),
            AddrMode::StackIndexed => self.sp.wrapping_add(os).wrapping_add(self.x),
            AddrMode::StackIndexedDef => {
                self.read_word(self.sp.wrapping_add(os)).wrapping_add(self.x)
            }
        }
    }

    /// Operand value as a word.
    pub fn load_word(&self, mode: AddrMode) -> u16 {
        match mode {
            AddrMode::Immediate => self.ir.operand,
            _ => self.read_word(self.resolve(mode)),
        }
    }

    /// Operand value as a byte; only the low byte at the effective address
    /// is touched.
    pub fn load_byte(&self, mode: AddrMode) -> u8 {
        match mode {
            AddrMode::Immediate => (self.ir.operand & 0xFF) as u8,
            _ => self.read_byte(self.resolve(mode)),
        }
    }

    fn set_nz(&mut self, val: u16) {
        self.n = val & 0x8000 != 0;
        self.z = val == 0;
    }

    fn push_word(&mut self, val: u16) {
        self.sp = self.sp.wrapping_sub(2);
        self.write_word(self.sp, val);
    }

    fn pop_word(&mut self) -> u16 {
        let val = self.read_word(self.sp);
        self.sp = self.sp.wrapping_add(2);
        val
    }

    fn runtime_error(&self, kind: RuntimeErrorKind) -> StepError {
        let size = if Op::decode(self.ir.spec).is_unary() { 1 } else { 3 };
        StepError::Runtime(RuntimeError {
            addr: self.pc.wrapping_sub(size),
            spec: self.ir.spec,
            kind,
        })
    }

    /// One fetch/decode/execute cycle.
    pub fn step(&mut self, io: &mut MachineIo) -> Result<Status, StepError> {
        let spec = self.read_byte(self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.ir.spec = spec;
        let op = Op::decode(spec);
        if !op.is_unary() {
            self.ir.operand = self.read_word(self.pc);
            self.pc = self.pc.wrapping_add(2);
        }
        let mode = op.addr_mode(spec);

        match op {
            Op::Stop => return Ok(Status::Halted),
            Op::Rettr => self.rettr(),
            Op::Movspa => self.a = self.sp,
            Op::Movflga => self.a = self.flag_bits() as u16,

            Op::Br => self.branch(mode, true),
            Op::Brle => self.branch(mode, self.n || self.z),
            Op::Brlt => self.branch(mode, self.n),
            Op::Breq => self.branch(mode, self.z),
            Op::Brne => self.branch(mode, !self.z),
            Op::Brge => self.branch(mode, !self.n),
            Op::Brgt => self.branch(mode, !self.n && !self.z),
            Op::Brv => self.branch(mode, self.v),
            Op::Brc => self.branch(mode, self.c),
            Op::Call => {
                self.push_word(self.pc);
                self.pc = self.load_word(mode.unwrap());
            }

            Op::Not => {
                let r = op.reg(spec).unwrap();
                let val = !self.reg(r);
                self.set_reg(r, val);
                self.set_nz(val);
            }
            Op::Neg => {
                // sets N and Z only; V stays unchanged even for 0x8000
                let r = op.reg(spec).unwrap();
                let val = self.reg(r).wrapping_neg();
                self.set_reg(r, val);
                self.set_nz(val);
            }
            Op::Asl => {
                let r = op.reg(spec).unwrap();
                let val = self.reg(r);
                let (res, carry, ovflw) = adder(val, val);
                self.set_reg(r, res);
                self.c = carry;
                self.v = ovflw;
                self.set_nz(res);
            }
            Op::Asr => {
                let r = op.reg(spec).unwrap();
                let val = self.reg(r);
                let res = ((val as i16) >> 1) as u16;
                self.set_reg(r, res);
                self.c = val & 1 != 0;
                self.set_nz(res);
            }
            Op::Rol => {
                let r = op.reg(spec).unwrap();
                let val = self.reg(r);
                let res = val << 1 | self.c as u16;
                self.c = val & 0x8000 != 0;
                self.set_reg(r, res);
            }
            Op::Ror => {
                let r = op.reg(spec).unwrap();
                let val = self.reg(r);
                let res = val >> 1 | (self.c as u16) << 15;
                self.c = val & 1 != 0;
                self.set_reg(r, res);
            }

            Op::Trap(_) => self.trap(spec),

            Op::Chari => {
                let mode = mode.unwrap();
                let byte = io
                    .input
                    .read_byte()?
                    .ok_or_else(|| self.runtime_error(RuntimeErrorKind::EndOfInput))?;
                if mode == AddrMode::Immediate {
                    return Err(self.runtime_error(RuntimeErrorKind::IllegalMode(mode)));
                }
                let addr = self.resolve(mode);
                self.write_byte(addr, byte);
            }
            Op::Charo => {
                let byte = self.load_byte(mode.unwrap());
                if byte == 0x0A || byte == 0x0D {
                    io.output.write_newline()?;
                } else {
                    io.output.write_byte(byte)?;
                }
                if io.echo_newline {
                    io.output.write_newline()?;
                }
            }

            Op::Ret => {
                self.sp = self.sp.wrapping_add((spec % 8) as u16);
                self.pc = self.read_word(self.sp);
                self.sp = self.sp.wrapping_add(2);
            }
            Op::Addsp => {
                let val = self.load_word(mode.unwrap());
                let (res, carry, ovflw) = adder(self.sp, val);
                self.sp = res;
                self.c = carry;
                self.v = ovflw;
                self.set_nz(res);
            }
            Op::Subsp => {
                let val = self.load_word(mode.unwrap());
                let (res, carry, ovflw) = subtractor(self.sp, val);
                self.sp = res;
                self.c = carry;
                self.v = ovflw;
                self.set_nz(res);
            }

            Op::Add | Op::Sub => {
                let r = op.reg(spec).unwrap();
                let val = self.load_word(mode.unwrap());
                let (res, carry, ovflw) = if op == Op::Add {
                    adder(self.reg(r), val)
                } else {
                    subtractor(self.reg(r), val)
                };
                self.set_reg(r, res);
                self.c = carry;
                self.v = ovflw;
                self.set_nz(res);
            }
            Op::And | Op::Or => {
                let r = op.reg(spec).unwrap();
                let val = self.load_word(mode.unwrap());
                let res = if op == Op::And {
                    self.reg(r) & val
                } else {
                    self.reg(r) | val
                };
                self.set_reg(r, res);
                self.set_nz(res);
            }
            Op::Cp => {
                let r = op.reg(spec).unwrap();
                let lhs = self.reg(r);
                let rhs = self.load_word(mode.unwrap());
                let (res, carry, ovflw) = subtractor(lhs, rhs);
                self.c = carry;
                self.v = ovflw;
                if lhs < 0x8000 && rhs >= 0x8000 {
                    // pos minus neg: the true difference is positive
                    self.n = false;
                    self.z = false;
                } else if lhs >= 0x8000 && rhs < 0x8000 {
                    // neg minus pos: the true difference is negative
                    self.n = true;
                    self.z = false;
                } else {
                    self.set_nz(res);
                }
            }

            Op::Ld => {
                let r = op.reg(spec).unwrap();
                let val = self.load_word(mode.unwrap());
                self.set_reg(r, val);
                self.set_nz(val);
            }
            Op::Ldbyte => {
                let r = op.reg(spec).unwrap();
                let byte = self.load_byte(mode.unwrap());
                let val = self.reg(r) & 0xFF00 | byte as u16;
                self.set_reg(r, val);
                self.set_nz(val);
            }
            Op::St => {
                let mode = mode.unwrap();
                if mode == AddrMode::Immediate {
                    return Err(self.runtime_error(RuntimeErrorKind::IllegalMode(mode)));
                }
                let addr = self.resolve(mode);
                self.write_word(addr, self.reg(op.reg(spec).unwrap()));
            }
            Op::Stbyte => {
                let mode = mode.unwrap();
                if mode == AddrMode::Immediate {
                    return Err(self.runtime_error(RuntimeErrorKind::IllegalMode(mode)));
                }
                let addr = self.resolve(mode);
                let byte = (self.reg(op.reg(spec).unwrap()) & 0xFF) as u8;
                self.write_byte(addr, byte);
            }
        }
        Ok(Status::Running)
    }

    /// Run until STOP or a fault, with no tracing.
    pub fn run(&mut self, io: &mut MachineIo) -> Result<(), StepError> {
        while self.step(io)? == Status::Running {}
        Ok(())
    }

    fn branch(&mut self, mode: Option<AddrMode>, taken: bool) {
        if taken {
            self.pc = self.load_word(mode.unwrap());
        }
    }

    /// Software interrupt: switch to the system stack, push the caller's
    /// context, and vector through the OS trap dispatcher.
    fn trap(&mut self, spec: u8) {
        let old_sp = self.sp;
        self.sp = self.read_word(SYSTEM_SP_VEC);
        self.sp = self.sp.wrapping_sub(1);
        self.write_byte(self.sp, spec);
        self.push_word(old_sp);
        self.push_word(self.pc);
        self.push_word(self.x);
        self.push_word(self.a);
        self.sp = self.sp.wrapping_sub(1);
        self.write_byte(self.sp, self.flag_bits());
        self.pc = self.read_word(INTERRUPT_PC_VEC);
    }

    /// The complement of [`RunState::trap`]: pop flags, A, X, PC, and
    /// finally the caller's SP.
    fn rettr(&mut self) {
        let flags = self.read_byte(self.sp);
        self.sp = self.sp.wrapping_add(1);
        self.set_flag_bits(flags & 0x0F);
        self.a = self.pop_word();
        self.x = self.pop_word();
        self.pc = self.pop_word();
        self.sp = self.read_word(self.sp);
    }
}

/// One-word adder. C is the carry out of bit 15; V is set on pos+pos=neg
/// and neg+neg=pos.
pub fn adder(op1: u16, op2: u16) -> (u16, bool, bool) {
    let sum = op1 as u32 + op2 as u32;
    let res = sum as u16;
    let carry = sum > 0xFFFF;
    let ovflw = (op1 < 0x8000 && op2 < 0x8000 && res >= 0x8000)
        || (op1 >= 0x8000 && op2 >= 0x8000 && res < 0x8000);
    (res, carry, ovflw)
}

/// One-word subtractor. C is the borrow; V is set on pos-neg=neg and
/// neg-pos=pos.
pub fn subtractor(op1: u16, op2: u16) -> (u16, bool, bool) {
    let res = op1.wrapping_sub(op2);
    let carry = op2 > op1;
    let ovflw = (op1 < 0x8000 && op2 >= 0x8000 && res >= 0x8000)
        || (op1 >= 0x8000 && op2 < 0x8000 && res < 0x8000);
    (res, carry, ovflw)
}

#[cfg(test)]
mod test {
    use super::*;

    fn run_bytes(program: &[u8], input: &[u8]) -> (RunState, Vec<u8>) {
        let mut state = RunState::new();
        state.load_image(0, program);
        let (mut io, out) = MachineIo::scripted(input.to_vec());
        state.run(&mut io).unwrap();
        let bytes = out.borrow().clone();
        (state, bytes)
    }

    #[test]
    fn asl_flag_algebra() {
        // LDA 0x4000,i ; ASLA ; STOP
        let (state, _) = run_bytes(&[0xC0, 0x40, 0x00, 28, 0x00], b"");
        assert_eq!(state.a, 0x8000);
        assert!(state.n);
        assert!(!state.z);
        assert!(state.v);
        assert!(!state.c);
    }

    #[test]
    fn charo_immediate_prints_bang() {
        // CHARO '!',i ; STOP
        let (_, out) = run_bytes(&[80, 0x00, b'!', 0x00], b"");
        assert_eq!(out, b"!");
    }

    #[test]
    fn charo_normalizes_line_endings() {
        // CHARO 0x000D,i ; CHARO 0x000A,i ; STOP
        let (_, out) = run_bytes(&[80, 0x00, 0x0D, 80, 0x00, 0x0A, 0x00], b"");
        assert_eq!(out, b"\n\n");
    }

    #[test]
    fn chari_stores_one_byte() {
        // CHARI 0x0010,d ; STOP
        let (state, _) = run_bytes(&[73, 0x00, 0x10, 0x00], b"A");
        assert_eq!(state.read_byte(0x0010), b'A');
    }

    #[test]
    fn chari_past_end_of_input_faults() {
        let mut state = RunState::new();
        state.load_image(0, &[73, 0x00, 0x10, 0x00]);
        let (mut io, _) = MachineIo::scripted(b"".to_vec());
        match state.run(&mut io) {
            Err(StepError::Runtime(e)) => {
                assert_eq!(e.kind, RuntimeErrorKind::EndOfInput);
                assert_eq!(e.addr, 0x0000);
            }
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn store_immediate_faults_with_rewound_pc() {
        // STOP at 0, STA ...,i at 1
        let mut state = RunState::new();
        state.load_image(0, &[0x04, 0x00, 0x03, 224, 0x00, 0x10]);
        state.pc = 3;
        let (mut io, _) = MachineIo::scripted(b"".to_vec());
        match state.run(&mut io) {
            Err(StepError::Runtime(e)) => {
                assert!(matches!(e.kind, RuntimeErrorKind::IllegalMode(AddrMode::Immediate)));
                assert_eq!(e.addr, 0x0003);
            }
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn addressing_modes_resolve() {
        let mut state = RunState::new();
        state.sp = 0x1000;
        state.x = 0x0002;
        state.ir.operand = 0x0010;
        state.poke_word(0x0010, 0x2000);
        state.poke_word(0x1010, 0x3000);
        assert_eq!(state.resolve(AddrMode::Immediate), 0x0010);
        assert_eq!(state.resolve(AddrMode::Direct), 0x0010);
        assert_eq!(state.resolve(AddrMode::Indirect), 0x2000);
        assert_eq!(state.resolve(AddrMode::StackRel), 0x1010);
        assert_eq!(state.resolve(AddrMode::StackRelDef), 0x3000);
        assert_eq!(state.resolve(AddrMode::Indexed), 0x0012);
        assert_eq!(state.resolve(AddrMode::StackIndexed), 0x1012);
        assert_eq!(state.resolve(AddrMode::StackIndexedDef), 0x3002);
    }

    #[test]
    fn trap_and_rettr_restore_caller_state() {
        let mut state = RunState::new();
        // program: NOP0 ; STOP   handler at 0x0200: RETTR
        state.load_image(0, &[36, 0x00]);
        state.poke(0x0200, 1);
        state.poke_word(SYSTEM_SP_VEC, 0x8000);
        state.poke_word(INTERRUPT_PC_VEC, 0x0200);
        state.a = 0x1234;
        state.x = 0x5678;
        state.sp = 0x4000;
        state.set_flag_bits(0b1010);
        let (mut io, _) = MachineIo::scripted(b"".to_vec());

        // step into the trap
        assert_eq!(state.step(&mut io).unwrap(), Status::Running);
        assert_eq!(state.pc, 0x0200);
        // pushed context: flags, A, X, PC, old SP, spec
        assert_eq!(state.read_byte(state.sp), 0b1010);
        // step through RETTR
        assert_eq!(state.step(&mut io).unwrap(), Status::Running);
        assert_eq!(state.a, 0x1234);
        assert_eq!(state.x, 0x5678);
        assert_eq!(state.sp, 0x4000);
        assert_eq!(state.pc, 0x0001);
        assert_eq!(state.flag_bits(), 0b1010);
        // and the next step halts
        assert_eq!(state.step(&mut io).unwrap(), Status::Halted);
    }

    #[test]
    fn rom_boundary_write_dropped() {
        let mut state = RunState::new();
        state.install_rom(&[0xAB, 0xCD]).unwrap();
        assert_eq!(state.rom_start(), 0xFFFE);
        state.write_byte(0xFFFE, 0x00);
        assert_eq!(state.read_byte(0xFFFE), 0xAB);
        state.write_byte(0xFFFD, 0x42);
        assert_eq!(state.read_byte(0xFFFD), 0x42);
        // a word write straddling the boundary drops only the ROM half
        state.write_word(0xFFFD, 0x1122);
        assert_eq!(state.read_byte(0xFFFD), 0x11);
        assert_eq!(state.read_byte(0xFFFE), 0xAB);
    }

    #[test]
    fn pc_wraps_and_fetch_crosses_the_wrap() {
        let mut state = RunState::new();
        // BR 0x0005,i split across the address-space wrap
        state.poke(0xFFFF, 0x04);
        state.poke(0x0000, 0x00);
        state.poke(0x0001, 0x05);
        state.poke(0x0005, 0x00); // STOP
        state.pc = 0xFFFF;
        let (mut io, _) = MachineIo::scripted(b"".to_vec());
        state.run(&mut io).unwrap();
        assert_eq!(state.pc, 0x0006);
    }

    #[test]
    fn cp_forces_n_to_true_difference_sign() {
        // LDA 0x8000,i ; CPA 0x0001,i ; STOP
        let (state, _) = run_bytes(&[0xC0, 0x80, 0x00, 176, 0x00, 0x01, 0x00], b"");
        assert!(state.n);
        assert!(!state.z);
        assert!(state.v);
        assert!(!state.c);
    }

    #[test]
    fn cp_equal_sets_z() {
        // LDA 0x0005,i ; CPA 0x0005,i ; STOP
        let (state, _) = run_bytes(&[0xC0, 0x00, 0x05, 176, 0x00, 0x05, 0x00], b"");
        assert!(state.z);
        assert!(!state.n);
    }

    #[test]
    fn adder_matches_subtractor_through_complement() {
        let samples = [0u16, 1, 2, 0x7FFF, 0x8000, 0x8001, 0xFFFF, 0x1234, 0xFEDC];
        for &a in &samples {
            for &b in &samples {
                let (diff, _, sub_v) = subtractor(a, b);
                let (sum, _, add_v) = adder(a, b.wrapping_neg());
                assert_eq!(diff, sum, "a={a:#06x} b={b:#06x}");
                if b != 0 && b != 0x8000 {
                    assert_eq!(sub_v, add_v, "a={a:#06x} b={b:#06x}");
                }
            }
        }
    }

    #[test]
    fn neg_leaves_v_alone() {
        // LDA 0x8000,i ; NEGA ; STOP
        let (state, _) = run_bytes(&[0xC0, 0x80, 0x00, 26, 0x00], b"");
        assert_eq!(state.a, 0x8000);
        assert!(state.n);
        assert!(!state.v);
    }

    #[test]
    fn rotates_go_through_carry() {
        let mut state = RunState::new();
        state.a = 0x8001;
        state.c = false;
        state.load_image(0, &[32, 0x00]); // ROLA ; STOP
        let (mut io, _) = MachineIo::scripted(b"".to_vec());
        state.run(&mut io).unwrap();
        assert_eq!(state.a, 0x0002);
        assert!(state.c);

        let mut state = RunState::new();
        state.a = 0x0001;
        state.c = true;
        state.load_image(0, &[34, 0x00]); // RORA ; STOP
        let (mut io, _) = MachineIo::scripted(b"".to_vec());
        state.run(&mut io).unwrap();
        assert_eq!(state.a, 0x8000);
        assert!(state.c);
    }

    #[test]
    fn ret_n_adjusts_sp_then_pops() {
        let mut state = RunState::new();
        state.sp = 0x0FFC;
        state.poke_word(0x1000, 0x0123);
        state.load_image(0, &[92]); // RET4
        let (mut io, _) = MachineIo::scripted(b"".to_vec());
        state.step(&mut io).unwrap();
        assert_eq!(state.pc, 0x0123);
        assert_eq!(state.sp, 0x1002);
    }

    #[test]
    fn call_pushes_return_address() {
        let mut state = RunState::new();
        state.sp = 0x2000;
        // CALL 0x0100,i at 0; STOP at 0x0100
        state.load_image(0, &[22, 0x01, 0x00]);
        state.poke(0x0100, 0x00);
        let (mut io, _) = MachineIo::scripted(b"".to_vec());
        state.run(&mut io).unwrap();
        assert_eq!(state.read_word(0x1FFE), 0x0003);
    }

    #[test]
    fn ldbyte_touches_low_byte_only() {
        let mut state = RunState::new();
        state.a = 0x1234;
        state.poke(0x0010, 0xAB);
        // LDBYTEA 0x0010,d ; STOP
        state.load_image(0, &[209, 0x00, 0x10, 0x00]);
        let (mut io, _) = MachineIo::scripted(b"".to_vec());
        state.run(&mut io).unwrap();
        assert_eq!(state.a, 0x12AB);
    }

    #[test]
    fn stbyte_leaves_high_byte_alone() {
        let mut state = RunState::new();
        state.a = 0xABCD;
        state.poke_word(0x0010, 0x1122);
        // STBYTEA 0x0010,d ; STOP
        state.load_image(0, &[241, 0x00, 0x10, 0x00]);
        let (mut io, _) = MachineIo::scripted(b"".to_vec());
        state.run(&mut io).unwrap();
        assert_eq!(state.read_word(0x0010), 0xCD22);
    }

    #[test]
    fn movflga_compacts_flags() {
        let mut state = RunState::new();
        state.set_flag_bits(0b1011);
        state.load_image(0, &[3, 0x00]); // MOVFLGA ; STOP
        let (mut io, _) = MachineIo::scripted(b"".to_vec());
        state.run(&mut io).unwrap();
        assert_eq!(state.a, 0x000B);
    }

    #[test]
    fn conditional_branches() {
        // LDA 0x0000,i sets Z; BREQ 0x0008,i ; (skipped: LDA 0xFFFF,i) ; STOP
        let (state, _) = run_bytes(
            &[
                0xC0, 0x00, 0x00, // LDA 0x0000,i
                10, 0x00, 0x08, // BREQ 0x0008,i
                0xC0, 0xFF, // never executed
                0x00, // STOP at 8
            ],
            b"",
        );
        assert_eq!(state.a, 0x0000);
        assert_eq!(state.pc, 0x0009);
    }
}
