//! Execution tracing: scope selection, line formatting, and the pager
//! vocabulary. The interactive side (prompting between pages) lives in the
//! monitor; everything here is pure so tests can check trace output
//! verbatim.

use crate::isa::Op;
use crate::runtime::RunState;
use crate::trap::TrapRegistry;

/// What part of the address space gets traced.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TraceMode {
    Off,
    /// Only instructions below the ROM boundary.
    Program,
    /// Program and OS trap code.
    Traps,
    /// The OS loader (everything, entered through the load command).
    Loader,
}

impl TraceMode {
    pub fn covers(self, addr: u16, rom_start: usize) -> bool {
        match self {
            TraceMode::Off => false,
            TraceMode::Program => (addr as usize) < rom_start,
            TraceMode::Traps | TraceMode::Loader => true,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            TraceMode::Off => "",
            TraceMode::Program => "User Program Trace:",
            TraceMode::Traps => "User Program Trace with Traps:",
            TraceMode::Loader => "Loader Trace of Operating System:",
        }
    }
}

/// Response accepted at a trace prompt.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PagerAction {
    NextPage,
    Scroll,
    SingleStep,
    Quit,
    Stay,
}

/// First character of a prompt response, case-insensitive; anything else
/// re-prompts.
pub fn parse_response(line: &str) -> Option<PagerAction> {
    match line.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('N') => Some(PagerAction::NextPage),
        Some('C') => Some(PagerAction::Scroll),
        Some('S') => Some(PagerAction::SingleStep),
        Some('Q') => Some(PagerAction::Quit),
        Some(' ') => Some(PagerAction::Stay),
        _ => None,
    }
}

pub fn rule() -> String {
    "-".repeat(73)
}

/// The column header block printed above trace lines.
pub fn heading() -> String {
    format!(
        "{rule}\n               Oprnd     Instr           Index   Stack   Status\n\
         Addr  Mnemon   Spec       Reg     Accum   Reg   Pointer  N Z V C  Operand\n{rule}",
        rule = rule()
    )
}

/// One trace line for the instruction fetched at `addr`, formatted from the
/// post-execution machine state.
pub fn trace_line(state: &RunState, addr: u16, traps: &TrapRegistry) -> String {
    let spec = state.ir.spec;
    let op = Op::decode(spec);
    let mnemonic = format!("{:<9}", Op::mnemonic(spec, traps));

    let (ir_field, operand) = match op.addr_mode(spec) {
        None => ("                   ".to_string(), 0),
        Some(mode) => (
            format!(
                "{os:04X},{suffix:<5}{spec:02X}{os:04X}   ",
                os = state.ir.operand,
                suffix = mode.suffix(),
            ),
            state.load_word(mode),
        ),
    };

    format!(
        "{addr:04X}  {mnemonic}{ir_field}{a:04X}   {x:04X}    {sp:04X}    {n} {z} {v} {c}   {operand:04X}",
        a = state.a,
        x = state.x,
        sp = state.sp,
        n = state.n as u8,
        z = state.z as u8,
        v = state.v as u8,
        c = state.c as u8,
    )
}
