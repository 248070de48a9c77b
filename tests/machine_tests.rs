//! End-to-end tests over the library: source text through the assembler,
//! object bytes through the simulator, with scripted I/O.

use pep8::io::MachineIo;
use pep8::parser;
use pep8::runtime::{RunState, INTERRUPT_PC_VEC, LOADER_PC_VEC, SYSTEM_SP_VEC, USER_SP_VEC};
use pep8::trap::TrapRegistry;

fn traps() -> TrapRegistry {
    TrapRegistry::parse(
        "NOP0\nNOP1\nNOP2\nNOP3\nNOP i\nDECI d n s sf x sx sxf\nDECO i d n s sf x sx sxf\nSTRO d n s sf x sx sxf\n",
    )
    .unwrap()
}

/// Assemble a source text and return its object bytes.
fn assemble(src: &str) -> Vec<u8> {
    let traps = traps();
    let air = parser::assemble(src, &traps).expect("fixture sources must assemble");
    air.object_bytes()
}

/// Run an object image from address zero with scripted input; returns the
/// final state and captured output.
fn execute(object: &[u8], input: &[u8]) -> (RunState, Vec<u8>) {
    let mut state = RunState::new();
    state.load_image(0, object);
    let (mut io, out) = MachineIo::scripted(input.to_vec());
    state.run(&mut io).expect("program must halt cleanly");
    let bytes = out.borrow().clone();
    (state, bytes)
}

/// A ten-byte operating system: a loader that stops, a trap dispatcher
/// that returns, and the four vectors, burned so its last byte lands at
/// 0xFFFF.
const MINI_OS: &str = "\
         .BURN   0xFFFF
loader:  STOP
isr:     RETTR
         .ADDRSS usrSp     ;user stack pointer
         .ADDRSS sysSp     ;system stack pointer
         .ADDRSS loader    ;loader entry point
         .ADDRSS isr       ;trap dispatcher
usrSp:   .EQUATE 0xFBCF
sysSp:   .EQUATE 0xFF00
         .END
";

#[test]
fn echo_round_trip() {
    let object = assemble(
        " CHARI ch,d\n CHARO ch,d\n STOP\nch: .BLOCK 1\n .END\n",
    );
    let (_, out) = execute(&object, b"x");
    assert_eq!(out, b"x");
}

#[test]
fn string_printing_round_trip() {
    let object = assemble(
        "\
         LDA    0x0000,i
         LDX    0x0000,i
loop:    LDBYTEA msg,x
         BREQ   done
         CHARO  msg,x
         ADDX   0x0001,i
         BR     loop
done:    STOP
msg:     .ASCII \"hi there\\x00\"
         .END
",
    );
    let (_, out) = execute(&object, b"");
    assert_eq!(out, b"hi there");
}

#[test]
fn mini_os_assembles_onto_the_vectors() {
    let traps = traps();
    let air = parser::assemble(MINI_OS, &traps).unwrap();
    let object = air.object_bytes();
    assert_eq!(object.len(), 10);

    let mut state = RunState::new();
    state.install_rom(&object).unwrap();
    assert_eq!(state.rom_start(), 0xFFF6);
    assert_eq!(state.read_word(USER_SP_VEC), 0xFBCF);
    assert_eq!(state.read_word(SYSTEM_SP_VEC), 0xFF00);
    assert_eq!(state.read_word(LOADER_PC_VEC), 0xFFF6);
    assert_eq!(state.read_word(INTERRUPT_PC_VEC), 0xFFF7);
    // the loader entry is a STOP in ROM
    assert_eq!(state.read_byte(0xFFF6), 0x00);
}

#[test]
fn unary_trap_round_trip_through_the_os() {
    let os = assemble(MINI_OS);
    let program = assemble(" NOP0\n STOP\n .END\n");

    let mut state = RunState::new();
    state.install_rom(&os).unwrap();
    state.load_image(0, &program);
    state.begin_execute();
    assert_eq!(state.sp, 0xFBCF);
    state.a = 0x1234;
    state.x = 0x5678;
    state.set_flag_bits(0b0101);

    let (mut io, _) = MachineIo::scripted(b"".to_vec());
    state.run(&mut io).unwrap();

    // the trap vectored through ROM and RETTR restored the caller
    assert_eq!(state.a, 0x1234);
    assert_eq!(state.x, 0x5678);
    assert_eq!(state.sp, 0xFBCF);
    assert_eq!(state.flag_bits(), 0b0101);
    assert_eq!(state.pc, 0x0002);
}

#[test]
fn nonunary_trap_resumes_past_its_operand() {
    let os = assemble(MINI_OS);
    let program = assemble(" DECI n,d\n STOP\nn: .BLOCK 2\n .END\n");

    let mut state = RunState::new();
    state.install_rom(&os).unwrap();
    state.load_image(0, &program);
    state.begin_execute();

    let (mut io, _) = MachineIo::scripted(b"".to_vec());
    state.run(&mut io).unwrap();

    // the dispatcher is a bare RETTR, so the word at n stays untouched and
    // execution resumes at the STOP after the three-byte trap instruction
    assert_eq!(state.read_word(0x0004), 0x0000);
    assert_eq!(state.pc, 0x0004);
}

#[test]
fn charo_is_byte_transparent_outside_line_endings() {
    // CHARO of a CR byte is normalized, so byte-transparent output must
    // avoid 10 and 13
    let object = assemble(" CHARO 0x00FE,i\n CHARO 0x000D,i\n STOP\n .END\n");
    let (_, out) = execute(&object, b"");
    assert_eq!(out, vec![0xFE, b'\n']);
}
