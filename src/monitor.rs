//! The simulator's interactive menu: load, execute, dump, trace, input and
//! output redirection. One command per prompt, invalid responses re-prompt.
//!
//! All shared machine state lives in the [`RunState`] owned here; the menu
//! only ever mutates it through the execution loop.

use std::fs;
use std::io::{self, BufRead, Write};

use crate::io::{FileSink, FileSource, Keyboard, MachineIo, Screen};
use crate::isa::Op;
use crate::obj;
use crate::runtime::{RunState, RuntimeError, RuntimeErrorKind, Status, StepError};
use crate::trace::{self, PagerAction, TraceMode};
use crate::trap::TrapRegistry;

const DEFAULT_PAGE_LINES: usize = 22;
const MIN_PAGE_LINES: usize = 8;

pub struct Monitor<'a> {
    state: RunState,
    traps: &'a TrapRegistry,
    io: MachineIo,
    keyboard_input: bool,
    screen_output: bool,
    machine_loaded: bool,
    trace_mode: TraceMode,
    single_step: bool,
    scrolling: bool,
    page_lines: usize,
}

impl<'a> Monitor<'a> {
    pub fn new(state: RunState, traps: &'a TrapRegistry) -> Self {
        Monitor {
            state,
            traps,
            io: MachineIo::keyboard_screen(),
            keyboard_input: true,
            screen_output: true,
            machine_loaded: false,
            trace_mode: TraceMode::Off,
            single_step: false,
            scrolling: false,
            page_lines: DEFAULT_PAGE_LINES,
        }
    }

    /// The main menu loop; returns when the user quits or stdin closes.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            print!("\n(l)oad  e(x)ecute  (d)ump  (t)race  (i)nput  (o)utput  (q)uit: ");
            io::stdout().flush()?;
            let Some(line) = read_line()? else { break };
            match first_char(&line) {
                'L' => self.cmd_load()?,
                'X' => self.cmd_execute()?,
                'D' => self.cmd_dump()?,
                'T' => self.cmd_trace()?,
                'I' => self.cmd_input()?,
                'O' => self.cmd_output()?,
                'Q' => break,
                ' ' => {}
                _ => println!("Invalid command."),
            }
        }
        self.io.output.flush()
    }

    /// Run the OS loader over a user object file.
    fn cmd_load(&mut self) -> io::Result<()> {
        if !self.keyboard_input {
            println!("Data input switched back to keyboard.");
            self.io.input = Box::new(Keyboard);
            self.keyboard_input = true;
        }
        print!("Enter object file name (do not include .pepo): ");
        io::stdout().flush()?;
        let Some(line) = read_line()? else { return Ok(()) };
        let name = format!("{}.pepo", line.trim_end());
        match FileSource::open(&name) {
            Ok(source) => {
                println!("Object file is {name}");
                self.machine_loaded = true;
                self.io.input = Box::new(source);
                self.state.begin_load();
                self.execute()?;
                self.io.input = Box::new(Keyboard);
            }
            Err(_) => println!("Could not open object file {name}"),
        }
        Ok(())
    }

    fn cmd_execute(&mut self) -> io::Result<()> {
        if !self.machine_loaded {
            println!("Execution error: Machine state not initialized.");
            println!("Use (l)oad command.");
            return Ok(());
        }
        self.state.begin_execute();
        self.execute()
    }

    /// The von Neumann loop with tracing and fault reporting.
    fn execute(&mut self) -> io::Result<()> {
        let tracing = self.trace_mode != TraceMode::Off;
        let mut line_count = 6;
        if tracing && !self.single_step {
            println!("{}", self.trace_mode.title());
            println!();
            println!("{}", trace::heading());
        }
        self.io.echo_newline = tracing && self.screen_output;
        loop {
            let trace_addr = self.state.pc;
            let status = match self.state.step(&mut self.io) {
                Ok(status) => status,
                Err(StepError::Runtime(e)) => {
                    self.print_runtime_error(e);
                    break;
                }
                Err(StepError::Io(e)) => {
                    self.io.echo_newline = false;
                    return Err(e);
                }
            };
            let mut halt = status == Status::Halted;
            if tracing {
                halt |= self.trace_step(trace_addr, &mut line_count)?;
            }
            if halt {
                break;
            }
        }
        if tracing {
            println!("{}", trace::rule());
        }
        self.io.echo_newline = false;
        if !self.keyboard_input {
            self.io.input.rewind()?;
        }
        Ok(())
    }

    /// Emit one trace line if the traced scope covers it, then run the
    /// pager. Returns true when the user quits the trace.
    fn trace_step(&mut self, addr: u16, line_count: &mut usize) -> io::Result<bool> {
        if !self.trace_mode.covers(addr, self.state.rom_start()) {
            return Ok(false);
        }
        print!("{}", trace::trace_line(&self.state, addr, self.traps));
        if self.scrolling {
            println!();
            return Ok(false);
        }
        if self.single_step {
            print!(": ");
            io::stdout().flush()?;
            match self.trace_prompt()? {
                PagerAction::NextPage => {
                    self.single_step = false;
                    println!();
                    println!("{}", trace::heading());
                    *line_count = 4;
                }
                PagerAction::Scroll => {
                    self.single_step = false;
                    self.scrolling = true;
                    println!();
                    println!("{}", trace::heading());
                }
                PagerAction::Quit => {
                    self.single_step = false;
                    println!();
                    println!("{}", trace::rule());
                    return Ok(true);
                }
                PagerAction::SingleStep | PagerAction::Stay => {}
            }
            return Ok(false);
        }
        println!();
        *line_count += 1;
        if *line_count >= self.page_lines {
            print!("(n)ext page  s(c)roll  (s)ingle step  (q)uit trace: ");
            io::stdout().flush()?;
            match self.trace_prompt()? {
                PagerAction::NextPage => {
                    println!();
                    println!("{}", trace::heading());
                    *line_count = 4;
                }
                PagerAction::Scroll => {
                    self.scrolling = true;
                    println!();
                    println!("{}", trace::heading());
                }
                PagerAction::SingleStep => self.single_step = true,
                PagerAction::Quit => {
                    println!();
                    println!("{}", trace::rule());
                    return Ok(true);
                }
                PagerAction::Stay => {}
            }
        }
        Ok(false)
    }

    /// Read prompt responses until one is valid.
    fn trace_prompt(&self) -> io::Result<PagerAction> {
        loop {
            let Some(line) = read_line()? else {
                return Ok(PagerAction::Quit);
            };
            match trace::parse_response(&line) {
                Some(action) => return Ok(action),
                None => {
                    println!("Invalid response");
                    print!("(n)ext page  s(c)roll  (s)ingle step  (q)uit trace: ");
                    io::stdout().flush()?;
                }
            }
        }
    }

    fn print_runtime_error(&self, e: RuntimeError) {
        print!("Runtime error at {:04X}:  ", e.addr);
        match e.kind {
            RuntimeErrorKind::EndOfInput => {
                println!("File read error or read past end of file.");
            }
            RuntimeErrorKind::IllegalMode(mode) => {
                println!(
                    "Illegal addressing mode {} with {}",
                    mode.name(),
                    Op::mnemonic(e.spec, self.traps)
                );
            }
        }
    }

    fn cmd_dump(&mut self) -> io::Result<()> {
        print!("Pep/8 memory dump:  ");
        loop {
            println!();
            println!("Enter address range of dump (HEX)");
            print!("Example, 0020-0140: ");
            io::stdout().flush()?;
            let Some(line) = read_line()? else { return Ok(()) };
            let Some((start, end)) = parse_range(line.trim()) else {
                println!("Error in hex specification. Enter Again.");
                continue;
            };
            let end = if end == 0 { start } else { end };
            if start > end {
                println!("Address range error. Start address must be less than end address.");
                continue;
            }
            let stdout = io::stdout();
            return dump(&mut stdout.lock(), &self.state, start, end);
        }
    }

    fn cmd_trace(&mut self) -> io::Result<()> {
        self.single_step = false;
        self.scrolling = false;
        loop {
            print!("Trace  (p)rogram  (t)rap  (l)oader, or (a)djust display: ");
            io::stdout().flush()?;
            let Some(line) = read_line()? else { return Ok(()) };
            match first_char(&line) {
                'P' => {
                    self.trace_mode = TraceMode::Program;
                    self.cmd_execute()?;
                    break;
                }
                'T' => {
                    self.trace_mode = TraceMode::Traps;
                    self.cmd_execute()?;
                    break;
                }
                'L' => {
                    self.trace_mode = TraceMode::Loader;
                    self.cmd_load()?;
                    break;
                }
                'A' => {
                    print!("Number of lines per screen dump ({}): ", self.page_lines);
                    io::stdout().flush()?;
                    let Some(line) = read_line()? else { return Ok(()) };
                    let lines = line.trim().parse().unwrap_or(0);
                    self.page_lines = lines.max(MIN_PAGE_LINES);
                    println!();
                }
                ' ' => break,
                _ => println!("Invalid response."),
            }
        }
        self.trace_mode = TraceMode::Off;
        Ok(())
    }

    fn cmd_input(&mut self) -> io::Result<()> {
        loop {
            print!("Input from  (k)eyboard  (f)ile: ");
            io::stdout().flush()?;
            let Some(line) = read_line()? else { return Ok(()) };
            match first_char(&line) {
                'K' | ' ' => {
                    self.io.input = Box::new(Keyboard);
                    self.keyboard_input = true;
                    if first_char(&line) == 'K' {
                        println!("Input is from keyboard.");
                    }
                    return Ok(());
                }
                'F' => {
                    print!("Enter input data file name: ");
                    io::stdout().flush()?;
                    let Some(name) = read_line()? else { return Ok(()) };
                    let name = name.trim().to_string();
                    match FileSource::open(&name) {
                        Ok(source) => {
                            self.io.input = Box::new(source);
                            self.keyboard_input = false;
                            println!("Input data file is {name}");
                        }
                        Err(_) => {
                            self.io.input = Box::new(Keyboard);
                            self.keyboard_input = true;
                            println!("Could not open input data file {name}");
                        }
                    }
                    return Ok(());
                }
                _ => println!("Invalid response."),
            }
        }
    }

    fn cmd_output(&mut self) -> io::Result<()> {
        loop {
            print!("Output to  (s)creen  (f)ile:  ");
            io::stdout().flush()?;
            let Some(line) = read_line()? else { return Ok(()) };
            match first_char(&line) {
                'S' | ' ' => {
                    self.io.output.flush()?;
                    self.io.output = Box::new(Screen);
                    self.screen_output = true;
                    if first_char(&line) == 'S' {
                        println!("Output is to screen.");
                    }
                    return Ok(());
                }
                'F' => {
                    print!("Enter output data file name: ");
                    io::stdout().flush()?;
                    let Some(name) = read_line()? else { return Ok(()) };
                    let name = name.trim().to_string();
                    self.io.output.flush()?;
                    match FileSink::create(&name) {
                        Ok(sink) => {
                            self.io.output = Box::new(sink);
                            self.screen_output = false;
                            println!("Output data file is {name}");
                        }
                        Err(_) => {
                            self.io.output = Box::new(Screen);
                            self.screen_output = true;
                            println!("Error opening file {name}");
                        }
                    }
                    return Ok(());
                }
                _ => println!("Invalid response."),
            }
        }
    }
}

/// Load the OS ROM image from `pep8os.pepo` into a fresh machine.
pub fn boot(rom_path: &str) -> Result<RunState, miette::Report> {
    let text = fs::read_to_string(rom_path).map_err(|_| {
        miette::miette!(
            severity = miette::Severity::Error,
            "Could not open file {rom_path}"
        )
    })?;
    let image = obj::parse_object(&text)?;
    let mut state = RunState::new();
    state.install_rom(&image)?;
    println!("{} bytes RAM free.", state.rom_start());
    Ok(state)
}

/// Hex + ASCII dump of an inclusive address range, sixteen bytes per row,
/// the start aligned down to a sixteen-byte boundary.
pub fn dump<W: Write>(w: &mut W, state: &RunState, start: u16, end: u16) -> io::Result<()> {
    writeln!(
        w,
        "DUMP    0  1  2  3  4  5  6  7  8  9  A  B  C  D  E  F       ASCII"
    )?;
    writeln!(w)?;
    let mut row = (start & 0xFFF0) as u32;
    while row <= end as u32 {
        write!(w, "{row:04X}:  ")?;
        for i in 0u16..16 {
            write!(w, "{:02X} ", state.read_byte(row as u16 + i))?;
        }
        write!(w, " ")?;
        for i in 0u16..16 {
            let byte = state.read_byte(row as u16 + i);
            let shown = if (0x20..=0x7E).contains(&byte) {
                byte as char
            } else {
                '.'
            };
            write!(w, "{shown}")?;
        }
        writeln!(w)?;
        row += 16;
    }
    Ok(())
}

/// `XXXX-YYYY` with exactly four hex digits on each side.
fn parse_range(line: &str) -> Option<(u16, u16)> {
    let bytes = line.as_bytes();
    if bytes.len() < 9 || bytes[4] != b'-' {
        return None;
    }
    let start = u16::from_str_radix(line.get(0..4)?, 16).ok()?;
    let end = u16::from_str_radix(line.get(5..9)?, 16).ok()?;
    Some((start, end))
}

/// One line from stdin, `None` at end of input.
fn read_line() -> io::Result<Option<String>> {
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line)? {
        0 => Ok(None),
        _ => Ok(Some(line)),
    }
}

/// Upper-cased first character of a response, NUL for an empty line.
fn first_char(line: &str) -> char {
    line.trim_end_matches(['\n', '\r'])
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('\0')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dump_aligns_down_and_formats() {
        let mut state = RunState::new();
        state.load_image(0x0010, &[0xDA, 0x55, 0xAA, 0x00]);
        let mut out = Vec::new();
        dump(&mut out, &state, 0x0013, 0x0013).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "DUMP    0  1  2  3  4  5  6  7  8  9  A  B  C  D  E  F       ASCII"
        );
        assert_eq!(lines[1], "");
        assert_eq!(
            lines[2],
            "0010:  DA 55 AA 00 00 00 00 00 00 00 00 00 00 00 00 00  .U.............."
        );
    }

    #[test]
    fn dump_covers_inclusive_range() {
        let state = RunState::new();
        let mut out = Vec::new();
        dump(&mut out, &state, 0x0000, 0x0020).unwrap();
        let text = String::from_utf8(out).unwrap();
        // rows at 0000, 0010, and 0020
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn range_parsing() {
        assert_eq!(parse_range("0020-0140"), Some((0x0020, 0x0140)));
        assert_eq!(parse_range("FFF0-FFFF"), Some((0xFFF0, 0xFFFF)));
        assert_eq!(parse_range("20-140"), None);
        assert_eq!(parse_range("00XX-0140"), None);
        assert_eq!(parse_range(""), None);
    }

    #[test]
    fn menu_responses() {
        assert_eq!(first_char("load\n"), 'L');
        assert_eq!(first_char("\n"), '\0');
        assert_eq!(first_char("x"), 'X');
    }
}
