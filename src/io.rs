//! Byte-level I/O seams for CHARI and CHARO.
//!
//! The execution loop never touches stdin/stdout directly; it drives a
//! [`ByteSource`] and a [`ByteSink`] so the menu can redirect either end to
//! a file and tests can script input and capture output verbatim.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::Path;
use std::rc::Rc;

/// Where CHARI bytes come from.
pub trait ByteSource {
    /// Next input byte; `None` at end of input.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Return to the start of the input, where that makes sense.
    fn rewind(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Where CHARO bytes go.
pub trait ByteSink {
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    /// Platform end-of-line, substituted for the byte values LF and CR.
    fn write_newline(&mut self) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Interactive keyboard input. The terminal's own line buffering supplies
/// whole lines; bytes are consumed one at a time.
pub struct Keyboard;

impl ByteSource for Keyboard {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match io::stdin().read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }
}

pub struct FileSource {
    reader: BufReader<File>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(FileSource {
            reader: BufReader::new(File::open(path)?),
        })
    }
}

impl ByteSource for FileSource {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.reader.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.reader.rewind()
    }
}

pub struct Screen;

impl ByteSink for Screen {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        let mut out = io::stdout();
        out.write_all(&[byte])?;
        out.flush()
    }

    fn write_newline(&mut self) -> io::Result<()> {
        let mut out = io::stdout();
        writeln!(out)?;
        out.flush()
    }
}

pub struct FileSink {
    file: File,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(FileSink {
            file: File::create(path)?,
        })
    }
}

impl ByteSink for FileSink {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.file.write_all(&[byte])
    }

    fn write_newline(&mut self) -> io::Result<()> {
        writeln!(self.file)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Scripted input for tests.
pub struct ScriptedSource {
    data: Vec<u8>,
    pos: usize,
}

impl ScriptedSource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        ScriptedSource {
            data: data.into(),
            pos: 0,
        }
    }
}

impl ByteSource for ScriptedSource {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        match self.data.get(self.pos) {
            Some(byte) => {
                self.pos += 1;
                Ok(Some(*byte))
            }
            None => Ok(None),
        }
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.pos = 0;
        Ok(())
    }
}

/// Output capture for tests; the returned handle stays readable after the
/// sink is boxed into a [`MachineIo`].
pub struct CapturedSink {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl CapturedSink {
    pub fn new() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let buf = Rc::new(RefCell::new(Vec::new()));
        (CapturedSink { buf: buf.clone() }, buf)
    }
}

impl ByteSink for CapturedSink {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.buf.borrow_mut().push(byte);
        Ok(())
    }

    fn write_newline(&mut self) -> io::Result<()> {
        self.buf.borrow_mut().push(b'\n');
        Ok(())
    }
}

/// The I/O bundle the execution loop drives.
pub struct MachineIo {
    pub input: Box<dyn ByteSource>,
    pub output: Box<dyn ByteSink>,
    /// When tracing with screen output, CHARO follows each byte with a
    /// newline so trace lines stay aligned.
    pub echo_newline: bool,
}

impl MachineIo {
    pub fn keyboard_screen() -> Self {
        MachineIo {
            input: Box::new(Keyboard),
            output: Box::new(Screen),
            echo_newline: false,
        }
    }

    /// Scripted input with captured output, for tests.
    pub fn scripted(input: impl Into<Vec<u8>>) -> (Self, Rc<RefCell<Vec<u8>>>) {
        let (sink, buf) = CapturedSink::new();
        (
            MachineIo {
                input: Box::new(ScriptedSource::new(input)),
                output: Box::new(sink),
                echo_newline: false,
            },
            buf,
        )
    }
}
