//! The `.pepo` object-file format: uppercase hex byte pairs separated by
//! single spaces, sixteen to a line, terminated by the `zz` sentinel.
//! The same format carries the OS ROM image.

use std::io::{self, Write};

use miette::{miette, Report, Severity};

const BYTES_PER_LINE: usize = 16;

/// Write an object image. The sentinel gets its own separator, so a full
/// last line ends `...FF\nzz` and a partial one `...FF zz`.
pub fn write_object<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    for (i, byte) in bytes.iter().enumerate() {
        write!(w, "{byte:02X}")?;
        if (i + 1) % BYTES_PER_LINE == 0 {
            writeln!(w)?;
        } else {
            write!(w, " ")?;
        }
    }
    writeln!(w, "zz")
}

/// Parse an object image. Reading stops at the `zz` sentinel; everything
/// before it must be hex digits, spaces, and newlines.
pub fn parse_object(text: &str) -> Result<Vec<u8>, Report> {
    let mut bytes = Vec::new();
    let mut high: Option<u8> = None;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            'z' => {
                if high.is_some() {
                    return Err(bad_input("odd number of hex digits before 'zz'"));
                }
                if chars.next() != Some('z') {
                    return Err(missing_sentinel());
                }
                return Ok(bytes);
            }
            c if c.is_ascii_hexdigit() => {
                let digit = c.to_digit(16).unwrap() as u8;
                match high.take() {
                    Some(h) => bytes.push(h << 4 | digit),
                    None => high = Some(digit),
                }
            }
            ' ' | '\n' => {
                if high.is_some() {
                    return Err(bad_input("hex digits must come in pairs"));
                }
            }
            _ => return Err(bad_input("only hex digits, spaces, and newlines may precede 'zz'")),
        }
    }
    Err(missing_sentinel())
}

fn bad_input(help: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "obj::invalid",
        help = help.to_string(),
        "Invalid input in object file.",
    )
}

fn missing_sentinel() -> Report {
    miette!(
        severity = Severity::Error,
        code = "obj::sentinel",
        "File must end in 'zz'.",
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_short() {
        let bytes = vec![0x49, 0x00, 0x07, 0x00];
        let mut out = Vec::new();
        write_object(&mut out, &bytes).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "49 00 07 00 zz\n");
        assert_eq!(parse_object(&text).unwrap(), bytes);
    }

    #[test]
    fn wraps_at_sixteen_bytes() {
        let bytes: Vec<u8> = (0..18).collect();
        let mut out = Vec::new();
        write_object(&mut out, &bytes).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F"
        );
        assert_eq!(lines[1], "10 11 zz");
        assert_eq!(parse_object(&text).unwrap(), bytes);
    }

    #[test]
    fn parse_stops_at_sentinel() {
        let parsed = parse_object("AB cd\nzz\ntrailing garbage ignored").unwrap();
        assert_eq!(parsed, vec![0xAB, 0xCD]);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(parse_object("AB QQ zz").is_err());
        assert!(parse_object("AB C zz").is_err());
        assert!(parse_object("AB CD").is_err());
        assert!(parse_object("AB z").is_err());
    }

    #[test]
    fn empty_image() {
        assert_eq!(parse_object("zz\n").unwrap(), Vec::<u8>::new());
    }
}
