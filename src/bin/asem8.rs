use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::{fs, io};

use clap::Parser;
use colored::Colorize;

use pep8::trap::TrapRegistry;
use pep8::{listing, obj, parser};

/// Two-pass assembler for the Pep/8 virtual machine.
///
/// Translates a `.pep` source file into a `.pepo` object file, with an
/// optional `.pepl` listing. The `trap` registry file must be present in
/// the working directory.
#[derive(Parser)]
#[command(name = "asem8")]
struct Args {
    /// Print the version banner
    #[arg(short = 'v')]
    version: bool,

    /// Write an assembler listing beside the object file
    #[arg(short = 'l')]
    listing: bool,

    /// Source file to assemble (must end in .pep)
    source: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if args.version {
        eprintln!("Pep/8 Assembler, version {}", env!("CARGO_PKG_VERSION"));
    }
    let Some(source) = args.source else {
        if args.listing {
            eprintln!("usage: asem8 [-v] [[-l] sourceFile]");
            return ExitCode::from(2);
        }
        return ExitCode::SUCCESS;
    };

    let path = source.to_string_lossy().into_owned();
    if !path.ends_with(".pep") {
        eprintln!("Source file should have a \".pep\" extension");
        return ExitCode::from(2);
    }
    let traps = match TrapRegistry::load("trap") {
        Ok(traps) => traps,
        Err(report) => {
            eprintln!("{report:?}");
            return ExitCode::from(1);
        }
    };
    let src = match fs::read_to_string(&source) {
        Ok(src) => src,
        Err(_) => {
            eprintln!("Could not open {path}.");
            return ExitCode::from(3);
        }
    };

    println!("{:>12} target {path}", "Assembling".green().bold());
    let air = match parser::assemble(&src, &traps) {
        Ok(air) => air,
        Err(errors) => {
            if errors.len() == 1 {
                eprintln!("1 error was detected. No object code generated.");
            } else {
                eprintln!(
                    "{} errors were detected. No object code generated.",
                    errors.len()
                );
            }
            for error in &errors {
                eprintln!("{:?}", error.report(&src));
            }
            return ExitCode::from(1);
        }
    };

    if args.listing {
        let listing_path = format!("{path}l");
        if let Err(e) = write_to(&listing_path, |w| listing::write_listing(w, &air, &src, &traps))
        {
            eprintln!("Could not write {listing_path}: {e}");
            return ExitCode::from(1);
        }
        println!("{:>12} {listing_path}", "Listing".green().bold());
    }

    let object_path = format!("{path}o");
    if let Err(e) = write_to(&object_path, |w| obj::write_object(w, &air.object_bytes())) {
        eprintln!("Could not write {object_path}: {e}");
        return ExitCode::from(1);
    }
    println!("{:>12} {object_path}", "Finished".green().bold());
    ExitCode::SUCCESS
}

fn write_to(
    path: &str,
    write: impl FnOnce(&mut io::BufWriter<File>) -> io::Result<()>,
) -> io::Result<()> {
    let mut file = io::BufWriter::new(File::create(path)?);
    write(&mut file)?;
    file.flush()
}
