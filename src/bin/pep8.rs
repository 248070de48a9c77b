use std::process::ExitCode;

use clap::Parser;

use pep8::monitor::{self, Monitor};
use pep8::trap::TrapRegistry;

/// Interactive simulator for the Pep/8 virtual machine.
///
/// Boots from the `pep8os.pepo` ROM image and the `trap` registry in the
/// working directory, then offers the load/execute/dump/trace menu.
#[derive(Parser)]
#[command(name = "pep8")]
struct Args {
    /// Print the version banner
    #[arg(short = 'v')]
    version: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if args.version {
        println!("Pep/8 Simulator, version {}", env!("CARGO_PKG_VERSION"));
    }
    let traps = match TrapRegistry::load("trap") {
        Ok(traps) => traps,
        Err(report) => {
            eprintln!("{report:?}");
            return ExitCode::from(1);
        }
    };
    let state = match monitor::boot("pep8os.pepo") {
        Ok(state) => state,
        Err(report) => {
            eprintln!("{report:?}");
            return ExitCode::from(3);
        }
    };
    let mut monitor = Monitor::new(state, &traps);
    if let Err(e) = monitor.run() {
        eprintln!("{e}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}
