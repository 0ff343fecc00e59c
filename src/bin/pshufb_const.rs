//! Table generator binary.
//!
//! Prints the `__m512i` declarations for every `/** pshufb` block found in
//! the given files. Set `RUST_LOG=debug` to trace the blocks on stderr.

use std::io;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Generate AVX-512 byte tables from annotated source comments")]
struct Cli {
    /// Source files to scan, processed in order
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = pshufb_const::run(&cli.files, &mut out) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
