//! Eikobot CLI - standalone binary
//!
//! Entry point for the `eikobot` command-line tool.
//!
//! The binary is a thin wrapper around [`eiko_cli::run_cli`], handling
//! error display and exit codes. All command logic lives in the library
//! crate so it can be tested.
//!
//! # Exit Codes
//!
//! - `0` - Success
//! - `1` - Compile or deploy failure (diagnostics printed to stderr)

fn main() {
    if let Err(e) = eiko_cli::run_cli() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
