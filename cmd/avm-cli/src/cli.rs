//! Command-line options for the standalone `.ao` runner.

use std::path::PathBuf;

use clap::Parser;

pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "avm", author, version = VERSION_STRING, about = "Runs a .ao program against the avm machine", long_about = None)]
pub struct Options {
    /// Path to a compiled `.ao` program file.
    #[arg(long)]
    pub program: PathBuf,

    /// Maximum number of instructions to execute before giving up.
    #[arg(long, default_value_t = 1_000_000)]
    pub max_steps: u64,

    /// Overrides `RUST_LOG` for this run (e.g. `debug`, `avm_core=trace`).
    #[arg(long, env = "AVM_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Lower bound of the `GETTIME` context, as a decimal integer.
    #[arg(long, default_value_t = 0)]
    pub time_lower: u64,

    /// Upper bound of the `GETTIME` context, as a decimal integer.
    #[arg(long, default_value_t = 0)]
    pub time_upper: u64,

    /// If set, checkpoints the machine to an in-memory store after the
    /// run and prints the resulting handle (demonstrates the checkpoint
    /// round trip; the store does not outlive the process).
    #[arg(long)]
    pub checkpoint: bool,
}
