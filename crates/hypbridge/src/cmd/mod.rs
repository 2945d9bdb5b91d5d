use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod envinfo;
pub mod probe;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a program against a replaying generator and print what it asked.
    Run(RunArgs),
    /// Act as an instrumented program against an existing generator.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Values answered to RAND, in order (comma-separated, decimal or 0x hex).
    #[arg(long, value_delimiter = ',', value_parser = run::parse_value)]
    pub values: Vec<u32>,
    /// Value answered to RAND once --values is exhausted.
    #[arg(long, default_value = "0", value_parser = run::parse_value)]
    pub fallback: u32,
    /// Program to run, followed by its arguments.
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "PROGRAM"
    )]
    pub program: Vec<OsString>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Steps to perform: `rand`, `start:LABEL` or `end`. TERMINATE is always sent last.
    #[arg(value_name = "STEP")]
    pub steps: Vec<probe::Step>,
    /// Command pipe path. Defaults to the environment.
    #[arg(long, value_name = "PATH")]
    pub commands: Option<PathBuf>,
    /// Result pipe path. Defaults to the environment.
    #[arg(long, value_name = "PATH")]
    pub results: Option<PathBuf>,
    /// Give up on a result after this many milliseconds.
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}
