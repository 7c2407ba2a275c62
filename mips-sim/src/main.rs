//! Command-line driver: load an ELF image, run it to completion on the
//! interpreter, and optionally save a checkpoint when the guest halts.
//!
//! This binds together the four public entry points described in the
//! design (interpret one step, little/big-endian, with or without CFG
//! discovery) into a single loop: endianness is a runtime property of
//! the loaded image rather than a compile-time choice, so one
//! `Interpreter::step` call serves all four; `--cfg` toggles discovery.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;
use mips_vm::{checkpoint, elf, Interpreter, MachineState, Monitor};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "mips-sim", about = "Run a MIPS-like ELF binary on the user-mode simulator")]
struct Cli {
    /// Path to a 32-bit MIPS ELF executable.
    image: PathBuf,

    /// Arguments passed to the guest program as argv[1..].
    #[arg(long = "arg")]
    args: Vec<String>,

    /// Discover the basic-block graph (and build hot regions) while running.
    #[arg(long)]
    cfg: bool,

    /// Guest address space size in bytes.
    #[arg(long, default_value_t = 0x0400_0000)]
    memory_size: usize,

    /// Trap on signed overflow in `sub` (§9 open question; off matches `subu`'s wraparound).
    #[arg(long)]
    trap_on_overflow: bool,

    /// Basic-block entry count at which a region is built from CFG discovery.
    #[arg(long, default_value_t = 10)]
    hot_threshold: u64,

    /// Use the host wall clock for gettimeofday/times instead of the synthetic icnt-derived one.
    #[arg(long)]
    real_clock: bool,

    /// Write a checkpoint of the final machine state here once the guest halts.
    #[arg(long)]
    checkpoint_out: Option<PathBuf>,

    /// Cap on retired instructions, to bound runs of guest code that never halts.
    #[arg(long)]
    max_steps: Option<u64>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Runtime(#[from] mips_vm::RuntimeError),
    #[error(transparent)]
    Interpreter(#[from] mips_vm::InterpreterError),
    #[error("failed to read {path}: {source}")]
    ReadImage { path: PathBuf, source: std::io::Error },
    #[error("failed to write checkpoint to {path}: {source}")]
    WriteCheckpoint { path: PathBuf, source: std::io::Error },
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let bytes = std::fs::read(&cli.image).map_err(|source| CliError::ReadImage { path: cli.image.clone(), source })?;
    let image = elf::load(&bytes, cli.memory_size)?;

    let mut state = MachineState::new(image.memory, image.endian);
    state.pc = image.entry;

    let mut argv = vec![cli.image.to_string_lossy().into_owned()];
    argv.extend(cli.args.iter().cloned());
    let mut monitor = Monitor::new(argv);
    monitor.real_clock = cli.real_clock;

    let mut interp = Interpreter::new(cli.cfg, monitor);
    interp.trap_on_signed_overflow = cli.trap_on_overflow;
    interp.hot_threshold = cli.hot_threshold;

    tracing::info!(entry = image.entry, endian = ?image.endian, symbols = image.symbols.len(), "loaded image");

    loop {
        if let Some(max) = cli.max_steps {
            if state.icnt >= max {
                tracing::warn!(icnt = state.icnt, "max-steps reached, stopping");
                break;
            }
        }
        interp.step(&mut state)?;
        if state.break_flag {
            tracing::info!(pc = state.pc, icnt = state.icnt, "guest halted");
            break;
        }
    }

    if cli.cfg {
        tracing::info!(blocks = interp.cfg.len(), regions = interp.regions.len(), "cfg discovery summary");
    }

    if let Some(path) = &cli.checkpoint_out {
        let file = File::create(path).map_err(|source| CliError::WriteCheckpoint { path: path.clone(), source })?;
        checkpoint::save(&state, BufWriter::new(file)).map_err(|e| match e {
            mips_vm::RuntimeError::Io(source) => CliError::WriteCheckpoint { path: path.clone(), source },
            other => other.into(),
        })?;
        tracing::info!(path = %path.display(), "checkpoint written");
    }

    Ok(())
}
