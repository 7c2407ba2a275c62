//! Error taxonomy for the interpreter, loader, and region builder.
//!
//! The interpreter itself never propagates an `Err` for an in-program
//! fault (per §7 of the design: it sets the machine's `break` flag and
//! returns); `RuntimeError` exists for faults outside that contract --
//! host I/O, checkpoint corruption, and malformed ELF input, all of which
//! the driver is expected to handle before a run ever starts or after it
//! ends.

use thiserror::Error;

/// A fault raised during one interpreter step, surfaced to the caller so
/// it can decide whether to keep stepping or unwind.
#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("decode failed at {addr:#010x}: {source}")]
    Decode {
        addr: u32,
        #[source]
        source: mips_asm::DecodeError,
    },

    #[error("store to the zero register observed after step at {pc:#010x}")]
    ZeroRegisterWrite { pc: u32 },

    #[error("reserved trap (teq/tge) taken at {pc:#010x}")]
    ReservedTrap { pc: u32 },

    #[error("sub overflowed at {pc:#010x}")]
    SignedOverflow { pc: u32 },

    #[error("unknown monitor service code {code} at {pc:#010x}")]
    UnknownMonitorService { code: u32, pc: u32 },

    #[error("memory access out of bounds: {addr:#010x} ({len} bytes)")]
    OutOfBounds { addr: u32, len: u32 },
}

/// A fault outside the single-step contract: loading, checkpointing, or
/// host-service I/O.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to read ELF image: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a 32-bit ELF image")]
    NotElf32,

    #[error("ELF machine type is not MIPS ({0:#06x})")]
    WrongMachine(u16),

    #[error("unrecognised ELF data encoding byte {0:#04x}")]
    UnknownDataEncoding(u8),

    #[error("checkpoint magic mismatch: expected {expected:#018x}, found {found:#018x}")]
    BadCheckpointMagic { expected: u64, found: u64 },

    #[error("checkpoint page record truncated")]
    TruncatedCheckpoint,

    #[error("host path is not valid UTF-8")]
    InvalidPath,

    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
}
