//! Machine state, memory, ELF loading, checkpointing, CFG discovery, and
//! the interpreter loop for a 32-bit MIPS-like core.
//!
//! [`interpreter::Interpreter`] is the composition root: it owns the
//! [`cfg::Cfg`] being discovered, the [`monitor::Monitor`] host-service
//! dispatcher, and drives a [`state::MachineState`] forward one
//! instruction at a time. Everything else in this crate is either state
//! ([`state`], [`memory`]), setup ([`elf`], [`checkpoint`]), or a pure
//! analysis pass over an already-built CFG ([`region`],
//! [`function_discovery`]).

pub mod cfg;
pub mod checkpoint;
pub mod elf;
pub mod endian;
pub mod error;
pub mod function_discovery;
pub mod interpreter;
pub mod memory;
pub mod monitor;
pub mod region;
pub mod state;

pub use cfg::{BasicBlock, BlockFlags, BlockId, Cfg};
pub use elf::{LoadedImage, Symbol};
pub use endian::Endian;
pub use error::{InterpreterError, RuntimeError};
pub use function_discovery::DiscoveryStatus;
pub use interpreter::Interpreter;
pub use memory::Memory;
pub use monitor::Monitor;
pub use region::{Region, RegionPolicy};
pub use state::MachineState;
