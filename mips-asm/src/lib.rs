//! Typed instruction model for a 32-bit MIPS-like RISC core.
//!
//! [`Instruction`] is the single authority on instruction identity: both the
//! interpreter and the (external) region translator dispatch on the variant
//! produced by [`Instruction::decode`]. Everything else in this crate --
//! defines/uses, constant folding, translatability -- is a pure function of
//! that variant, so the two consumers never disagree about what an encoded
//! word means.

mod constfold;
mod decode_error;
mod fields;
mod instruction;
mod semantics;

pub use constfold::ConstState;
pub use decode_error::DecodeError;
pub use fields::{sign_extend_16, sign_extend_8, Fields};
pub use instruction::{FpFmt, Instruction, Mnemonic};
pub use semantics::{Location, Precision};

/// A register index in `0..32`. Index 0 is the hard-wired zero register.
pub type Reg = u8;

/// A 32-bit encoded instruction word.
pub type RawInstruction = u32;

/// Reserved funct code for the monitor (host-service) trap, within the
/// R-type (`opcode == 0`) category.
pub const FUNCT_MONITOR: u32 = 0x05;

/// Length in bytes of an encoded instruction. Used throughout the
/// interpreter and CFG layers to advance `pc` and to compute successor
/// addresses.
pub const INSTRUCTION_LEN: u32 = 4;
