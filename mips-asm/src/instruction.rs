//! The decoded instruction model.
//!
//! [`Instruction::decode`] is a pure function: same word and address in,
//! same variant out, every time. It is the only place in the workspace that
//! is allowed to know how opcode/funct bits map onto instruction identity.

use crate::fields::{sign_extend_16, Fields};
use crate::{DecodeError, Reg};

/// Floating point format selector used by the coprocessor-1 instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FpFmt {
    Single,
    Double,
    Word,
}

impl FpFmt {
    /// Decode the 5-bit `fmt` field of a cp1 instruction.
    fn from_field(fmt: u8) -> Option<Self> {
        match fmt {
            0x10 => Some(Self::Single),
            0x11 => Some(Self::Double),
            0x14 => Some(Self::Word),
            _ => None,
        }
    }
}

/// Opcode of the top-level dispatch (bits `[31:26]`).
mod opcode {
    pub const SPECIAL: u32 = 0x00;
    pub const REGIMM: u32 = 0x01;
    pub const J: u32 = 0x02;
    pub const JAL: u32 = 0x03;
    pub const BEQ: u32 = 0x04;
    pub const BNE: u32 = 0x05;
    pub const BLEZ: u32 = 0x06;
    pub const BGTZ: u32 = 0x07;
    pub const ADDI: u32 = 0x08;
    pub const ADDIU: u32 = 0x09;
    pub const SLTI: u32 = 0x0A;
    pub const SLTIU: u32 = 0x0B;
    pub const ANDI: u32 = 0x0C;
    pub const ORI: u32 = 0x0D;
    pub const XORI: u32 = 0x0E;
    pub const LUI: u32 = 0x0F;
    pub const COP0: u32 = 0x10;
    pub const COP1: u32 = 0x11;
    pub const COP1X: u32 = 0x13;
    pub const BEQL: u32 = 0x14;
    pub const BNEL: u32 = 0x15;
    pub const BLEZL: u32 = 0x16;
    pub const BGTZL: u32 = 0x17;
    pub const SPECIAL2: u32 = 0x1C;
    pub const SPECIAL3: u32 = 0x1F;
    pub const LB: u32 = 0x20;
    pub const LH: u32 = 0x21;
    pub const LWL: u32 = 0x22;
    pub const LW: u32 = 0x23;
    pub const LBU: u32 = 0x24;
    pub const LHU: u32 = 0x25;
    pub const LWR: u32 = 0x26;
    pub const SB: u32 = 0x28;
    pub const SH: u32 = 0x29;
    pub const SWL: u32 = 0x2A;
    pub const SW: u32 = 0x2B;
    pub const SWR: u32 = 0x2E;
    pub const LL: u32 = 0x30;
    pub const LWC1: u32 = 0x31;
    pub const LDC1: u32 = 0x35;
    pub const SC: u32 = 0x38;
    pub const SWC1: u32 = 0x39;
    pub const SDC1: u32 = 0x3D;
}

mod funct {
    pub const SLL: u32 = 0x00;
    pub const SRL: u32 = 0x02;
    pub const SRA: u32 = 0x03;
    pub const SLLV: u32 = 0x04;
    pub const SRLV: u32 = 0x06;
    pub const SRAV: u32 = 0x07;
    pub const JR: u32 = 0x08;
    pub const JALR: u32 = 0x09;
    pub const MOVZ: u32 = 0x0A;
    pub const MOVN: u32 = 0x0B;
    pub const MONITOR: u32 = 0x05;
    pub const SYSCALL: u32 = 0x0C;
    pub const BREAK: u32 = 0x0D;
    pub const SYNC: u32 = 0x0F;
    pub const MFHI: u32 = 0x10;
    pub const MTHI: u32 = 0x11;
    pub const MFLO: u32 = 0x12;
    pub const MTLO: u32 = 0x13;
    pub const MULT: u32 = 0x18;
    pub const MULTU: u32 = 0x19;
    pub const DIV: u32 = 0x1A;
    pub const DIVU: u32 = 0x1B;
    pub const ADD: u32 = 0x20;
    pub const ADDU: u32 = 0x21;
    pub const SUB: u32 = 0x22;
    pub const SUBU: u32 = 0x23;
    pub const AND: u32 = 0x24;
    pub const OR: u32 = 0x25;
    pub const XOR: u32 = 0x26;
    pub const NOR: u32 = 0x27;
    pub const SLT: u32 = 0x2A;
    pub const SLTU: u32 = 0x2B;
    pub const TGE: u32 = 0x30;
    pub const TEQ: u32 = 0x34;
}

mod special2 {
    pub const MADD: u32 = 0x00;
    pub const MADDU: u32 = 0x01;
    pub const MUL: u32 = 0x02;
    pub const MSUB: u32 = 0x04;
    pub const MSUBU: u32 = 0x05;
    pub const CLZ: u32 = 0x20;
}

mod special3 {
    pub const EXT: u32 = 0x00;
    pub const INS: u32 = 0x04;
    pub const BSHFL: u32 = 0x20;
}

mod cop1_funct {
    pub const ADD: u32 = 0x00;
    pub const SUB: u32 = 0x01;
    pub const MUL: u32 = 0x02;
    pub const DIV: u32 = 0x03;
    pub const SQRT: u32 = 0x04;
    pub const ABS: u32 = 0x05;
    pub const MOV: u32 = 0x06;
    pub const NEG: u32 = 0x07;
    pub const TRUNC_W: u32 = 0x0D;
    pub const CVT_S: u32 = 0x20;
    pub const CVT_D: u32 = 0x21;
    pub const CVT_W: u32 = 0x24;
    pub const MOVCF: u32 = 0x11;
    pub const MOVZ: u32 = 0x12;
    pub const MOVN: u32 = 0x13;
    pub const C_COND_BASE: u32 = 0x30;
}

/// The decoded instruction.
///
/// Every variant owns exactly the operand fields its semantics rule needs;
/// bits the category doesn't use (e.g. `rd` on a branch) are simply not
/// stored. This is the contract both the interpreter and the region
/// translator dispatch against -- adding a variant here, or changing the
/// fields it carries, changes both consumers at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumDiscriminants)]
#[strum_discriminants(name(Mnemonic))]
#[strum_discriminants(derive(strum::Display, Hash))]
pub enum Instruction {
    // --- R-type: shifts ---
    Sll { rd: Reg, rt: Reg, sa: u8 },
    Srl { rd: Reg, rt: Reg, sa: u8 },
    Sra { rd: Reg, rt: Reg, sa: u8 },
    Sllv { rd: Reg, rt: Reg, rs: Reg },
    Srlv { rd: Reg, rt: Reg, rs: Reg },
    Srav { rd: Reg, rt: Reg, rs: Reg },

    // --- R-type: jumps via register ---
    Jr { rs: Reg },
    Jalr { rd: Reg, rs: Reg },

    // --- R-type: conditional move ---
    Movz { rd: Reg, rs: Reg, rt: Reg },
    Movn { rd: Reg, rs: Reg, rt: Reg },

    // --- R-type: traps / barriers / monitor ---
    Monitor { code: u32 },
    Syscall { code: u32 },
    Break { code: u32 },
    Sync,
    Teq { rs: Reg, rt: Reg },
    Tge { rs: Reg, rt: Reg },

    // --- R-type: HI/LO moves ---
    Mfhi { rd: Reg },
    Mthi { rs: Reg },
    Mflo { rd: Reg },
    Mtlo { rs: Reg },

    // --- R-type: mult/div family ---
    Mult { rs: Reg, rt: Reg },
    Multu { rs: Reg, rt: Reg },
    Div { rs: Reg, rt: Reg },
    Divu { rs: Reg, rt: Reg },

    // --- R-type: arithmetic / logical ---
    Add { rd: Reg, rs: Reg, rt: Reg },
    Addu { rd: Reg, rs: Reg, rt: Reg },
    Sub { rd: Reg, rs: Reg, rt: Reg },
    Subu { rd: Reg, rs: Reg, rt: Reg },
    And { rd: Reg, rs: Reg, rt: Reg },
    Or { rd: Reg, rs: Reg, rt: Reg },
    Xor { rd: Reg, rs: Reg, rt: Reg },
    Nor { rd: Reg, rs: Reg, rt: Reg },
    Slt { rd: Reg, rs: Reg, rt: Reg },
    Sltu { rd: Reg, rs: Reg, rt: Reg },

    // --- I-type: arithmetic/logical immediate ---
    Addi { rt: Reg, rs: Reg, imm: i32 },
    Addiu { rt: Reg, rs: Reg, imm: i32 },
    Andi { rt: Reg, rs: Reg, imm: u32 },
    Ori { rt: Reg, rs: Reg, imm: u32 },
    Xori { rt: Reg, rs: Reg, imm: u32 },
    Lui { rt: Reg, imm: u32 },
    Slti { rt: Reg, rs: Reg, imm: i32 },
    Sltiu { rt: Reg, rs: Reg, imm: i32 },

    // --- I-type: loads/stores, aligned ---
    Lb { rt: Reg, base: Reg, offset: i32 },
    Lbu { rt: Reg, base: Reg, offset: i32 },
    Lh { rt: Reg, base: Reg, offset: i32 },
    Lhu { rt: Reg, base: Reg, offset: i32 },
    Lw { rt: Reg, base: Reg, offset: i32 },
    Sb { rt: Reg, base: Reg, offset: i32 },
    Sh { rt: Reg, base: Reg, offset: i32 },
    Sw { rt: Reg, base: Reg, offset: i32 },

    // --- I-type: loads/stores, unaligned partial ---
    Lwl { rt: Reg, base: Reg, offset: i32 },
    Lwr { rt: Reg, base: Reg, offset: i32 },
    Swl { rt: Reg, base: Reg, offset: i32 },
    Swr { rt: Reg, base: Reg, offset: i32 },

    // --- I-type: branches ---
    Beq { rs: Reg, rt: Reg, offset: i32 },
    Bne { rs: Reg, rt: Reg, offset: i32 },
    Blez { rs: Reg, offset: i32 },
    Bgtz { rs: Reg, offset: i32 },
    Bltz { rs: Reg, offset: i32 },
    Bgez { rs: Reg, offset: i32 },
    Bltzal { rs: Reg, offset: i32 },
    Bgezal { rs: Reg, offset: i32 },

    // --- I-type: branch-likely ---
    Beql { rs: Reg, rt: Reg, offset: i32 },
    Bnel { rs: Reg, rt: Reg, offset: i32 },
    Blezl { rs: Reg, offset: i32 },
    Bgtzl { rs: Reg, offset: i32 },
    Bltzl { rs: Reg, offset: i32 },
    Bgezl { rs: Reg, offset: i32 },

    // --- J-type ---
    J { target: u32 },
    Jal { target: u32 },

    // --- Coprocessor-0 ---
    Mfc0 { rt: Reg, rd: Reg },
    Mtc0 { rt: Reg, rd: Reg },

    // --- Coprocessor-1: branches on condition code ---
    Bc1f { cc: u8, offset: i32 },
    Bc1t { cc: u8, offset: i32 },
    Bc1fl { cc: u8, offset: i32 },
    Bc1tl { cc: u8, offset: i32 },

    // --- Coprocessor-1: GPR <-> FPR moves ---
    Mfc1 { rt: Reg, fs: Reg },
    Mtc1 { rt: Reg, fs: Reg },

    // --- Coprocessor-1: arithmetic ---
    Fadd { fmt: FpFmt, fd: Reg, fs: Reg, ft: Reg },
    Fsub { fmt: FpFmt, fd: Reg, fs: Reg, ft: Reg },
    Fmul { fmt: FpFmt, fd: Reg, fs: Reg, ft: Reg },
    Fdiv { fmt: FpFmt, fd: Reg, fs: Reg, ft: Reg },
    Fsqrt { fmt: FpFmt, fd: Reg, fs: Reg },
    Fabs { fmt: FpFmt, fd: Reg, fs: Reg },
    Fneg { fmt: FpFmt, fd: Reg, fs: Reg },
    Fmov { fmt: FpFmt, fd: Reg, fs: Reg },

    // --- Coprocessor-1: compares and conditional moves ---
    CCond { fmt: FpFmt, cc: u8, fs: Reg, ft: Reg, cond: u8 },
    FmovCc { fmt: FpFmt, fd: Reg, fs: Reg, cc: u8, tf: bool },
    FmovzFp { fmt: FpFmt, fd: Reg, fs: Reg, rt: Reg },
    FmovnFp { fmt: FpFmt, fd: Reg, fs: Reg, rt: Reg },

    // --- Coprocessor-1: converts ---
    CvtSW { fd: Reg, fs: Reg },
    CvtSD { fd: Reg, fs: Reg },
    CvtDW { fd: Reg, fs: Reg },
    CvtDS { fd: Reg, fs: Reg },
    CvtWS { fd: Reg, fs: Reg },
    CvtWD { fd: Reg, fs: Reg },
    TruncW { fmt: FpFmt, fd: Reg, fs: Reg },

    // --- Coprocessor-1x ---
    Lwxc1 { fd: Reg, base: Reg, index: Reg },
    Ldxc1 { fd: Reg, base: Reg, index: Reg },
    Fmadd { fmt: FpFmt, fd: Reg, fr: Reg, fs: Reg, ft: Reg },
    Fmsub { fmt: FpFmt, fd: Reg, fr: Reg, fs: Reg, ft: Reg },

    // --- Special-2 ---
    Madd { rs: Reg, rt: Reg },
    Maddu { rs: Reg, rt: Reg },
    Msub { rs: Reg, rt: Reg },
    Msubu { rs: Reg, rt: Reg },
    Mul { rd: Reg, rs: Reg, rt: Reg },
    Clz { rd: Reg, rs: Reg },

    // --- Special-3 ---
    Seb { rd: Reg, rt: Reg },
    Seh { rd: Reg, rt: Reg },
    Ext { rt: Reg, rs: Reg, lsb: u8, size: u8 },
    Ins { rt: Reg, rs: Reg, lsb: u8, msb: u8 },

    // --- Load-linked / store-conditional (degenerate) ---
    Ll { rt: Reg, base: Reg, offset: i32 },
    Sc { rt: Reg, base: Reg, offset: i32 },
}

impl Instruction {
    /// Decode a 32-bit word fetched from `addr`.
    ///
    /// Dispatch follows the table in the decoder design: `opcode == 0` is
    /// R-type by `funct`; `opcode >> 1 == 1` is J-type; 0x10/0x11/0x13 select
    /// the coprocessor families; 0x1C/0x1F select special-2/3; 0x30/0x38
    /// select LL/SC; everything else is looked up in the I-type table.
    pub fn decode(word: u32, addr: u32) -> Result<Self, DecodeError> {
        let f = Fields::decompose(word);
        let err = || DecodeError::new(addr, word);

        let decoded = match f.opcode {
            opcode::SPECIAL => decode_special(&f, word).ok_or_else(err)?,
            opcode::REGIMM => decode_regimm(&f).ok_or_else(err)?,
            opcode::J => Instruction::J { target: f.target },
            opcode::JAL => Instruction::Jal { target: f.target },
            opcode::COP0 => decode_cop0(&f).ok_or_else(err)?,
            opcode::COP1 => decode_cop1(&f).ok_or_else(err)?,
            opcode::COP1X => decode_cop1x(&f, word).ok_or_else(err)?,
            opcode::SPECIAL2 => decode_special2(&f).ok_or_else(err)?,
            opcode::SPECIAL3 => decode_special3(&f).ok_or_else(err)?,
            opcode::LL => Instruction::Ll {
                rt: f.rt,
                base: f.rs,
                offset: sign_extend_16(f.imm),
            },
            opcode::SC => Instruction::Sc {
                rt: f.rt,
                base: f.rs,
                offset: sign_extend_16(f.imm),
            },
            _ => decode_itype(&f).ok_or_else(err)?,
        };

        Ok(decoded)
    }
}

fn decode_special(f: &Fields, word: u32) -> Option<Instruction> {
    use Instruction::*;
    Some(match f.funct {
        funct::SLL => Sll { rd: f.rd, rt: f.rt, sa: f.sa },
        funct::SRL => Srl { rd: f.rd, rt: f.rt, sa: f.sa },
        funct::SRA => Sra { rd: f.rd, rt: f.rt, sa: f.sa },
        funct::SLLV => Sllv { rd: f.rd, rt: f.rt, rs: f.rs },
        funct::SRLV => Srlv { rd: f.rd, rt: f.rt, rs: f.rs },
        funct::SRAV => Srav { rd: f.rd, rt: f.rt, rs: f.rs },
        funct::JR => Jr { rs: f.rs },
        funct::JALR => Jalr { rd: f.rd, rs: f.rs },
        funct::MOVZ => Movz { rd: f.rd, rs: f.rs, rt: f.rt },
        funct::MOVN => Movn { rd: f.rd, rs: f.rs, rt: f.rt },
        funct::MONITOR => Monitor { code: monitor_code(word) },
        funct::SYSCALL => Syscall { code: f.target >> 6 },
        funct::BREAK => Break { code: f.target >> 6 },
        funct::SYNC => Sync,
        funct::MFHI => Mfhi { rd: f.rd },
        funct::MTHI => Mthi { rs: f.rs },
        funct::MFLO => Mflo { rd: f.rd },
        funct::MTLO => Mtlo { rs: f.rs },
        funct::MULT => Mult { rs: f.rs, rt: f.rt },
        funct::MULTU => Multu { rs: f.rs, rt: f.rt },
        funct::DIV => Div { rs: f.rs, rt: f.rt },
        funct::DIVU => Divu { rs: f.rs, rt: f.rt },
        funct::ADD => Add { rd: f.rd, rs: f.rs, rt: f.rt },
        funct::ADDU => Addu { rd: f.rd, rs: f.rs, rt: f.rt },
        funct::SUB => Sub { rd: f.rd, rs: f.rs, rt: f.rt },
        funct::SUBU => Subu { rd: f.rd, rs: f.rs, rt: f.rt },
        funct::AND => And { rd: f.rd, rs: f.rs, rt: f.rt },
        funct::OR => Or { rd: f.rd, rs: f.rs, rt: f.rt },
        funct::XOR => Xor { rd: f.rd, rs: f.rs, rt: f.rt },
        funct::NOR => Nor { rd: f.rd, rs: f.rs, rt: f.rt },
        funct::SLT => Slt { rd: f.rd, rs: f.rs, rt: f.rt },
        funct::SLTU => Sltu { rd: f.rd, rs: f.rs, rt: f.rt },
        funct::TGE => Tge { rs: f.rs, rt: f.rt },
        funct::TEQ => Teq { rs: f.rs, rt: f.rt },
        _ => return None,
    })
}

/// The reserved trap word encodes the monitor reason right-shifted by one
/// within the `code` field (bits normally occupied by `syscall`/`break`'s
/// 20-bit code, per the monitor ABI in the external ELF/monitor contract).
fn monitor_code(word: u32) -> u32 {
    (word >> 6) & 0xF_FFFF
}

fn decode_regimm(f: &Fields) -> Option<Instruction> {
    use Instruction::*;
    let offset = sign_extend_16(f.imm);
    Some(match f.rt {
        0x00 => Bltz { rs: f.rs, offset },
        0x01 => Bgez { rs: f.rs, offset },
        0x02 => Bltzl { rs: f.rs, offset },
        0x03 => Bgezl { rs: f.rs, offset },
        0x10 => Bltzal { rs: f.rs, offset },
        0x11 => Bgezal { rs: f.rs, offset },
        _ => return None,
    })
}

fn decode_itype(f: &Fields) -> Option<Instruction> {
    use Instruction::*;
    let simm = sign_extend_16(f.imm);
    let uimm = f.imm as u32;
    Some(match f.opcode {
        opcode::BEQ => Beq { rs: f.rs, rt: f.rt, offset: simm },
        opcode::BNE => Bne { rs: f.rs, rt: f.rt, offset: simm },
        opcode::BLEZ => Blez { rs: f.rs, offset: simm },
        opcode::BGTZ => Bgtz { rs: f.rs, offset: simm },
        opcode::ADDI => Addi { rt: f.rt, rs: f.rs, imm: simm },
        opcode::ADDIU => Addiu { rt: f.rt, rs: f.rs, imm: simm },
        opcode::SLTI => Slti { rt: f.rt, rs: f.rs, imm: simm },
        opcode::SLTIU => Sltiu { rt: f.rt, rs: f.rs, imm: simm },
        opcode::ANDI => Andi { rt: f.rt, rs: f.rs, imm: uimm },
        opcode::ORI => Ori { rt: f.rt, rs: f.rs, imm: uimm },
        opcode::XORI => Xori { rt: f.rt, rs: f.rs, imm: uimm },
        opcode::LUI => Lui { rt: f.rt, imm: uimm },
        opcode::BEQL => Beql { rs: f.rs, rt: f.rt, offset: simm },
        opcode::BNEL => Bnel { rs: f.rs, rt: f.rt, offset: simm },
        opcode::BLEZL => Blezl { rs: f.rs, offset: simm },
        opcode::BGTZL => Bgtzl { rs: f.rs, offset: simm },
        opcode::LB => Lb { rt: f.rt, base: f.rs, offset: simm },
        opcode::LH => Lh { rt: f.rt, base: f.rs, offset: simm },
        opcode::LWL => Lwl { rt: f.rt, base: f.rs, offset: simm },
        opcode::LW => Lw { rt: f.rt, base: f.rs, offset: simm },
        opcode::LBU => Lbu { rt: f.rt, base: f.rs, offset: simm },
        opcode::LHU => Lhu { rt: f.rt, base: f.rs, offset: simm },
        opcode::LWR => Lwr { rt: f.rt, base: f.rs, offset: simm },
        opcode::SB => Sb { rt: f.rt, base: f.rs, offset: simm },
        opcode::SH => Sh { rt: f.rt, base: f.rs, offset: simm },
        opcode::SWL => Swl { rt: f.rt, base: f.rs, offset: simm },
        opcode::SW => Sw { rt: f.rt, base: f.rs, offset: simm },
        opcode::SWR => Swr { rt: f.rt, base: f.rs, offset: simm },
        _ => return None,
    })
}

fn decode_cop0(f: &Fields) -> Option<Instruction> {
    use Instruction::*;
    Some(match f.rs {
        0x00 => Mfc0 { rt: f.rt, rd: f.rd },
        0x04 => Mtc0 { rt: f.rt, rd: f.rd },
        _ => return None,
    })
}

fn decode_cop1(f: &Fields) -> Option<Instruction> {
    use Instruction::*;
    // `rs` in a cp1 instruction selects the sub-format: BC1 (0x08), or an
    // fmt code (S/D/W) whose arithmetic op lives in `funct`.
    if f.rs == 0x08 {
        let offset = sign_extend_16(f.imm);
        let tf = (f.rt >> 0) & 1 != 0;
        let likely = (f.rt >> 1) & 1 != 0;
        let cc = (f.rt >> 2) & 0x7;
        return Some(match (tf, likely) {
            (false, false) => Bc1f { cc, offset },
            (true, false) => Bc1t { cc, offset },
            (false, true) => Bc1fl { cc, offset },
            (true, true) => Bc1tl { cc, offset },
        });
    }
    if f.rs == 0x00 {
        return Some(Mfc1 { rt: f.rt, fs: f.fs });
    }
    if f.rs == 0x04 {
        return Some(Mtc1 { rt: f.rt, fs: f.fs });
    }

    let fmt = FpFmt::from_field(f.fmt)?;
    match f.funct {
        cop1_funct::ADD => Some(Fadd { fmt, fd: f.fd, fs: f.fs, ft: f.ft }),
        cop1_funct::SUB => Some(Fsub { fmt, fd: f.fd, fs: f.fs, ft: f.ft }),
        cop1_funct::MUL => Some(Fmul { fmt, fd: f.fd, fs: f.fs, ft: f.ft }),
        cop1_funct::DIV => Some(Fdiv { fmt, fd: f.fd, fs: f.fs, ft: f.ft }),
        cop1_funct::SQRT => Some(Fsqrt { fmt, fd: f.fd, fs: f.fs }),
        cop1_funct::ABS => Some(Fabs { fmt, fd: f.fd, fs: f.fs }),
        cop1_funct::MOV => Some(Fmov { fmt, fd: f.fd, fs: f.fs }),
        cop1_funct::NEG => Some(Fneg { fmt, fd: f.fd, fs: f.fs }),
        cop1_funct::TRUNC_W => Some(TruncW { fmt, fd: f.fd, fs: f.fs }),
        cop1_funct::MOVZ => Some(FmovzFp { fmt, fd: f.fd, fs: f.fs, rt: f.rt }),
        cop1_funct::MOVN => Some(FmovnFp { fmt, fd: f.fd, fs: f.fs, rt: f.rt }),
        cop1_funct::MOVCF => Some(FmovCc {
            fmt,
            fd: f.fd,
            fs: f.fs,
            cc: (f.rt >> 2) & 0x7,
            tf: f.rt & 1 != 0,
        }),
        cop1_funct::CVT_S => match fmt {
            FpFmt::Double => Some(CvtSD { fd: f.fd, fs: f.fs }),
            FpFmt::Word => Some(CvtSW { fd: f.fd, fs: f.fs }),
            FpFmt::Single => None,
        },
        cop1_funct::CVT_D => match fmt {
            FpFmt::Single => Some(CvtDS { fd: f.fd, fs: f.fs }),
            FpFmt::Word => Some(CvtDW { fd: f.fd, fs: f.fs }),
            FpFmt::Double => None,
        },
        cop1_funct::CVT_W => match fmt {
            FpFmt::Single => Some(CvtWS { fd: f.fd, fs: f.fs }),
            FpFmt::Double => Some(CvtWD { fd: f.fd, fs: f.fs }),
            FpFmt::Word => None,
        },
        funct if funct >> 4 == 0x3 => Some(CCond {
            fmt,
            cc: (f.fd >> 2) & 0x7,
            fs: f.fs,
            ft: f.ft,
            cond: (funct & 0xF) as u8,
        }),
        _ => None,
    }
}

fn decode_cop1x(f: &Fields, word: u32) -> Option<Instruction> {
    use Instruction::*;
    let funct = word & 0x3F;
    match funct {
        0x00 => Some(Lwxc1 { fd: f.fd, base: f.rs, index: f.rt }),
        0x01 => Some(Ldxc1 { fd: f.fd, base: f.rs, index: f.rt }),
        0x20 | 0x21 => {
            let fmt = if funct == 0x20 { FpFmt::Single } else { FpFmt::Double };
            Some(Fmadd { fmt, fd: f.fd, fr: (word >> 21 & 0x1F) as u8, fs: f.fs, ft: f.ft })
        }
        0x28 | 0x29 => {
            let fmt = if funct == 0x28 { FpFmt::Single } else { FpFmt::Double };
            Some(Fmsub { fmt, fd: f.fd, fr: (word >> 21 & 0x1F) as u8, fs: f.fs, ft: f.ft })
        }
        _ => None,
    }
}

fn decode_special2(f: &Fields) -> Option<Instruction> {
    use Instruction::*;
    Some(match f.funct {
        special2::MADD => Madd { rs: f.rs, rt: f.rt },
        special2::MADDU => Maddu { rs: f.rs, rt: f.rt },
        special2::MSUB => Msub { rs: f.rs, rt: f.rt },
        special2::MSUBU => Msubu { rs: f.rs, rt: f.rt },
        special2::MUL => Mul { rd: f.rd, rs: f.rs, rt: f.rt },
        special2::CLZ => Clz { rd: f.rd, rs: f.rs },
        _ => return None,
    })
}

fn decode_special3(f: &Fields) -> Option<Instruction> {
    use Instruction::*;
    match f.funct {
        special3::EXT => Some(Ext { rt: f.rt, rs: f.rs, lsb: f.sa, size: f.rd }),
        special3::INS => Some(Ins { rt: f.rt, rs: f.rs, lsb: f.sa, msb: f.rd }),
        special3::BSHFL => match f.sa {
            0x10 => Some(Seb { rd: f.rd, rt: f.rt }),
            0x18 => Some(Seh { rd: f.rd, rt: f.rt }),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(opcode: u32, rs: u32, rt: u32, rd: u32, sa: u32, funct: u32) -> u32 {
        (opcode << 26) | (rs << 21) | (rt << 16) | (rd << 11) | (sa << 6) | funct
    }

    fn i(opcode: u32, rs: u32, rt: u32, imm: u32) -> u32 {
        (opcode << 26) | (rs << 21) | (rt << 16) | (imm & 0xFFFF)
    }

    #[test]
    fn decodes_addu() {
        let word = r(0, 9, 10, 8, 0, funct::ADDU);
        assert_eq!(
            Instruction::decode(word, 0).unwrap(),
            Instruction::Addu { rd: 8, rs: 9, rt: 10 }
        );
    }

    #[test]
    fn decodes_lui_and_ori() {
        let lui = Instruction::decode(i(opcode::LUI, 0, 4, 0x1234), 0).unwrap();
        assert_eq!(lui, Instruction::Lui { rt: 4, imm: 0x1234 });

        let ori = Instruction::decode(i(opcode::ORI, 4, 4, 0x5678), 4).unwrap();
        assert_eq!(ori, Instruction::Ori { rt: 4, rs: 4, imm: 0x5678 });
    }

    #[test]
    fn decodes_jump_and_link() {
        let word = (opcode::JAL << 26) | 0x20;
        assert_eq!(Instruction::decode(word, 0).unwrap(), Instruction::Jal { target: 0x20 });
    }

    #[test]
    fn decodes_branch_likely() {
        let word = i(opcode::BNEL, 8, 0, 4);
        assert_eq!(
            Instruction::decode(word, 4).unwrap(),
            Instruction::Bnel { rs: 8, rt: 0, offset: 4 }
        );
    }

    #[test]
    fn decodes_monitor_trap() {
        let word = r(0, 0, 0, 0, 0, funct::MONITOR) | (6 << 6);
        assert_eq!(Instruction::decode(word, 0).unwrap(), Instruction::Monitor { code: 6 });
    }

    #[test]
    fn unknown_special_is_a_decode_error() {
        let word = r(0, 0, 0, 0, 0, 0x3F);
        assert!(Instruction::decode(word, 0x100).is_err());
    }

    #[test]
    fn decodes_unaligned_load_store() {
        let lwl = Instruction::decode(i(opcode::LWL, 16, 8, 0), 0x100).unwrap();
        assert_eq!(lwl, Instruction::Lwl { rt: 8, base: 16, offset: 0 });
        let lwr = Instruction::decode(i(opcode::LWR, 16, 8, 3), 0x104).unwrap();
        assert_eq!(lwr, Instruction::Lwr { rt: 8, base: 16, offset: 3 });
    }
}
