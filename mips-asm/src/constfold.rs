//! A tiny constant-propagation lattice over GPR values, consumed by the
//! region builder when it decides whether a translated block can skip
//! re-materializing a register.
//!
//! The lattice has three points: a register holds a known 32-bit constant,
//! holds some value that isn't known at translation time (`Variant`), or
//! has never been written (`Uninitialized`). Meeting two states always
//! widens: two different constants, or a constant meeting `Variant`,
//! produce `Variant`; anything meeting `Uninitialized` keeps the other
//! side, since an unreached predecessor contributes nothing.

use crate::instruction::Instruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstState {
    Constant(i32),
    Variant,
    Uninitialized,
}

impl ConstState {
    /// The lattice join of two states flowing into the same program point
    /// from different predecessors.
    pub fn meet(self, other: Self) -> Self {
        use ConstState::*;
        match (self, other) {
            (Uninitialized, x) | (x, Uninitialized) => x,
            (Constant(a), Constant(b)) if a == b => Constant(a),
            _ => Variant,
        }
    }
}

/// Fold `instr` against the incoming register state, returning the state
/// its defined GPR should take on. Instructions with more than one GPR
/// definition, or whose result depends on values the lattice can't see
/// (loads, HI/LO, coprocessor transfers), always produce `Variant` for
/// every location they define -- the point of this lattice is cheap
/// immediate-chain folding (`lui`/`ori`/`addiu` sequences building an
/// address), not general abstract interpretation.
pub fn const_fold(instr: &Instruction, reg_state: impl Fn(u8) -> ConstState) -> ConstState {
    use Instruction::*;
    match *instr {
        Lui { imm, .. } => ConstState::Constant((imm as i32) << 16),

        Addiu { rs, imm, .. } | Addi { rs, imm, .. } => match reg_state(rs) {
            ConstState::Constant(v) => ConstState::Constant(v.wrapping_add(imm)),
            other => other,
        },

        Ori { rs, imm, .. } => match reg_state(rs) {
            ConstState::Constant(v) => ConstState::Constant(v | imm as i32),
            other => other,
        },

        Andi { rs, imm, .. } => match reg_state(rs) {
            ConstState::Constant(v) => ConstState::Constant(v & imm as i32),
            other => other,
        },

        Xori { rs, imm, .. } => match reg_state(rs) {
            ConstState::Constant(v) => ConstState::Constant(v ^ imm as i32),
            other => other,
        },

        Addu { rs, rt, .. } | Add { rs, rt, .. } => {
            match (reg_state(rs), reg_state(rt)) {
                (ConstState::Constant(a), ConstState::Constant(b)) => {
                    ConstState::Constant(a.wrapping_add(b))
                }
                _ => ConstState::Variant,
            }
        }

        Subu { rs, rt, .. } | Sub { rs, rt, .. } => {
            match (reg_state(rs), reg_state(rt)) {
                (ConstState::Constant(a), ConstState::Constant(b)) => {
                    ConstState::Constant(a.wrapping_sub(b))
                }
                _ => ConstState::Variant,
            }
        }

        Sll { rt, sa, .. } => match reg_state(rt) {
            ConstState::Constant(v) => ConstState::Constant(v.wrapping_shl(sa as u32)),
            other => other,
        },

        _ if instr.defines().is_empty() => ConstState::Uninitialized,

        _ => ConstState::Variant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;

    #[test]
    fn meet_of_equal_constants_stays_constant() {
        assert_eq!(
            ConstState::Constant(4).meet(ConstState::Constant(4)),
            ConstState::Constant(4)
        );
    }

    #[test]
    fn meet_of_different_constants_widens_to_variant() {
        assert_eq!(
            ConstState::Constant(4).meet(ConstState::Constant(5)),
            ConstState::Variant
        );
    }

    #[test]
    fn meet_with_uninitialized_keeps_the_other_side() {
        assert_eq!(
            ConstState::Uninitialized.meet(ConstState::Constant(1)),
            ConstState::Constant(1)
        );
    }

    #[test]
    fn lui_ori_pair_folds_to_the_assembled_address() {
        let lui = Instruction::Lui { rt: 8, imm: 0x1000 };
        let hi = const_fold(&lui, |_| ConstState::Uninitialized);
        assert_eq!(hi, ConstState::Constant(0x1000_0000u32 as i32));

        let ori = Instruction::Ori { rt: 8, rs: 8, imm: 0x00cd };
        let full = const_fold(&ori, |_| hi);
        assert_eq!(full, ConstState::Constant(0x1000_00cdu32 as i32));
    }

    #[test]
    fn load_is_always_variant() {
        let lw = Instruction::Lw { rt: 4, base: 29, offset: 0 };
        assert_eq!(const_fold(&lw, |_| ConstState::Constant(0)), ConstState::Variant);
    }
}
