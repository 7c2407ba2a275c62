//! Coprocessor-0 (system control) register transfers.

use mips_asm::Instruction;

use crate::state::MachineState;

pub fn execute(instr: &Instruction, state: &mut MachineState) {
    match *instr {
        Instruction::Mfc0 { rt, rd } => state.set_gpr(rt, state.cp0(rd) as i32),
        Instruction::Mtc0 { rt, rd } => state.set_cp0(rd, state.gpr(rt) as u32),
        _ => unreachable!("cp0::execute called with a non-cp0 instruction"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endian::Endian;
    use crate::memory::Memory;

    #[test]
    fn mtc0_then_mfc0_round_trips() {
        let mut s = MachineState::new(Memory::new(0x10), Endian::Big);
        s.set_gpr(8, 0x55);
        execute(&Instruction::Mtc0 { rt: 8, rd: 9 }, &mut s);
        execute(&Instruction::Mfc0 { rt: 10, rd: 9 }, &mut s);
        assert_eq!(s.gpr(10), 0x55);
    }
}
