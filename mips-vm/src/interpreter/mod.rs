//! The interpreter step loop: fetch, decode, dispatch, and the
//! delay-slot dance that ties a control transfer to the instruction
//! immediately after it (§4.2, §4.4).
//!
//! [`Interpreter::step`] is the single entry point both the standalone
//! driver and the CFG-building driver call; `build_cfg` toggles whether
//! the block map is grown and edge counts are recorded as it runs. Target
//! endianness isn't a compile-time choice here -- it lives on
//! [`MachineState`] and every memory access already routes through it, so
//! one `step` implementation serves both byte orders.

mod alu;
mod branch;
mod cp0;
mod fp;

use std::collections::BTreeMap;

use mips_asm::{Instruction, INSTRUCTION_LEN};

use crate::cfg::{BlockId, Cfg};
use crate::endian::Endian;
use crate::error::InterpreterError;
use crate::monitor::Monitor;
use crate::region::{self, Region, RegionPolicy};
use crate::state::MachineState;

/// Drives one program forward one step at a time, optionally growing the
/// CFG and tracking edge frequencies as it goes (§4.4, §4.5).
pub struct Interpreter {
    pub cfg: Cfg,
    pub monitor: Monitor,
    pub build_cfg: bool,
    /// Resolves the open question on `sub`'s overflow behaviour (§9):
    /// when set, `sub` traps on signed overflow instead of matching `subu`.
    pub trap_on_signed_overflow: bool,
    pub region_policy: RegionPolicy,
    /// Number of times a block must be (re)entered before a region is
    /// attempted from it.
    pub hot_threshold: u64,
    pub regions: Vec<Region>,
    current_block: Option<BlockId>,
    entry_counts: BTreeMap<BlockId, u64>,
}

impl Interpreter {
    pub fn new(build_cfg: bool, monitor: Monitor) -> Self {
        Self {
            cfg: Cfg::new(),
            monitor,
            build_cfg,
            trap_on_signed_overflow: false,
            region_policy: RegionPolicy::default(),
            hot_threshold: 10,
            regions: Vec::new(),
            current_block: None,
            entry_counts: BTreeMap::new(),
        }
    }

    /// Execute the instruction at `state.pc`, including its delay slot if
    /// it has one, leaving `state.pc` at the next instruction to execute.
    pub fn step(&mut self, state: &mut MachineState) -> Result<(), InterpreterError> {
        let pc = state.pc;
        let word = fetch(state, pc)?;
        let instr = decode(pc, word)?;

        if self.build_cfg {
            self.enter_block(pc);
            self.append(pc, word);
        }
        state.icnt += 1;

        if instr.is_control_transfer() {
            self.execute_control_transfer(&instr, state)?;
        } else {
            self.execute_plain(&instr, state)?;
            state.pc = pc.wrapping_add(INSTRUCTION_LEN);
        }

        if !state.zero_register_holds() {
            return Err(InterpreterError::ZeroRegisterWrite { pc });
        }
        Ok(())
    }

    fn execute_control_transfer(
        &mut self,
        instr: &Instruction,
        state: &mut MachineState,
    ) -> Result<(), InterpreterError> {
        match *instr {
            Instruction::Monitor { code } => self.execute_monitor(state, code),
            Instruction::Syscall { .. } | Instruction::Break { .. } => {
                state.break_flag = true;
                state.pc = state.pc.wrapping_add(INSTRUCTION_LEN);
                Ok(())
            }
            _ => self.execute_branch_or_jump(instr, state),
        }
    }

    /// The monitor trap is a call through the host: it ends the current
    /// block and resumes at `$ra`, same as `jalr $ra` would, after the
    /// host service runs (§4.7).
    fn execute_monitor(&mut self, state: &mut MachineState, code: u32) -> Result<(), InterpreterError> {
        let pc = state.pc;
        if self.build_cfg {
            if let Some(id) = self.current_block {
                self.cfg.block_mut(id).set_term_addr(pc);
                self.cfg.block_mut(id).flags.has_monitor = true;
            }
        }
        self.monitor.dispatch(code, state)?;
        let target = state.gpr(31) as u32;
        if self.build_cfg {
            self.resolve_successor(target);
        }
        state.pc = target;
        Ok(())
    }

    fn execute_branch_or_jump(
        &mut self,
        instr: &Instruction,
        state: &mut MachineState,
    ) -> Result<(), InterpreterError> {
        let pc = state.pc;
        let delay_pc = pc.wrapping_add(INSTRUCTION_LEN);
        let taken = branch::is_taken(instr, state);
        let target = branch::target(instr, delay_pc, state);
        if let Some(link) = branch::link_register(instr) {
            state.set_gpr(link, delay_pc.wrapping_add(INSTRUCTION_LEN));
        }

        if self.build_cfg {
            if let Some(id) = self.current_block {
                let block = self.cfg.block_mut(id);
                block.set_term_addr(pc);
                block.flags.branch_likely = instr.is_branch_likely();
                block.flags.has_term_branch_or_jump = true;
                match instr {
                    Instruction::Jr { .. } => block.flags.has_jr = true,
                    Instruction::Jalr { .. } => block.flags.has_jalr = true,
                    Instruction::Jal { .. } => block.flags.has_jal = true,
                    _ => {}
                }
            }
        }

        // The delay slot word is always fetched, appended, and counted,
        // regardless of whether the branch is taken (§4.2). Only its
        // semantics are conditionally skipped, for branch-likely-not-taken.
        let delay_word = fetch(state, delay_pc)?;
        let delay_instr = decode(delay_pc, delay_word)?;
        if self.build_cfg {
            self.append(delay_pc, delay_word);
        }
        state.icnt += 1;

        let run_delay_slot = taken || !instr.is_branch_likely();
        if run_delay_slot {
            if delay_instr.is_control_transfer() {
                return Err(InterpreterError::ReservedTrap { pc: delay_pc });
            }
            self.execute_plain(&delay_instr, state)?;
        }

        let next_pc = if taken { target } else { delay_pc.wrapping_add(INSTRUCTION_LEN) };
        if self.build_cfg {
            self.resolve_successor(next_pc);
        }
        state.pc = next_pc;
        Ok(())
    }

    fn execute_plain(
        &mut self,
        instr: &Instruction,
        state: &mut MachineState,
    ) -> Result<(), InterpreterError> {
        use Instruction::*;
        match *instr {
            Sync => {
                if self.build_cfg {
                    self.cfg.drop_all_bbs();
                    self.current_block = None;
                    self.entry_counts.clear();
                    self.regions.clear();
                }
                Ok(())
            }
            Mfc0 { .. } | Mtc0 { .. } => {
                cp0::execute(instr, state);
                Ok(())
            }
            Lwxc1 { fd, base, index } => {
                let ea = (state.gpr(base) as u32).wrapping_add(state.gpr(index) as u32);
                let v = state.memory.read_u32(ea, state.endian)?;
                state.set_fpr_single(fd, v);
                Ok(())
            }
            Ldxc1 { fd, base, index } => {
                let ea = (state.gpr(base) as u32).wrapping_add(state.gpr(index) as u32);
                let endian = state.endian;
                let w0 = state.memory.read_u32(ea, endian)?;
                let w1 = state.memory.read_u32(ea + 4, endian)?;
                let v = match endian {
                    Endian::Big => ((w0 as u64) << 32) | w1 as u64,
                    Endian::Little => ((w1 as u64) << 32) | w0 as u64,
                };
                state.set_fpr_double(fd, v);
                Ok(())
            }
            Fadd { .. } | Fsub { .. } | Fmul { .. } | Fdiv { .. } | Fsqrt { .. } | Fabs { .. }
            | Fneg { .. } | Fmov { .. } | FmovCc { .. } | FmovzFp { .. } | FmovnFp { .. }
            | CCond { .. } | Mfc1 { .. } | Mtc1 { .. } | CvtSW { .. } | CvtSD { .. }
            | CvtDW { .. } | CvtDS { .. } | CvtWS { .. } | CvtWD { .. } | TruncW { .. }
            | Fmadd { .. } | Fmsub { .. } => {
                fp::execute(instr, state);
                Ok(())
            }
            _ => alu::execute(instr, state, self.trap_on_signed_overflow),
        }
    }

    fn enter_block(&mut self, addr: u32) {
        let matches_current =
            self.current_block.map(|id| self.cfg.block(id).entry_addr) == Some(addr);
        if !matches_current {
            let id = self.cfg.global_find(addr).unwrap_or_else(|| self.cfg.resolve_target(addr));
            self.current_block = Some(id);
        }
    }

    fn append(&mut self, addr: u32, word: u32) {
        if let Some(id) = self.current_block {
            self.cfg.block_mut(id).instructions.push((addr, word));
        }
    }

    /// Resolve the address execution is about to continue at into a
    /// successor block, recording the edge and (past `hot_threshold`
    /// visits) attempting to grow a region from it (§4.4, §4.5).
    fn resolve_successor(&mut self, target: u32) {
        let Some(current) = self.current_block else { return };
        let resolved = self
            .cfg
            .local_find(current, target)
            .unwrap_or_else(|| self.cfg.resolve_target(target));
        self.cfg.repair_broken_edges(current, resolved);
        self.cfg.block_mut(current).record_edge(resolved);
        self.current_block = Some(resolved);

        let count = self.entry_counts.entry(resolved).or_insert(0);
        *count += 1;
        if *count == self.hot_threshold && !self.cfg.block(resolved).flags.has_region {
            let cfg = &self.cfg;
            let region = region::build_region(
                cfg,
                resolved,
                |addr| decode_at(cfg, addr),
                self.region_policy,
            );
            if let Some(region) = region {
                self.cfg.block_mut(resolved).flags.has_region = true;
                self.regions.push(region);
            }
        }
    }
}

fn fetch(state: &MachineState, addr: u32) -> Result<u32, InterpreterError> {
    state.memory.read_u32(addr, state.endian)
}

fn decode(addr: u32, word: u32) -> Result<Instruction, InterpreterError> {
    Instruction::decode(word, addr).map_err(|source| InterpreterError::Decode { addr, source })
}

/// Look up and decode the instruction at `addr` across every block the
/// CFG has discovered so far. Used by the region builder, which only
/// needs this at the (infrequent) moment a block turns hot.
fn decode_at(cfg: &Cfg, addr: u32) -> Option<Instruction> {
    for i in 0..cfg.len() {
        let block = cfg.block(BlockId(i));
        if let Some(&(_, word)) = block.instructions.iter().find(|&&(a, _)| a == addr) {
            return Instruction::decode(word, addr).ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;

    fn new_state() -> MachineState {
        MachineState::new(Memory::new(0x1000), Endian::Big)
    }

    fn asm(opcode: u32, rs: u32, rt: u32, imm: u32) -> u32 {
        (opcode << 26) | (rs << 21) | (rt << 16) | (imm & 0xFFFF)
    }

    fn r(funct: u32, rs: u32, rt: u32, rd: u32) -> u32 {
        (rs << 21) | (rt << 16) | (rd << 11) | funct
    }

    #[test]
    fn ordinary_branch_always_runs_its_delay_slot() {
        let mut state = new_state();
        state.set_gpr(1, 5);
        state.set_gpr(2, 5);
        // beq $1, $2, 2   ; addiu $3, $0, 7 (delay slot, always runs)
        state.memory.write_u32(0, asm(0x04, 1, 2, 2), Endian::Big).unwrap();
        state.memory.write_u32(4, asm(0x09, 0, 3, 7), Endian::Big).unwrap();
        let mut interp = Interpreter::new(false, Monitor::new(vec![]));
        interp.step(&mut state).unwrap();
        assert_eq!(state.gpr(3), 7);
        assert_eq!(state.pc, 0 + 4 + (2 << 2));
    }

    #[test]
    fn branch_likely_not_taken_squashes_its_delay_slot() {
        let mut state = new_state();
        state.set_gpr(1, 1);
        state.set_gpr(2, 2);
        state.memory.write_u32(0, asm(0x14, 1, 2, 2), Endian::Big).unwrap(); // beql $1, $2, 2
        state.memory.write_u32(4, asm(0x09, 0, 4, 9), Endian::Big).unwrap(); // addiu $4, $0, 9
        let mut interp = Interpreter::new(false, Monitor::new(vec![]));
        interp.step(&mut state).unwrap();
        assert_eq!(state.gpr(4), 0, "squashed delay slot must not execute");
        assert_eq!(state.pc, 8);
    }

    #[test]
    fn jal_links_return_address_and_jumps_to_target() {
        let mut state = new_state();
        let word = (0x03 << 26) | (0x40 >> 2); // jal 0x40
        state.memory.write_u32(0, word, Endian::Big).unwrap();
        state.memory.write_u32(4, r(0x21, 0, 0, 0), Endian::Big).unwrap(); // addu $0,$0,$0 delay slot
        let mut interp = Interpreter::new(true, Monitor::new(vec![]));
        interp.step(&mut state).unwrap();
        assert_eq!(state.gpr(31), 8);
        assert_eq!(state.pc, 0x40);
        assert_eq!(interp.cfg.len(), 2);
    }

    #[test]
    fn sync_drops_every_discovered_block() {
        let mut state = new_state();
        state.memory.write_u32(0, r(0x0F, 0, 0, 0), Endian::Big).unwrap(); // sync
        let mut interp = Interpreter::new(true, Monitor::new(vec![]));
        interp.step(&mut state).unwrap();
        assert!(interp.cfg.is_empty());
        assert_eq!(state.pc, 4);
    }

    #[test]
    fn a_step_that_targets_the_zero_register_leaves_it_untouched() {
        let mut state = new_state();
        state.set_gpr(1, 5);
        state.memory.write_u32(0, r(0x21, 1, 2, 0), Endian::Big).unwrap();
        let mut interp = Interpreter::new(false, Monitor::new(vec![]));
        assert!(interp.step(&mut state).is_ok());
        assert!(state.zero_register_holds());
    }
}
