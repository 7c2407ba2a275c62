//! Leaf-function and inlined-call discovery over an already-built CFG
//! (§4.6). Both passes are DFS within an address window and report one
//! of a fixed set of statuses to the downstream translator.

use std::collections::{BTreeMap, BTreeSet};

use mips_asm::Instruction;

use crate::cfg::{BlockId, Cfg};
use crate::elf::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStatus {
    Success,
    NoReturn,
    TooManyReturns,
    RecursiveCall,
    Monitor,
    DirectCall,
    IndirectCall,
    ArbitraryJr,
}

/// Upper bound on the number of `jr ra` return sites a leaf function may
/// have before discovery gives up (`too_many_returns`).
const MAX_RETURN_SITES: usize = 4;

/// DFS from `entry` within `[entry, entry+size)`, classifying the block
/// subgraph per the leaf-function rules in §4.6.
pub fn discover_leaf_function(
    cfg: &Cfg,
    entry: BlockId,
    symbol: &Symbol,
    decode: impl Fn(u32) -> Option<Instruction>,
) -> DiscoveryStatus {
    let entry_addr = cfg.block(entry).entry_addr;
    let window_end = entry_addr.wrapping_add(symbol.size);

    let mut visited = BTreeSet::new();
    let mut stack = vec![entry];
    let mut return_sites = 0usize;
    let mut saw_return = false;

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            if id == entry {
                return DiscoveryStatus::RecursiveCall;
            }
            continue;
        }
        let block = cfg.block(id);
        if block.entry_addr < entry_addr || block.entry_addr >= window_end {
            continue;
        }

        for &(addr, _) in &block.instructions {
            let Some(instr) = decode(addr) else { continue };
            match instr {
                Instruction::Monitor { .. } => return DiscoveryStatus::Monitor,
                Instruction::Jal { .. } => return DiscoveryStatus::DirectCall,
                Instruction::Jalr { .. } => return DiscoveryStatus::IndirectCall,
                Instruction::Jr { rs: 31 } => {
                    saw_return = true;
                    return_sites += 1;
                    if return_sites > MAX_RETURN_SITES {
                        return DiscoveryStatus::TooManyReturns;
                    }
                }
                Instruction::Jr { .. } => return DiscoveryStatus::ArbitraryJr,
                _ => {}
            }
        }

        for &succ in &block.succs {
            stack.push(succ);
        }
    }

    if saw_return {
        DiscoveryStatus::Success
    } else {
        DiscoveryStatus::NoReturn
    }
}

/// Given a set of already-known leaf functions, DFS from `entry`
/// substituting each callee's block subgraph in place of a `jal target`
/// where `target` is a leaf function's entry. Errors downgrade the
/// overall status but do not abort the walk.
pub fn discover_inlined_calls(
    cfg: &Cfg,
    entry: BlockId,
    leaf_funcs: &BTreeMap<u32, Symbol>,
    decode: impl Fn(u32) -> Option<Instruction>,
) -> DiscoveryStatus {
    let mut visited = BTreeSet::new();
    let mut stack = vec![entry];
    let mut errors = 0usize;

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let block = cfg.block(id);
        for &(addr, _) in &block.instructions {
            match decode(addr) {
                Some(Instruction::Jal { target }) if leaf_funcs.contains_key(&target) => {
                    if let Some(callee) = cfg.global_find(target) {
                        stack.push(callee);
                    }
                }
                Some(Instruction::Jal { .. }) => errors += 1,
                Some(Instruction::Monitor { .. }) => errors += 1,
                _ => {}
            }
        }
        for &succ in &block.succs {
            stack.push(succ);
        }
    }

    if errors == 0 {
        DiscoveryStatus::Success
    } else {
        DiscoveryStatus::DirectCall
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_block_returning_via_ra_is_a_successful_leaf() {
        let mut cfg = Cfg::new();
        let entry = cfg.resolve_target(0x100);
        cfg.block_mut(entry).instructions = vec![(0x100, 0), (0x104, 0)];
        let sym = Symbol { name: "f".into(), size: 8 };
        let decode = |addr: u32| {
            if addr == 0x100 {
                Some(Instruction::Addu { rd: 2, rs: 0, rt: 0 })
            } else {
                Some(Instruction::Jr { rs: 31 })
            }
        };
        assert_eq!(discover_leaf_function(&cfg, entry, &sym, decode), DiscoveryStatus::Success);
    }

    #[test]
    fn a_call_instruction_is_reported_as_direct_call() {
        let mut cfg = Cfg::new();
        let entry = cfg.resolve_target(0x100);
        cfg.block_mut(entry).instructions = vec![(0x100, 0)];
        let sym = Symbol { name: "f".into(), size: 4 };
        let decode = |_: u32| Some(Instruction::Jal { target: 0x200 });
        assert_eq!(discover_leaf_function(&cfg, entry, &sym, decode), DiscoveryStatus::DirectCall);
    }

    #[test]
    fn no_return_when_no_block_reaches_jr_ra() {
        let mut cfg = Cfg::new();
        let entry = cfg.resolve_target(0x100);
        cfg.block_mut(entry).instructions = vec![(0x100, 0)];
        let sym = Symbol { name: "f".into(), size: 4 };
        let decode = |_: u32| Some(Instruction::Addu { rd: 1, rs: 0, rt: 0 });
        assert_eq!(discover_leaf_function(&cfg, entry, &sym, decode), DiscoveryStatus::NoReturn);
    }
}
