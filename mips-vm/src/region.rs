//! Region extraction: given a hot block, DFS outward accepting only
//! admissible edges, subject to the bounds in §4.5.

use std::collections::BTreeSet;

use mips_asm::Instruction;

use crate::cfg::{BlockId, Cfg};

/// A translation unit: a head block plus every block reachable from it
/// through admissible edges.
pub struct Region {
    pub head: BlockId,
    pub blocks: BTreeSet<BlockId>,
}

/// Tuning knobs for region formation, threaded through rather than
/// hard-coded so tests can exercise the bound without building huge CFGs.
#[derive(Debug, Clone, Copy)]
pub struct RegionPolicy {
    /// Maximum number of blocks a region may contain (`enough_regions`).
    pub max_blocks: usize,
    pub allow_indirect_jumps: bool,
}

impl Default for RegionPolicy {
    fn default() -> Self {
        Self { max_blocks: 64, allow_indirect_jumps: false }
    }
}

/// Attempt to form a region rooted at `head`. Returns `None` if the head
/// block itself is inadmissible (an empty region is not a valid
/// translation unit).
pub fn build_region(
    cfg: &Cfg,
    head: BlockId,
    decode: impl Fn(u32) -> Option<Instruction>,
    policy: RegionPolicy,
) -> Option<Region> {
    if !block_is_admissible(cfg, head, &decode, policy) {
        return None;
    }

    let mut blocks = BTreeSet::new();
    blocks.insert(head);
    let mut frontier = vec![head];

    while let Some(current) = frontier.pop() {
        if blocks.len() >= policy.max_blocks {
            break;
        }
        let succs: Vec<BlockId> = cfg.block(current).succs.iter().copied().collect();
        for succ in succs {
            if blocks.contains(&succ) {
                continue;
            }
            if !block_is_admissible(cfg, succ, &decode, policy) {
                continue;
            }
            if blocks.len() >= policy.max_blocks {
                break;
            }
            blocks.insert(succ);
            frontier.push(succ);
        }
    }

    Some(Region { head, blocks })
}

/// Every instruction in the block must be translatable, and the block
/// must not contain a monitor/syscall/break in its interior (rule 1 and
/// 2 of §4.5).
fn block_is_admissible(
    cfg: &Cfg,
    id: BlockId,
    decode: &impl Fn(u32) -> Option<Instruction>,
    policy: RegionPolicy,
) -> bool {
    let block = cfg.block(id);
    block.instructions.iter().all(|&(addr, _)| {
        decode(addr).map_or(false, |instr| instr.can_translate(policy.allow_indirect_jumps))
    })
}

/// True iff every instruction in `region` satisfies `can_translate` --
/// the admissibility invariant tested directly against an already-built
/// region (§8 "Region admissibility").
pub fn region_is_admissible(
    cfg: &Cfg,
    region: &Region,
    decode: impl Fn(u32) -> Option<Instruction>,
    policy: RegionPolicy,
) -> bool {
    region.blocks.iter().all(|&id| block_is_admissible(cfg, id, &decode, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mips_asm::Instruction;

    fn decode_table(words: &[(u32, Instruction)]) -> impl Fn(u32) -> Option<Instruction> + '_ {
        move |addr| words.iter().find(|&&(a, _)| a == addr).map(|&(_, i)| i)
    }

    #[test]
    fn single_admissible_block_forms_a_region() {
        let mut cfg = Cfg::new();
        let head = cfg.resolve_target(0x100);
        cfg.block_mut(head).instructions = vec![(0x100, 0)];
        let table = [(0x100, Instruction::Addu { rd: 1, rs: 2, rt: 3 })];

        let region = build_region(&cfg, head, decode_table(&table), RegionPolicy::default());
        assert!(region.is_some());
        assert!(region.unwrap().blocks.contains(&head));
    }

    #[test]
    fn monitor_in_head_block_rejects_the_region() {
        let mut cfg = Cfg::new();
        let head = cfg.resolve_target(0x100);
        cfg.block_mut(head).instructions = vec![(0x100, 0)];
        let table = [(0x100, Instruction::Monitor { code: 6 })];

        let region = build_region(&cfg, head, decode_table(&table), RegionPolicy::default());
        assert!(region.is_none());
    }

    #[test]
    fn region_stays_within_the_block_count_bound() {
        let mut cfg = Cfg::new();
        let mut ids = Vec::new();
        let mut table = Vec::new();
        for i in 0..10u32 {
            let addr = 0x100 + i * 4;
            let id = cfg.resolve_target(addr);
            cfg.block_mut(id).instructions = vec![(addr, 0)];
            table.push((addr, Instruction::Addu { rd: 1, rs: 1, rt: 1 }));
            ids.push(id);
        }
        for w in ids.windows(2) {
            cfg.block_mut(w[0]).succs.insert(w[1]);
            cfg.block_mut(w[1]).preds.insert(w[0]);
        }

        let policy = RegionPolicy { max_blocks: 3, allow_indirect_jumps: false };
        let region = build_region(&cfg, ids[0], decode_table(&table), policy).unwrap();
        assert!(region.blocks.len() <= 3);
    }
}
