//! A basic block: a maximal straight-line run of instructions ending in a
//! control transfer, plus the successor/predecessor edges and execution
//! counters the region builder consumes.

use std::collections::{BTreeMap, BTreeSet};

/// An arena index into [`super::graph::Cfg`]'s block storage. Expressing
/// predecessor/successor/region-membership links as indices rather than
/// raw references keeps the graph a plain `Vec`, with no ownership cycles
/// to reason about when a block is split or a region is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

/// Sentinel meaning "not yet set" for `term_addr`.
pub const TERM_ADDR_UNSET: u32 = 0;

#[derive(Debug, Clone, Copy, Default)]
pub struct BlockFlags {
    pub is_compiled: bool,
    pub has_region: bool,
    pub read_only: bool,
    pub branch_likely: bool,
    pub has_jr: bool,
    pub has_jal: bool,
    pub has_jalr: bool,
    pub has_monitor: bool,
    pub has_term_branch_or_jump: bool,
}

pub struct BasicBlock {
    pub entry_addr: u32,
    /// Address of the instruction that ends the block. `TERM_ADDR_UNSET`
    /// until the first control transfer executed from this block sets it;
    /// monotone once-set thereafter (§4.4).
    pub term_addr: u32,
    /// `(addr, word)` pairs in execution/program order.
    pub instructions: Vec<(u32, u32)>,
    pub preds: BTreeSet<BlockId>,
    pub succs: BTreeSet<BlockId>,
    pub edge_counts: BTreeMap<BlockId, u64>,
    pub total_edges: u64,
    pub flags: BlockFlags,
    /// Heads of every region this block is a member of, for invalidation
    /// when the block is dropped or split.
    pub in_regions: BTreeSet<BlockId>,
}

impl BasicBlock {
    pub fn new(entry_addr: u32) -> Self {
        Self {
            entry_addr,
            term_addr: TERM_ADDR_UNSET,
            instructions: Vec::new(),
            preds: BTreeSet::new(),
            succs: BTreeSet::new(),
            edge_counts: BTreeMap::new(),
            total_edges: 0,
            flags: BlockFlags::default(),
            in_regions: BTreeSet::new(),
        }
    }

    /// Set `term_addr` the first time it's observed; later calls are
    /// silently ignored (monotone once-set, §4.4).
    pub fn set_term_addr(&mut self, addr: u32) {
        if self.term_addr == TERM_ADDR_UNSET {
            self.term_addr = addr;
        }
    }

    pub fn record_edge(&mut self, succ: BlockId) {
        *self.edge_counts.entry(succ).or_insert(0) += 1;
        self.total_edges += 1;
    }

    pub fn edge_weight(&self, succ: BlockId) -> f64 {
        if self.total_edges == 0 {
            return 0.0;
        }
        *self.edge_counts.get(&succ).unwrap_or(&0) as f64 / self.total_edges as f64
    }

    /// Does `addr` fall within this block's contiguous instruction range?
    pub fn contains(&self, addr: u32) -> bool {
        self.instructions.iter().any(|&(a, _)| a == addr)
    }

    pub fn last_addr(&self) -> Option<u32> {
        self.instructions.last().map(|&(a, _)| a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_addr_is_monotone_once_set() {
        let mut b = BasicBlock::new(0x100);
        b.set_term_addr(0x110);
        b.set_term_addr(0x120);
        assert_eq!(b.term_addr, 0x110);
    }

    #[test]
    fn edge_weight_is_zero_with_no_recorded_edges() {
        let b = BasicBlock::new(0x100);
        assert_eq!(b.edge_weight(BlockId(1)), 0.0);
    }

    #[test]
    fn edge_totals_match_sum_of_counts() {
        let mut b = BasicBlock::new(0x100);
        b.record_edge(BlockId(1));
        b.record_edge(BlockId(1));
        b.record_edge(BlockId(2));
        let sum: u64 = b.edge_counts.values().sum();
        assert_eq!(sum, b.total_edges);
        assert_eq!(b.total_edges, 3);
    }
}
