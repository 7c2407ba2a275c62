//! The global block map: creation, splitting, lookup, and the
//! bookkeeping operations (`drop_all_bbs`, `repair_broken_edges`,
//! `toposort`) that sit above individual blocks (§4.4).

use std::collections::{BTreeMap, BTreeSet};

use super::block::{BasicBlock, BlockId};

/// Owns every block created during a run and the `entry_addr -> BlockId`
/// index used by `global_find`.
#[derive(Default)]
pub struct Cfg {
    blocks: Vec<BasicBlock>,
    by_entry: BTreeMap<u32, BlockId>,
}

impl Cfg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The unique block whose `entry_addr == addr`, if any.
    pub fn global_find(&self, addr: u32) -> Option<BlockId> {
        self.by_entry.get(&addr).copied()
    }

    /// Walk from `current`'s predecessors/successors for a block entered
    /// at `addr`, without touching the global index. A fast path for the
    /// delay-slot resolver when the target is almost always a neighbour
    /// of the block just left.
    pub fn local_find(&self, current: BlockId, addr: u32) -> Option<BlockId> {
        let cur = self.block(current);
        cur.succs
            .iter()
            .chain(cur.preds.iter())
            .copied()
            .find(|&id| self.block(id).entry_addr == addr)
            .or_else(|| self.global_find(addr))
    }

    /// Find the block (if any) whose contiguous instruction range
    /// contains `addr` as a non-entry address.
    fn find_containing(&self, addr: u32) -> Option<BlockId> {
        self.blocks
            .iter()
            .enumerate()
            .find(|(_, b)| b.entry_addr != addr && b.contains(addr))
            .map(|(i, _)| BlockId(i))
    }

    fn alloc(&mut self, entry_addr: u32) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(BasicBlock::new(entry_addr));
        self.by_entry.insert(entry_addr, id);
        id
    }

    /// Resolve a control-transfer target to a successor block, creating
    /// or splitting one as needed (§4.4 "Creation").
    pub fn resolve_target(&mut self, target: u32) -> BlockId {
        if let Some(id) = self.global_find(target) {
            return id;
        }
        if let Some(to_split) = self.find_containing(target) {
            return self.split(to_split, target);
        }
        self.alloc(target)
    }

    /// Split block `id` at `target`: a new block takes the suffix of
    /// instructions from `target` onward and inherits `id`'s successors;
    /// `id` is truncated and its sole successor becomes the new block.
    fn split(&mut self, id: BlockId, target: u32) -> BlockId {
        let split_at = self.block(id).instructions.iter().position(|&(a, _)| a == target).expect(
            "split target must be a non-entry instruction address within the block being split",
        );

        let suffix: Vec<(u32, u32)> = self.block(id).instructions.split_off(split_at);
        let was_read_only = self.block(id).flags.read_only;
        let inherited_succs = std::mem::take(&mut self.block_mut(id).succs);
        let inherited_term = self.block(id).term_addr;
        self.block_mut(id).term_addr = super::block::TERM_ADDR_UNSET;

        let new_id = self.alloc(target);
        {
            let new_block = self.block_mut(new_id);
            new_block.instructions = suffix;
            new_block.succs = inherited_succs.clone();
            new_block.term_addr = inherited_term;
            new_block.flags.read_only = was_read_only;
        }
        for &succ in &inherited_succs {
            self.block_mut(succ).preds.remove(&id);
            self.block_mut(succ).preds.insert(new_id);
        }

        self.block_mut(id).succs.insert(new_id);
        self.block_mut(new_id).preds.insert(id);

        new_id
    }

    /// Reconcile `id`'s successor set against its terminating control
    /// transfer after a split has migrated successors elsewhere (§4.4
    /// "Repair").
    pub fn repair_broken_edges(&mut self, id: BlockId, resolved_target: BlockId) {
        let stale: Vec<BlockId> =
            self.block(id).succs.iter().copied().filter(|&s| s != resolved_target).collect();
        for s in stale {
            self.block_mut(id).succs.remove(&s);
            self.block_mut(s).preds.remove(&id);
        }
        self.block_mut(id).succs.insert(resolved_target);
        self.block_mut(resolved_target).preds.insert(id);
    }

    /// Tear down the whole block map: used on `sync` and on user request
    /// (§4.5 "Dropping"). Every block's `in_regions` becomes meaningless
    /// once this runs, since the heads it referenced no longer exist.
    pub fn drop_all_bbs(&mut self) {
        self.blocks.clear();
        self.by_entry.clear();
    }

    /// Strip translator artefacts (`is_compiled`, `has_region`, region
    /// membership) while leaving the discovered CFG intact.
    pub fn drop_compiled_code(&mut self) {
        for b in &mut self.blocks {
            b.flags.is_compiled = false;
            b.flags.has_region = false;
            b.in_regions.clear();
        }
    }

    /// DFS-based topological order over `valid_set`, starting from
    /// `head`, ties broken by `entry_addr` (§4.4 "Topological order").
    pub fn toposort(&self, head: BlockId, valid_set: &BTreeSet<BlockId>) -> Vec<BlockId> {
        let mut visited = BTreeSet::new();
        let mut order = Vec::new();
        self.toposort_visit(head, valid_set, &mut visited, &mut order);
        order.reverse();
        order
    }

    fn toposort_visit(
        &self,
        node: BlockId,
        valid_set: &BTreeSet<BlockId>,
        visited: &mut BTreeSet<BlockId>,
        order: &mut Vec<BlockId>,
    ) {
        if !valid_set.contains(&node) || !visited.insert(node) {
            return;
        }
        let mut succs: Vec<BlockId> =
            self.block(node).succs.iter().copied().filter(|s| valid_set.contains(s)).collect();
        succs.sort_by_key(|&s| self.block(s).entry_addr);
        for s in succs {
            self.toposort_visit(s, valid_set, visited, order);
        }
        order.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_target_creates_a_fresh_block() {
        let mut cfg = Cfg::new();
        let id = cfg.resolve_target(0x100);
        assert_eq!(cfg.block(id).entry_addr, 0x100);
        assert_eq!(cfg.global_find(0x100), Some(id));
    }

    #[test]
    fn split_preserves_the_instruction_multiset_in_order() {
        let mut cfg = Cfg::new();
        let head = cfg.resolve_target(0x100);
        cfg.block_mut(head).instructions = vec![(0x100, 1), (0x104, 2), (0x108, 3), (0x10c, 4)];

        let tail = cfg.split(head, 0x108);

        assert_eq!(cfg.block(head).instructions, vec![(0x100, 1), (0x104, 2)]);
        assert_eq!(cfg.block(tail).instructions, vec![(0x108, 3), (0x10c, 4)]);
        assert!(cfg.block(head).succs.contains(&tail));
        assert!(cfg.block(tail).preds.contains(&head));
    }

    #[test]
    fn successor_symmetry_holds_after_split() {
        let mut cfg = Cfg::new();
        let head = cfg.resolve_target(0x100);
        cfg.block_mut(head).instructions = vec![(0x100, 1), (0x104, 2)];
        let tail = cfg.split(head, 0x104);
        for b in 0..cfg.len() {
            let id = BlockId(b);
            for &s in &cfg.block(id).succs {
                assert!(cfg.block(s).preds.contains(&id));
            }
        }
        let _ = tail;
    }

    #[test]
    fn drop_all_bbs_empties_the_map() {
        let mut cfg = Cfg::new();
        cfg.resolve_target(0x100);
        cfg.drop_all_bbs();
        assert!(cfg.is_empty());
        assert_eq!(cfg.global_find(0x100), None);
    }

    #[test]
    fn toposort_orders_predecessors_before_successors() {
        let mut cfg = Cfg::new();
        let a = cfg.resolve_target(0x100);
        let b = cfg.resolve_target(0x104);
        let c = cfg.resolve_target(0x108);
        cfg.block_mut(a).succs.insert(b);
        cfg.block_mut(b).preds.insert(a);
        cfg.block_mut(b).succs.insert(c);
        cfg.block_mut(c).preds.insert(b);

        let set: BTreeSet<BlockId> = [a, b, c].into_iter().collect();
        let order = cfg.toposort(a, &set);
        let pos = |id: BlockId| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }
}
