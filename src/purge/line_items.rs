use std::collections::{BTreeMap, HashMap};

use crate::models::LineItem;

/// Cart line items of one batch, keyed by id, with their parent links.
///
/// Bundle constituents reference their bundle through `parent_item_id` in the
/// same table, so a parent row can only be deleted once every row pointing
/// at it is gone.
#[derive(Debug, Default)]
pub struct LineItemArena {
    parents: BTreeMap<i64, Option<i64>>,
}

impl LineItemArena {
    pub fn new(items: impl IntoIterator<Item = LineItem>) -> Self {
        Self {
            parents: items
                .into_iter()
                .map(|item| (item.id, item.parent_item_id))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Item ids grouped into deletion passes, deepest constituents first.
    ///
    /// With single-level bundles this is two passes: rows whose parent is in
    /// the arena, then parents and standalone rows. A parent outside the arena
    /// does not count as a link. Ids within a pass are ascending.
    pub fn deletion_passes(&self) -> Vec<Vec<i64>> {
        let mut depths: HashMap<i64, usize> = HashMap::with_capacity(self.parents.len());
        for &id in self.parents.keys() {
            self.depth(id, &mut depths);
        }

        let max_depth = depths.values().copied().max().unwrap_or(0);
        let mut passes = vec![Vec::new(); if self.is_empty() { 0 } else { max_depth + 1 }];
        for &id in self.parents.keys() {
            let depth = depths.get(&id).copied().unwrap_or(0);
            passes[max_depth - depth].push(id);
        }
        passes
    }

    /// Number of in-arena ancestors of `id`. A parent cycle is cut at the
    /// first repeated id.
    fn depth(&self, id: i64, memo: &mut HashMap<i64, usize>) -> usize {
        if let Some(&depth) = memo.get(&id) {
            return depth;
        }

        let mut chain = vec![id];
        let mut current = id;
        let mut base = 0;
        while let Some(Some(parent)) = self.parents.get(&current) {
            if !self.parents.contains_key(parent) {
                break;
            }
            if let Some(&known) = memo.get(parent) {
                base = known + 1;
                break;
            }
            if chain.contains(parent) {
                break;
            }
            chain.push(*parent);
            current = *parent;
        }

        // chain[last] is the topmost ancestor walked; assign depths downward.
        for (offset, item) in chain.iter().rev().enumerate() {
            memo.insert(*item, base + offset);
        }
        memo.get(&id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, parent: Option<i64>) -> LineItem {
        LineItem {
            id,
            parent_item_id: parent,
        }
    }

    #[test]
    fn test_empty_arena_has_no_passes() {
        assert!(LineItemArena::new([]).deletion_passes().is_empty());
    }

    #[test]
    fn test_standalone_items_single_pass() {
        let arena = LineItemArena::new([item(3, None), item(1, None)]);
        assert_eq!(arena.deletion_passes(), vec![vec![1, 3]]);
    }

    #[test]
    fn test_bundle_children_before_parents() {
        let arena = LineItemArena::new([
            item(10, None),
            item(11, Some(10)),
            item(12, Some(10)),
            item(20, None),
        ]);
        assert_eq!(arena.deletion_passes(), vec![vec![11, 12], vec![10, 20]]);
    }

    #[test]
    fn test_nested_bundles_deepest_first() {
        let arena = LineItemArena::new([
            item(1, None),
            item(2, Some(1)),
            item(3, Some(2)),
            item(4, None),
        ]);
        assert_eq!(arena.deletion_passes(), vec![vec![3], vec![2], vec![1, 4]]);
    }

    #[test]
    fn test_parent_outside_arena_is_ignored() {
        let arena = LineItemArena::new([item(5, Some(99)), item(6, None)]);
        assert_eq!(arena.deletion_passes(), vec![vec![5, 6]]);
    }

    #[test]
    fn test_cycle_terminates() {
        let arena = LineItemArena::new([item(1, Some(2)), item(2, Some(1))]);
        let passes = arena.deletion_passes();
        let mut all: Vec<i64> = passes.into_iter().flatten().collect();
        all.sort();
        assert_eq!(all, vec![1, 2]);
    }
}
