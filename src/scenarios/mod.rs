//! Scenario tree: a quarterly-branching Monte Carlo tree over a yield curve,
//! used by the CVaR optimizer to sample terminal outcomes of a candidate
//! hedge.

use chrono::NaiveDate;

use crate::curves::{CurveSnapshot, YieldCurve};
use crate::engine::QUARTER_LEN_DAYS;

/// A single node in the scenario tree: one curve state at one quarterly step.
#[derive(Debug, Clone)]
pub struct ScenarioNode {
    pub level: usize,
    pub parent: Option<usize>,
    pub date: NaiveDate,
    pub curve_snapshot: CurveSnapshot,
    /// Quarterly accrual multiplier applied when walking from this node's
    /// parent to this node: `1 + r_1y(parent) / 4`.
    pub acc_mult_to_child: f64,
}

/// Builds a flat, arena-style scenario tree rooted at `curve`'s current
/// state. Each non-leaf node fans out into `branch` children, each an
/// independent quarter-ahead simulation of the curve starting from the
/// parent's snapshot. `levels` counts the root as level 0, so the tree has
/// `levels` generations including the root.
///
/// `seed` drives the per-branch reseeding deterministically: branch `b` of
/// node `p_idx` at tree-build index `i` is reseeded with
/// `seed.wrapping_add(i as u64)`, so the whole tree is reproducible for a
/// fixed `(curve state, seed)` pair.
pub fn build_tree(curve: &dyn YieldCurve, levels: usize, branch: usize, seed: u64) -> Vec<ScenarioNode> {
    let mut nodes = Vec::new();
    nodes.push(ScenarioNode {
        level: 0,
        parent: None,
        date: curve.snapshot().date,
        curve_snapshot: curve.snapshot(),
        acc_mult_to_child: 1.0,
    });

    let mut idx_by_level: Vec<Vec<usize>> = vec![vec![0]];
    let mut reseed_counter: u64 = 0;

    for level in 1..levels {
        let mut this_level = Vec::new();
        let parents = idx_by_level[level - 1].clone();
        for &p_idx in &parents {
            let parent_snapshot = nodes[p_idx].curve_snapshot.clone();
            let r1y_parent = parent_snapshot.at(12);
            let acc_mult = 1.0 + r1y_parent / 4.0;

            for _ in 0..branch {
                let mut local = curve.box_clone();
                reseed_counter += 1;
                local.reseed(seed.wrapping_add(reseed_counter));
                local.step(QUARTER_LEN_DAYS);
                let snap = local.snapshot();

                nodes.push(ScenarioNode {
                    level,
                    parent: Some(p_idx),
                    date: snap.date,
                    curve_snapshot: snap,
                    acc_mult_to_child: acc_mult,
                });
                this_level.push(nodes.len() - 1);
            }
        }
        idx_by_level.push(this_level);
    }

    nodes
}

/// Indices of every node at the deepest level of the tree.
pub fn leaf_indices(nodes: &[ScenarioNode]) -> Vec<usize> {
    let max_level = nodes.iter().map(|n| n.level).max().unwrap_or(0);
    nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.level == max_level)
        .map(|(i, _)| i)
        .collect()
}

/// The root-to-`leaf` path of node indices, in root-first order.
pub fn path_to_root(nodes: &[ScenarioNode], leaf: usize) -> Vec<usize> {
    let mut path = Vec::new();
    let mut cur = Some(leaf);
    while let Some(i) = cur {
        path.push(i);
        cur = nodes[i].parent;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::MeanRevertingCurve;
    use std::collections::BTreeMap;

    fn curve() -> MeanRevertingCurve {
        let t0 = NaiveDate::from_ymd_opt(2016, 12, 31).unwrap();
        let anchors = BTreeMap::from([(0, 0.09), (3, 0.095), (6, 0.10), (12, 0.105), (24, 0.11)]);
        MeanRevertingCurve::new(t0, anchors, None, None, Some(42)).unwrap()
    }

    #[test]
    fn tree_has_expected_node_count() {
        let c = curve();
        let nodes = build_tree(&c, 3, 4, 1);
        // level 0: 1, level 1: 4, level 2: 16
        assert_eq!(nodes.len(), 1 + 4 + 16);
    }

    #[test]
    fn leaves_are_all_at_deepest_level() {
        let c = curve();
        let nodes = build_tree(&c, 4, 3, 7);
        let leaves = leaf_indices(&nodes);
        assert!(leaves.iter().all(|&i| nodes[i].level == 3));
        assert_eq!(leaves.len(), 27);
    }

    #[test]
    fn path_to_root_starts_at_root() {
        let c = curve();
        let nodes = build_tree(&c, 3, 2, 5);
        let leaf = leaf_indices(&nodes)[0];
        let path = path_to_root(&nodes, leaf);
        assert_eq!(path[0], 0);
        assert_eq!(*path.last().unwrap(), leaf);
    }

    #[test]
    fn same_seed_gives_reproducible_tree() {
        let c = curve();
        let a = build_tree(&c, 3, 3, 99);
        let b = build_tree(&c, 3, 3, 99);
        for (na, nb) in a.iter().zip(b.iter()) {
            assert_eq!(na.curve_snapshot, nb.curve_snapshot);
        }
    }

    #[test]
    fn single_level_tree_is_just_the_root() {
        let c = curve();
        let nodes = build_tree(&c, 1, 5, 1);
        assert_eq!(nodes.len(), 1);
        assert_eq!(leaf_indices(&nodes), vec![0]);
    }
}
