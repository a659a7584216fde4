//! Closed-form solver for subproblems with exactly two remaining levels.
//!
//! Instead of recursing, precompute the per-class supports of every attribute
//! pair over the current cover (one triangular matrix of bit-vector probes),
//! then score every (root, left-sub, right-sub) combination with support
//! arithmetic alone. This skips a full level of cover materialization and is
//! the dominant cost reduction over naive expansion. Only available for
//! objectives that can score a leaf from class counts; the search falls back
//! to general expansion otherwise.
//!
//! Attributes are scanned in ascending index order and comparisons are
//! strict improvements, so the lowest-index combination wins every tie; a
//! bare leaf wins against an equally-good split.

use crate::cover::Cover;
use crate::data::{Attribute, Support};
use crate::objective::{LeafValue, Objective};
use crate::trie::{add_item, item, Item, NodeData, Trie};
use log::debug;

/// Best shape found for one side of the root split.
struct ChildChoice {
    attribute: Option<Attribute>,
    error: f64,
    leaf: LeafValue,
    neg: Option<LeafValue>,
    pos: Option<LeafValue>,
}

struct BestSplit {
    root: Attribute,
    left: ChildChoice,
    right: ChildChoice,
}

fn sub_counts(a: &[Support], b: &[Support]) -> Vec<Support> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

/// Solve the subproblem at `node` with a depth budget of two and record the
/// result (root entry, children, grandchildren) in the trie.
///
/// Requires `node` to hold an unsolved entry and the objective to support
/// counts-based leaves. The computed value is the true optimum of the
/// subproblem, independent of `ub`; `ub` only short-circuits the call when
/// the saved lower bound already proves infeasibility.
pub(crate) fn compute_depth_two(
    trie: &mut Trie,
    cover: &Cover,
    objective: &Objective,
    min_support: usize,
    itemset: &[Item],
    node: usize,
    candidates: &[Attribute],
    last_added: Option<Attribute>,
    ub: f64,
) {
    let (leaf_error, saved_lb) = {
        let data = trie.data(node).expect("depth-two solver runs on an initialized node");
        (data.leaf_error, data.lower_bound)
    };
    if ub <= saved_lb {
        debug!("depth-two: infeasible, ub {} <= lb {}", ub, saved_lb);
        return;
    }

    let counts_leaf = |counts: &[Support]| -> LeafValue {
        objective
            .leaf_from_counts(counts)
            .expect("depth-two solver requires a counts-based objective")
    };

    let root_counts = cover.class_counts();
    let root_sup = cover.count();
    let attrs: Vec<Attribute> = candidates.iter().copied().filter(|a| Some(*a) != last_added).collect();

    // Triangular pair supports: sups[l][i] (i >= l) holds the per-class
    // counts of cover ∩ attr_l ∩ attr_i; the diagonal is a single attribute.
    let mut sups: Vec<Vec<Vec<Support>>> = Vec::with_capacity(attrs.len());
    for (l, &attribute) in attrs.iter().enumerate() {
        let child = cover.intersect(attribute, true);
        let mut row: Vec<Vec<Support>> = vec![Vec::new(); attrs.len()];
        for (i, &other) in attrs.iter().enumerate().skip(l + 1) {
            row[i] = child.intersect_class_counts(other);
        }
        row[l] = child.class_counts();
        sups.push(row);
    }
    let pair = |i: usize, j: usize| -> &[Support] { &sups[i.min(j)][i.max(j)] };

    let mut best: Option<BestSplit> = None;
    let mut best_error = f64::INFINITY;

    for (i, &root_attr) in attrs.iter().enumerate() {
        let pos_counts = pair(i, i);
        let pos_sup: Support = pos_counts.iter().sum();
        let neg_counts = sub_counts(&root_counts, pos_counts);
        let neg_sup = root_sup - pos_sup;

        // root split must leave both sides above the support floor
        if neg_sup < min_support || pos_sup < min_support {
            continue;
        }

        // attribute-unset side: leaf, or the best single sub-split
        let left_leaf = counts_leaf(&neg_counts);
        let mut left_error = left_leaf.value;
        let mut left_pick: (Option<Attribute>, Option<LeafValue>, Option<LeafValue>) = (None, None, None);
        if neg_sup >= 2 * min_support && left_leaf.value != 0.0 {
            for (j, &sub_attr) in attrs.iter().enumerate() {
                if j == i {
                    continue;
                }
                let negpos_counts = sub_counts(pair(j, j), pair(i, j));
                let negpos_sup: Support = negpos_counts.iter().sum();
                let negneg_sup = neg_sup - negpos_sup;
                if negneg_sup < min_support || negpos_sup < min_support {
                    continue;
                }
                let pos_leaf = counts_leaf(&negpos_counts);
                if pos_leaf.value >= left_error.min(best_error) {
                    continue;
                }
                let negneg_counts = sub_counts(&neg_counts, &negpos_counts);
                let neg_leaf = counts_leaf(&negneg_counts);
                let total = objective.combine(neg_leaf.value, pos_leaf.value);
                if objective.better(total, left_error.min(best_error)) {
                    left_error = total;
                    left_pick = (Some(sub_attr), Some(neg_leaf), Some(pos_leaf));
                    if total == 0.0 {
                        break;
                    }
                }
            }
        }

        // only look right when the left side still allows an improvement
        if !objective.better(left_error, best_error) {
            continue;
        }

        let right_leaf = counts_leaf(pos_counts);
        let mut right_error = right_leaf.value;
        let mut right_pick: (Option<Attribute>, Option<LeafValue>, Option<LeafValue>) = (None, None, None);
        if pos_sup >= 2 * min_support && right_leaf.value != 0.0 {
            let budget = best_error - left_error;
            for (j, &sub_attr) in attrs.iter().enumerate() {
                if j == i {
                    continue;
                }
                let pospos_counts = pair(i, j);
                let pospos_sup: Support = pospos_counts.iter().sum();
                let posneg_sup = pos_sup - pospos_sup;
                if posneg_sup < min_support || pospos_sup < min_support {
                    continue;
                }
                let posneg_counts = sub_counts(pos_counts, pospos_counts);
                let neg_leaf = counts_leaf(&posneg_counts);
                if neg_leaf.value >= right_error.min(budget) {
                    continue;
                }
                let pos_leaf = counts_leaf(pospos_counts);
                let total = objective.combine(neg_leaf.value, pos_leaf.value);
                if objective.better(total, right_error.min(budget)) {
                    right_error = total;
                    right_pick = (Some(sub_attr), Some(neg_leaf), Some(pos_leaf));
                    if total == 0.0 {
                        break;
                    }
                }
            }
        }

        let total = objective.combine(left_error, right_error);
        if objective.better(total, best_error) {
            debug!("depth-two: root a{} improves to {}", root_attr, total);
            best_error = total;
            best = Some(BestSplit {
                root: root_attr,
                left: ChildChoice {
                    attribute: left_pick.0,
                    error: left_error,
                    leaf: left_leaf,
                    neg: left_pick.1,
                    pos: left_pick.2,
                },
                right: ChildChoice {
                    attribute: right_pick.0,
                    error: right_error,
                    leaf: right_leaf,
                    neg: right_pick.1,
                    pos: right_pick.2,
                },
            });
        }
    }

    // a leaf wins over an equally-good split
    match best {
        Some(split) if objective.better(split.error(), leaf_error) => {
            let neg_cover = cover.intersect(split.root, false);
            let pos_cover = cover.intersect(split.root, true);
            let left_size = write_child(trie, itemset, split.root, false, &neg_cover, &split.left);
            let right_size = write_child(trie, itemset, split.root, true, &pos_cover, &split.right);
            let data = trie.data_mut(node).expect("depth-two node entry exists");
            data.error = split.error();
            data.test = Some(split.root);
            data.size = left_size + right_size + 1;
        }
        _ => {
            let data = trie.data_mut(node).expect("depth-two node entry exists");
            data.error = leaf_error;
            data.test = None;
            data.size = 1;
        }
    }
}

impl BestSplit {
    fn error(&self) -> f64 {
        self.left.error + self.right.error
    }
}

/// Record one side of the winning root split (and its grandchild leaves) in
/// the trie. Returns the subtree node count.
fn write_child(
    trie: &mut Trie,
    itemset: &[Item],
    root: Attribute,
    present: bool,
    cover: &Cover,
    choice: &ChildChoice,
) -> usize {
    let child_itemset = add_item(itemset, item(root, present));
    let child_node = trie.insert(&child_itemset);

    let mut size = 1;
    let mut data = NodeData::new(choice.leaf.value, choice.leaf.prediction, cover.signature());
    data.error = choice.error;
    if let Some(sub) = choice.attribute {
        data.test = Some(sub);
        data.size = 3;
        size = 3;
        let grandchildren = [(false, choice.neg), (true, choice.pos)];
        for (sub_present, leaf) in grandchildren {
            let leaf = leaf.expect("a split child records both grandchild leaves");
            let gc_cover = cover.intersect(sub, sub_present);
            let gc_node = trie.insert(&add_item(&child_itemset, item(sub, sub_present)));
            store_final(trie, gc_node, leaf, gc_cover.signature());
        }
    }
    store(trie, child_node, data);
    size
}

fn store_final(trie: &mut Trie, node: usize, leaf: LeafValue, signature: u64) {
    let mut data = NodeData::new(leaf.value, leaf.prediction, signature);
    data.error = leaf.value;
    store(trie, node, data);
}

/// Install an entry without ever loosening what is already known.
fn store(trie: &mut Trie, node: usize, data: NodeData) {
    match trie.data_mut(node) {
        Some(existing) if existing.is_final() => {}
        Some(existing) => {
            let saved_lb = existing.lower_bound;
            let mut data = data;
            data.tighten_lower_bound(saved_lb);
            *existing = data;
        }
        None => trie.set_data(node, data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BoolMatrix, DataManager};

    // 8 rows, 3 attributes (column-major), labels follow attribute 1 except
    // where attribute 2 flips them. Best depth-2 tree has error 0.
    fn database() -> DataManager {
        let data = vec![
            true, true, true, true, false, false, false, false, // attribute 0
            true, true, false, false, true, true, false, false, // attribute 1
            true, false, true, false, true, false, true, false, // attribute 2
        ];
        let labels = vec![0, 1, 1, 0, 0, 1, 1, 0];
        let matrix = BoolMatrix::new(&data, 8, 3);
        DataManager::new(&matrix, &labels, None).unwrap()
    }

    fn solve(dm: &DataManager, min_support: usize) -> (Trie, usize) {
        let cover = Cover::root(dm);
        let mut trie = Trie::new();
        let node = trie.insert(&[]);
        let objective = Objective::Error;
        let leaf = objective.leaf(&cover);
        trie.set_data(node, NodeData::new(leaf.value, leaf.prediction, cover.signature()));
        compute_depth_two(
            &mut trie,
            &cover,
            &objective,
            min_support,
            &[],
            node,
            &[0, 1, 2],
            None,
            f64::INFINITY,
        );
        (trie, node)
    }

    #[test]
    fn test_finds_the_xor_tree() {
        let dm = database();
        let (trie, node) = solve(&dm, 1);
        let data = trie.data(node).unwrap();
        assert!(data.is_final());
        // labels are attribute1 XOR attribute2: no single split helps, the
        // pair (1, 2) separates perfectly
        assert_eq!(data.error, 0.0);
        assert_eq!(data.test, Some(1));
        assert_eq!(data.size, 7);

        // children and grandchildren are recorded for decoding
        let left = trie.find(&[item(1, false)]).unwrap();
        assert_eq!(trie.data(left).unwrap().test, Some(2));
        let gc = trie.find(&[item(1, false), item(2, true)]).unwrap();
        assert_eq!(trie.data(gc).unwrap().error, 0.0);
        assert_eq!(trie.data(gc).unwrap().prediction, Some(1));
    }

    #[test]
    fn test_support_floor_blocks_splits() {
        let dm = database();
        // every second-level side covers 2 rows; min_support 3 forbids the
        // grandchild splits, so the best tree is a single split or a leaf
        let (trie, node) = solve(&dm, 3);
        let data = trie.data(node).unwrap();
        assert!(data.is_final());
        // any single split leaves 2 errors per side at best: error 4 equals
        // the root leaf, so the leaf wins the tie
        assert_eq!(data.error, 4.0);
        assert_eq!(data.test, None);
        assert_eq!(data.size, 1);
    }

    #[test]
    fn test_infeasible_bound_leaves_entry_open() {
        let dm = database();
        let cover = Cover::root(&dm);
        let mut trie = Trie::new();
        let node = trie.insert(&[]);
        let objective = Objective::Error;
        let leaf = objective.leaf(&cover);
        let mut data = NodeData::new(leaf.value, leaf.prediction, cover.signature());
        data.tighten_lower_bound(2.0);
        trie.set_data(node, data);
        compute_depth_two(&mut trie, &cover, &objective, 1, &[], node, &[0, 1, 2], None, 1.0);
        assert!(!trie.data(node).unwrap().is_final());
    }
}
