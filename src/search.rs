//! Branch-and-bound search over itemsets.
//!
//! Depth-first, single-threaded exploration of candidate splits. Every node
//! of the search corresponds to a sorted itemset (the branches taken so far)
//! and a cover (the rows still reachable); the trie memoizes the best value
//! per itemset so identical subproblems reached through different branching
//! orders are solved once. Upper bounds shrink as incumbents are found and
//! prune subtrees that provably cannot improve; lower bounds recorded on
//! failed subproblems prune revisits. Candidate attributes are scanned in
//! ascending index order at every level, which fixes the tree produced on
//! ties and makes runs reproducible.

use crate::config::SearchConfig;
use crate::cover::Cover;
use crate::data::{Attribute, DataManager};
use crate::depth_two::compute_depth_two;
use crate::errors::OptitreeError;
use crate::objective::Objective;
use crate::tree::{Tree, TreeNode};
use crate::trie::{add_item, item, Item, NodeData, Trie};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

fn float_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < f64::EPSILON
}

/// Outcome of a finished (or timed-out) search.
///
/// An absent tree with `proven_optimal = true` means the constraints were
/// proven infeasible: no tree beats the configured `max_error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The optimal tree, when one was found within the bounds.
    pub tree: Option<Tree>,
    /// Objective value of `tree`.
    pub objective_value: Option<f64>,
    /// Node count of `tree`, leaves included.
    pub size: usize,
    /// Split depth of `tree`.
    pub depth: usize,
    /// Whether the reported value is certified optimal (or the constraints
    /// certified infeasible), as opposed to a best-effort answer after an
    /// exhausted time budget or an early stop.
    pub proven_optimal: bool,
    /// Number of distinct subproblems evaluated.
    pub lattice_size: usize,
    /// Wall-clock time spent searching.
    pub elapsed: Duration,
}

/// The branch-and-bound orchestrator.
pub struct TreeSearch<'a> {
    data: &'a DataManager,
    config: SearchConfig,
    objective: &'a Objective<'a>,
    trie: Trie,
    start: Instant,
    time_limit_reached: bool,
    stopped_early: bool,
    cache_hits: usize,
}

impl<'a> TreeSearch<'a> {
    /// Set up a search; fails on invalid parameters before any work is done.
    pub fn new(
        data: &'a DataManager,
        config: SearchConfig,
        objective: &'a Objective<'a>,
    ) -> Result<Self, OptitreeError> {
        config.validate()?;
        Ok(TreeSearch {
            data,
            config,
            objective,
            trie: Trie::new(),
            start: Instant::now(),
            time_limit_reached: false,
            stopped_early: false,
            cache_hits: 0,
        })
    }

    /// The subproblem cache. Populated by [`run`](Self::run); exposed for
    /// diagnostics and soundness checks.
    pub fn trie(&self) -> &Trie {
        &self.trie
    }

    /// Run the search to completion (or until the time budget expires) and
    /// decode the optimal tree.
    pub fn run(&mut self) -> Result<SearchResult, OptitreeError> {
        self.trie = Trie::new();
        self.time_limit_reached = false;
        self.stopped_early = false;
        self.cache_hits = 0;
        self.start = Instant::now();

        info!(
            "searching: {} rows, {} attributes, {} classes, max_depth={}, min_support={}, objective={}",
            self.data.n_rows(),
            self.data.n_attributes(),
            self.data.n_classes(),
            self.config.max_depth,
            self.config.min_support,
            self.objective.name(),
        );

        let cover = Cover::root(self.data);
        let candidates = self.root_candidates(&cover);
        let root = self.trie.insert(&[]);
        let ub = self.config.max_error.unwrap_or(f64::INFINITY);
        self.recurse(&[], None, root, &candidates, &cover, 0, ub)?;

        let (solved, error) = {
            let data = self.trie.data(root).expect("root entry exists after the search");
            (data.is_final(), data.error)
        };
        let (tree, objective_value) = if solved {
            let tree = Tree {
                root: self.decode(&[], root)?,
            };
            (Some(tree), Some(error))
        } else {
            (None, None)
        };

        let elapsed = self.start.elapsed();
        let result = SearchResult {
            size: tree.as_ref().map_or(0, Tree::node_count),
            depth: tree.as_ref().map_or(0, Tree::depth),
            tree,
            objective_value,
            proven_optimal: !self.time_limit_reached && !self.stopped_early,
            lattice_size: self.trie.lattice_size(),
            elapsed,
        };
        info!(
            "search finished: value={:?}, proven_optimal={}, lattice_size={}, cache_hits={}, elapsed={:?}",
            result.objective_value, result.proven_optimal, result.lattice_size, self.cache_hits, result.elapsed,
        );
        Ok(result)
    }

    /// Solve the subproblem of one itemset and record the outcome at `node`.
    ///
    /// `ub` is strict: only trees with a value below it are searched for. On
    /// return the entry is either final (proven optimum) or carries a
    /// tightened lower bound proving nothing below `ub` exists.
    #[allow(clippy::too_many_arguments)]
    fn recurse(
        &mut self,
        itemset: &[Item],
        last_added: Option<Attribute>,
        node: usize,
        candidates: &[Attribute],
        cover: &Cover,
        depth: usize,
        ub: f64,
    ) -> Result<(), OptitreeError> {
        // time budget consulted once per node entry
        if let Some(limit) = self.config.time_limit {
            if !self.time_limit_reached && self.start.elapsed().as_secs_f64() >= limit {
                warn!("time limit of {}s reached, unwinding", limit);
                self.time_limit_reached = true;
            }
        }

        let support = cover.count();
        let signature = cover.signature();
        let existing = self.trie.data(node).is_some();

        let (leaf_error, lower_bound) = if let Some(data) = self.trie.data(node) {
            if data.signature != signature {
                return Err(OptitreeError::CacheInconsistency(data.signature, signature));
            }
            if data.is_final() {
                self.cache_hits += 1;
                debug!("cache hit: solved entry worth {}", data.error);
                return Ok(());
            }
            (data.leaf_error, data.lower_bound)
        } else {
            let leaf = self.objective.leaf(cover);
            let value = leaf.value;
            self.trie.set_data(node, NodeData::new(leaf.value, leaf.prediction, signature));
            (value, 0.0)
        };

        // the subproblem cannot beat the inherited bound
        if ub <= lower_bound {
            debug!("infeasible: ub {} <= lb {}", ub, lower_bound);
            return Ok(());
        }
        // the leaf already reaches the lowest value possible
        if float_eq(leaf_error, lower_bound) {
            self.close_as_leaf(node);
            return Ok(());
        }
        // out of depth or support: the node stays a leaf
        if depth == self.config.max_depth || support < 2 * self.config.min_support {
            debug!("cannot split further, leaf error {}", leaf_error);
            self.close_as_leaf(node);
            return Ok(());
        }
        // out of time: close with the best knowledge available
        if self.time_limit_reached {
            self.close_as_leaf(node);
            return Ok(());
        }
        // two remaining levels solve in closed form
        if self.config.max_depth - depth == 2 && self.config.use_depth_two && self.objective.supports_counts() {
            compute_depth_two(
                &mut self.trie,
                cover,
                self.objective,
                self.config.min_support,
                itemset,
                node,
                candidates,
                last_added,
                ub,
            );
            return Ok(());
        }

        // candidates this node can actually branch on; a revisited node
        // re-explores exactly the attributes it branched on before
        let next: Vec<Attribute> = if existing {
            let saved = self.trie.child_attributes(node);
            if saved.is_empty() {
                self.successors(candidates, cover, last_added)
            } else {
                saved
            }
        } else {
            self.successors(candidates, cover, last_added)
        };
        if next.is_empty() {
            debug!("no feasible candidate, leaf error {}", leaf_error);
            self.close_as_leaf(node);
            return Ok(());
        }

        // the leaf itself is the first incumbent
        let mut child_ub = ub;
        if self.objective.better(leaf_error, child_ub) {
            self.close_as_leaf(node);
            child_ub = leaf_error;
        }

        // tightest bound derivable from the rejected candidates
        let mut min_lb = f64::INFINITY;

        for &attribute in &next {
            debug!("evaluating attribute {}", attribute);

            let neg_cover = cover.intersect(attribute, false);
            let neg_itemset = add_item(itemset, item(attribute, false));
            let neg_node = self.trie.insert(&neg_itemset);
            self.recurse(&neg_itemset, Some(attribute), neg_node, &next, &neg_cover, depth + 1, child_ub)?;
            let (first_error, first_lb, left_size) = {
                let data = self.trie.data(neg_node).expect("child entry exists after recursion");
                (data.error, data.lower_bound, data.size)
            };

            if self.objective.better(first_error, child_ub) {
                let pos_cover = cover.intersect(attribute, true);
                let pos_itemset = add_item(itemset, item(attribute, true));
                let pos_node = self.trie.insert(&pos_itemset);
                let remain_ub = child_ub - first_error;
                self.recurse(&pos_itemset, Some(attribute), pos_node, &next, &pos_cover, depth + 1, remain_ub)?;
                let (second_error, right_size) = {
                    let data = self.trie.data(pos_node).expect("child entry exists after recursion");
                    (data.error, data.size)
                };

                let total = self.objective.combine(first_error, second_error);
                if self.objective.better(total, child_ub) {
                    child_ub = total;
                    let data = self.trie.data_mut(node).expect("node entry exists");
                    data.error = total;
                    data.test = Some(attribute);
                    data.size = left_size + right_size + 1;
                    debug!("attribute {} improves node error to {}", attribute, total);
                } else if total.is_finite() {
                    min_lb = min_lb.min(total);
                }

                // the lower bound is reached: remaining candidates cannot help
                let data = self.trie.data(node).expect("node entry exists");
                if data.is_final() && float_eq(data.error, data.lower_bound) {
                    debug!("node error reached its lower bound, skipping remaining attributes");
                    break;
                }
            } else {
                // second branch not attempted: account for its saved bound
                let pos_itemset = add_item(itemset, item(attribute, true));
                let second_lb = self
                    .trie
                    .find(&pos_itemset)
                    .and_then(|n| self.trie.data(n))
                    .map_or(0.0, |d| if d.is_final() { d.error } else { d.lower_bound });
                let first_contrib = if first_error.is_finite() { first_error } else { first_lb };
                min_lb = min_lb.min(first_contrib + second_lb);
            }

            if depth == 0 && self.config.stop_after_better {
                if let Some(bound) = self.config.max_error {
                    let data = self.trie.data(node).expect("node entry exists");
                    if data.is_final() && self.objective.better(data.error, bound) {
                        info!("stopping after the first tree beating {}", bound);
                        self.stopped_early = true;
                        break;
                    }
                }
            }
        }

        // nothing beat the bound: record the proof, never loosening it
        let data = self.trie.data_mut(node).expect("node entry exists");
        if !data.is_final() {
            let bound = if min_lb.is_finite() { ub.max(min_lb) } else { ub };
            data.tighten_lower_bound(bound);
        }
        Ok(())
    }

    fn close_as_leaf(&mut self, node: usize) {
        let data = self.trie.data_mut(node).expect("node entry exists");
        data.error = data.leaf_error;
        data.test = None;
        data.size = 1;
    }

    /// Attributes of `candidates` this cover can split on: both sides must
    /// meet the support floor, and re-splitting the attribute just branched
    /// on is pointless (one side would be empty).
    fn successors(&self, candidates: &[Attribute], cover: &Cover, last_added: Option<Attribute>) -> Vec<Attribute> {
        let support = cover.count();
        candidates
            .iter()
            .copied()
            .filter(|&attribute| {
                if Some(attribute) == last_added {
                    return false;
                }
                let left = cover.intersect_count(attribute, false);
                left >= self.config.min_support && support - left >= self.config.min_support
            })
            .collect()
    }

    fn root_candidates(&self, cover: &Cover) -> Vec<Attribute> {
        if self.config.min_support == 1 {
            // every attribute qualifies; per-node filtering still applies
            (0..self.data.n_attributes()).collect()
        } else {
            self.successors(&(0..self.data.n_attributes()).collect::<Vec<_>>(), cover, None)
        }
    }

    /// Materialize the optimal tree by walking the solved entries.
    fn decode(&self, itemset: &[Item], node: usize) -> Result<TreeNode, OptitreeError> {
        let data = self.trie.data(node).expect("decoded entry exists");
        match data.test {
            None => Ok(TreeNode::Leaf {
                prediction: data.prediction,
                error: data.error,
            }),
            Some(attribute) => {
                let neg_itemset = add_item(itemset, item(attribute, false));
                let pos_itemset = add_item(itemset, item(attribute, true));
                let neg = self
                    .trie
                    .find(&neg_itemset)
                    .expect("a split entry records both children");
                let pos = self
                    .trie
                    .find(&pos_itemset)
                    .expect("a split entry records both children");
                Ok(TreeNode::Split {
                    attribute,
                    left: Box::new(self.decode(&neg_itemset, neg)?),
                    right: Box::new(self.decode(&pos_itemset, pos)?),
                })
            }
        }
    }
}
