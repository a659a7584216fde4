//! Itemset trie cache.
//!
//! Memoizes solved and partially-bounded subproblems. An *item* is an
//! (attribute, branch) pair packed into one integer; a subproblem key is the
//! sorted itemset of every branch taken from the root. Sorting is what makes
//! the cache hit across branches: two different branching orders over the
//! same attributes produce the same key, and — because intersection is
//! order-independent — the same covered rows. Each entry additionally stores
//! the cover signature observed at creation, so a hit that does *not* cover
//! the same rows is detected instead of silently reusing a wrong value.
//!
//! Entries are never evicted and never loosened: lower bounds only go up and
//! a solved entry never changes.

use crate::data::Attribute;
use hashbrown::HashSet;

/// An (attribute, branch) pair packed as `attribute * 2 + branch`.
pub type Item = usize;

/// Pack an item.
pub fn item(attribute: Attribute, present: bool) -> Item {
    attribute * 2 + usize::from(present)
}

/// Attribute of a packed item.
pub fn item_attribute(item: Item) -> Attribute {
    item / 2
}

/// Branch of a packed item (true for the attribute-present side).
pub fn item_present(item: Item) -> bool {
    item % 2 == 1
}

/// New itemset with `item` inserted at its sorted position.
pub fn add_item(itemset: &[Item], item: Item) -> Vec<Item> {
    let at = itemset.partition_point(|existing| *existing < item);
    let mut out = Vec::with_capacity(itemset.len() + 1);
    out.extend_from_slice(&itemset[..at]);
    out.push(item);
    out.extend_from_slice(&itemset[at..]);
    out
}

/// Everything known about one subproblem.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Best objective value proven optimal for this subproblem, or
    /// `f64::INFINITY` while only a bound is known.
    pub error: f64,
    /// Objective value of leaving this node as a leaf.
    pub leaf_error: f64,
    /// Tightest known lower bound on any tree rooted here.
    pub lower_bound: f64,
    /// Chosen splitting attribute, `None` when the best tree is a leaf.
    pub test: Option<Attribute>,
    /// Leaf prediction (majority class), when the objective defines one.
    pub prediction: Option<usize>,
    /// Node count of the best subtree found.
    pub size: usize,
    /// Cover signature recorded on first visit.
    pub signature: u64,
}

impl NodeData {
    /// Fresh entry: leaf statistics known, not yet solved.
    pub fn new(leaf_error: f64, prediction: Option<usize>, signature: u64) -> Self {
        NodeData {
            error: f64::INFINITY,
            leaf_error,
            lower_bound: 0.0,
            test: None,
            prediction,
            size: 1,
            signature,
        }
    }

    /// Whether the stored value is proven optimal.
    pub fn is_final(&self) -> bool {
        self.error.is_finite()
    }

    /// Raise the lower bound; never lowers it.
    pub fn tighten_lower_bound(&mut self, bound: f64) {
        if bound > self.lower_bound {
            self.lower_bound = bound;
        }
    }
}

struct TrieEdge {
    item: Item,
    index: usize,
}

struct TrieNode {
    edges: Vec<TrieEdge>,
    data: Option<NodeData>,
}

/// Prefix tree over sorted itemsets.
pub struct Trie {
    nodes: Vec<TrieNode>,
    data_count: usize,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    /// Empty trie holding only the root (empty itemset) node.
    pub fn new() -> Self {
        Trie {
            nodes: vec![TrieNode {
                edges: Vec::new(),
                data: None,
            }],
            data_count: 0,
        }
    }

    /// Node of the given itemset, creating the path as needed.
    pub fn insert(&mut self, itemset: &[Item]) -> usize {
        let mut current = 0;
        for item in itemset {
            current = match self.nodes[current].edges.binary_search_by_key(item, |e| e.item) {
                Ok(pos) => self.nodes[current].edges[pos].index,
                Err(pos) => {
                    let index = self.nodes.len();
                    self.nodes.push(TrieNode {
                        edges: Vec::new(),
                        data: None,
                    });
                    self.nodes[current].edges.insert(pos, TrieEdge { item: *item, index });
                    index
                }
            };
        }
        current
    }

    /// Node of the given itemset, if the path exists.
    pub fn find(&self, itemset: &[Item]) -> Option<usize> {
        let mut current = 0;
        for item in itemset {
            let pos = self.nodes[current].edges.binary_search_by_key(item, |e| e.item).ok()?;
            current = self.nodes[current].edges[pos].index;
        }
        Some(current)
    }

    /// Entry stored at a node.
    pub fn data(&self, node: usize) -> Option<&NodeData> {
        self.nodes[node].data.as_ref()
    }

    /// Mutable entry stored at a node.
    pub fn data_mut(&mut self, node: usize) -> Option<&mut NodeData> {
        self.nodes[node].data.as_mut()
    }

    /// Attach a fresh entry to a node.
    pub fn set_data(&mut self, node: usize, data: NodeData) {
        if self.nodes[node].data.is_none() {
            self.data_count += 1;
        }
        self.nodes[node].data = Some(data);
    }

    /// Distinct attributes on this node's outgoing edges, ascending.
    ///
    /// These are the candidates a previous visit actually branched on; a
    /// revisit with a wider bound re-explores exactly them.
    pub fn child_attributes(&self, node: usize) -> Vec<Attribute> {
        let mut seen = HashSet::new();
        let mut attributes = Vec::new();
        for edge in &self.nodes[node].edges {
            let attribute = item_attribute(edge.item);
            if seen.insert(attribute) {
                attributes.push(attribute);
            }
        }
        attributes
    }

    /// Number of subproblems holding an entry.
    pub fn lattice_size(&self) -> usize {
        self.data_count
    }

    /// Every stored entry together with its itemset, depth-first.
    pub fn entries(&self) -> Vec<(Vec<Item>, &NodeData)> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.collect_entries(0, &mut path, &mut out);
        out
    }

    fn collect_entries<'a>(&'a self, node: usize, path: &mut Vec<Item>, out: &mut Vec<(Vec<Item>, &'a NodeData)>) {
        if let Some(data) = &self.nodes[node].data {
            out.push((path.clone(), data));
        }
        for edge in &self.nodes[node].edges {
            path.push(edge.item);
            self.collect_entries(edge.index, path, out);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_packing() {
        let packed = item(7, true);
        assert_eq!(item_attribute(packed), 7);
        assert!(item_present(packed));
        assert!(!item_present(item(7, false)));
        assert!(item(3, true) < item(4, false));
    }

    #[test]
    fn test_add_item_keeps_order() {
        let itemset = add_item(&[item(1, false), item(5, true)], item(3, true));
        assert_eq!(itemset, vec![item(1, false), item(3, true), item(5, true)]);
    }

    #[test]
    fn test_branch_orders_share_a_node() {
        let mut trie = Trie::new();
        let via_a = add_item(&add_item(&[], item(2, true)), item(0, false));
        let via_b = add_item(&add_item(&[], item(0, false)), item(2, true));
        assert_eq!(trie.insert(&via_a), trie.insert(&via_b));
    }

    #[test]
    fn test_find_and_data_roundtrip() {
        let mut trie = Trie::new();
        let key = vec![item(0, true), item(4, false)];
        assert!(trie.find(&key).is_none());
        let node = trie.insert(&key);
        assert_eq!(trie.find(&key), Some(node));
        assert!(trie.data(node).is_none());

        trie.set_data(node, NodeData::new(3.0, Some(1), 0xdead));
        assert_eq!(trie.lattice_size(), 1);
        let data = trie.data(node).unwrap();
        assert!(!data.is_final());
        assert_eq!(data.leaf_error, 3.0);
    }

    #[test]
    fn test_lower_bound_only_tightens() {
        let mut data = NodeData::new(5.0, Some(0), 0);
        data.tighten_lower_bound(2.0);
        assert_eq!(data.lower_bound, 2.0);
        data.tighten_lower_bound(1.0);
        assert_eq!(data.lower_bound, 2.0);
        data.tighten_lower_bound(4.0);
        assert_eq!(data.lower_bound, 4.0);
    }

    #[test]
    fn test_child_attributes_deduplicated() {
        let mut trie = Trie::new();
        trie.insert(&[item(3, false)]);
        trie.insert(&[item(3, true)]);
        trie.insert(&[item(1, true)]);
        assert_eq!(trie.child_attributes(0), vec![1, 3]);
    }

    #[test]
    fn test_entries_walk() {
        let mut trie = Trie::new();
        let a = trie.insert(&[item(0, false)]);
        let b = trie.insert(&[item(0, false), item(2, true)]);
        trie.set_data(a, NodeData::new(1.0, Some(0), 1));
        trie.set_data(b, NodeData::new(0.0, Some(1), 2));
        let entries = trie.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, vec![item(0, false)]);
        assert_eq!(entries[1].0, vec![item(0, false), item(2, true)]);
    }
}
