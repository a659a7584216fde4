use crate::data::Attribute;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// One node of a decoded optimal tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Internal split: rows with the attribute unset go left, set go right.
    Split {
        attribute: Attribute,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    /// Terminal node with its objective contribution.
    Leaf { prediction: Option<usize>, error: f64 },
}

/// The optimal tree decoded from a finished search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub root: TreeNode,
}

impl Tree {
    /// Total number of nodes, leaves included.
    pub fn node_count(&self) -> usize {
        fn count(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + count(left) + count(right),
            }
        }
        count(&self.root)
    }

    /// Number of split levels on the longest path.
    pub fn depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        depth(&self.root)
    }

    /// Route one binarized row to its leaf and return the prediction.
    ///
    /// This traversal belongs to the classifier front end; it lives here so
    /// tests and benchmarks can consume the encoding directly.
    pub fn predict_row(&self, row: &[bool]) -> Option<usize> {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { prediction, .. } => return *prediction,
                TreeNode::Split { attribute, left, right } => {
                    node = if row[*attribute] { right } else { left };
                }
            }
        }
    }
}

impl Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TreeNode::Leaf { prediction, error } => match prediction {
                Some(class) => write!(f, "leaf={},error={}", class, error),
                None => write!(f, "leaf=?,error={}", error),
            },
            TreeNode::Split { attribute, left, right } => {
                write!(f, "[a{}? no:({}) yes:({})]", attribute, left, right)
            }
        }
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
