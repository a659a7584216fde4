//! Objective strategies.
//!
//! The engine is objective-agnostic: all pruning, caching and combination
//! logic goes through the three operations defined here ([`Objective::leaf`],
//! [`Objective::combine`], [`Objective::better`]). A fourth, optional
//! operation ([`Objective::leaf_from_counts`]) computes a leaf from per-class
//! supports alone; the depth-two solver requires it and falls back to the
//! general recursion for objectives that cannot provide it.

use crate::cover::Cover;
use crate::data::Support;

/// Objective contribution of a single leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafValue {
    /// Value to minimize.
    pub value: f64,
    /// Predicted class, when the objective defines one.
    pub prediction: Option<usize>,
}

/// Scoring policy consulted at leaves. Lower values are better for every
/// variant; ties in the predicted class go to the lowest class index.
pub enum Objective<'a> {
    /// Misclassification count: covered rows minus the majority class.
    Error,
    /// Weighted misclassification: total covered weight minus the heaviest
    /// class. Equals `Error` when the database carries no weights.
    WeightedFrequency,
    /// User-supplied leaf scorer. Must return non-negative values; the
    /// search's lower bounds start at zero and additive pruning is unsound
    /// for objectives that can go negative.
    Custom(&'a dyn Fn(&Cover) -> f64),
}

impl Objective<'_> {
    /// Objective value and prediction of leaving `cover` as a leaf.
    pub fn leaf(&self, cover: &Cover) -> LeafValue {
        match self {
            Objective::Error => {
                let counts = cover.class_counts();
                let (prediction, majority) = argmax_first(counts.iter().map(|c| *c as f64));
                LeafValue {
                    value: cover.count() as f64 - majority,
                    prediction,
                }
            }
            Objective::WeightedFrequency => {
                let sums = cover.class_weights();
                let (prediction, heaviest) = argmax_first(sums.iter().copied());
                LeafValue {
                    value: sums.iter().sum::<f64>() - heaviest,
                    prediction,
                }
            }
            Objective::Custom(callback) => LeafValue {
                value: callback(cover),
                prediction: None,
            },
        }
    }

    /// Leaf value from per-class supports alone, when the variant can compute
    /// one. `None` means the full cover is required.
    pub fn leaf_from_counts(&self, counts: &[Support]) -> Option<LeafValue> {
        match self {
            Objective::Error => {
                let (prediction, majority) = argmax_first(counts.iter().map(|c| *c as f64));
                Some(LeafValue {
                    value: counts.iter().sum::<Support>() as f64 - majority,
                    prediction,
                })
            }
            Objective::WeightedFrequency | Objective::Custom(_) => None,
        }
    }

    /// Whether [`leaf_from_counts`](Self::leaf_from_counts) is available.
    pub fn supports_counts(&self) -> bool {
        matches!(self, Objective::Error)
    }

    /// Combine the values of two sibling subtrees.
    pub fn combine(&self, left: f64, right: f64) -> f64 {
        left + right
    }

    /// Whether `a` strictly improves on `b`.
    pub fn better(&self, a: f64, b: f64) -> bool {
        a < b
    }

    /// Variant name for logs and metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Objective::Error => "error",
            Objective::WeightedFrequency => "weighted_frequency",
            Objective::Custom(_) => "custom",
        }
    }
}

/// Index and value of the first maximum, or `(None, 0.0)` for no entries.
fn argmax_first(values: impl Iterator<Item = f64>) -> (Option<usize>, f64) {
    let mut best = f64::NEG_INFINITY;
    let mut at = None;
    for (index, value) in values.enumerate() {
        if value > best {
            best = value;
            at = Some(index);
        }
    }
    match at {
        Some(index) => (Some(index), best),
        None => (None, 0.0),
    }
}
