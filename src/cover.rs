//! Word-packed row masks.
//!
//! A [`Cover`] is the set of transactions still reachable at a search node.
//! Children are derived by intersecting with an attribute's bit-vector; the
//! parent is never mutated, so each recursion frame owns its cover and drops
//! it on return. Intersection is associative and commutative on the row set,
//! which is what makes the cache signature independent of branching order.

use crate::data::{Attribute, DataManager, Support, WORD_BITS};

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Set of rows reachable at a search node.
#[derive(Clone)]
pub struct Cover<'a> {
    words: Vec<u64>,
    count: Support,
    data: &'a DataManager,
}

impl<'a> Cover<'a> {
    /// Cover of the whole database (every row set).
    pub fn root(data: &'a DataManager) -> Self {
        let n_words = data.n_words();
        let mut words = vec![u64::MAX; n_words];
        let tail = data.n_rows() % WORD_BITS;
        if tail != 0 {
            words[n_words - 1] = (1u64 << tail) - 1;
        }
        Cover {
            words,
            count: data.n_rows(),
            data,
        }
    }

    /// Number of covered rows.
    pub fn count(&self) -> Support {
        self.count
    }

    /// The packed words of the mask. Tail bits beyond the row count are zero.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// New cover of the rows that are covered here *and* take the given
    /// branch of `attribute`.
    pub fn intersect(&self, attribute: Attribute, present: bool) -> Cover<'a> {
        let mask = self.data.attribute_words(attribute);
        let mut words = Vec::with_capacity(self.words.len());
        let mut count = 0;
        for (word, m) in self.words.iter().zip(mask) {
            // Tail bits stay clear: `word` never has them set.
            let w = if present { word & m } else { word & !m };
            count += w.count_ones() as Support;
            words.push(w);
        }
        Cover {
            words,
            count,
            data: self.data,
        }
    }

    /// Support of the child cover, without materializing it.
    pub fn intersect_count(&self, attribute: Attribute, present: bool) -> Support {
        let mask = self.data.attribute_words(attribute);
        self.words
            .iter()
            .zip(mask)
            .map(|(word, m)| {
                let w = if present { word & m } else { word & !m };
                w.count_ones() as Support
            })
            .sum()
    }

    /// Covered rows per class label.
    pub fn class_counts(&self) -> Vec<Support> {
        (0..self.data.n_classes())
            .map(|class| {
                self.words
                    .iter()
                    .zip(self.data.class_words(class))
                    .map(|(word, c)| (word & c).count_ones() as Support)
                    .sum()
            })
            .collect()
    }

    /// Per-class counts of the rows covered here that also have `attribute`
    /// set, without materializing the child cover.
    pub fn intersect_class_counts(&self, attribute: Attribute) -> Vec<Support> {
        let mask = self.data.attribute_words(attribute);
        (0..self.data.n_classes())
            .map(|class| {
                self.words
                    .iter()
                    .zip(mask)
                    .zip(self.data.class_words(class))
                    .map(|((word, m), c)| (word & m & c).count_ones() as Support)
                    .sum()
            })
            .collect()
    }

    /// Summed row weight per class label. Falls back to plain counts when the
    /// database carries no weights.
    pub fn class_weights(&self) -> Vec<f64> {
        match self.data.weights() {
            None => self.class_counts().iter().map(|c| *c as f64).collect(),
            Some(weights) => {
                let mut sums = vec![0.0; self.data.n_classes()];
                for (word_idx, word) in self.words.iter().enumerate() {
                    let mut w = *word;
                    while w != 0 {
                        let row = word_idx * WORD_BITS + w.trailing_zeros() as usize;
                        sums[self.data.label(row)] += weights[row];
                        w &= w - 1;
                    }
                }
                sums
            }
        }
    }

    /// Canonical FNV-1a hash of the covered row set.
    ///
    /// Two covers over the same database have equal signatures iff their row
    /// sets collide under FNV; [`same_rows`](Self::same_rows) gives the exact
    /// comparison used to resolve a suspected collision.
    pub fn signature(&self) -> u64 {
        let mut hash = FNV_OFFSET;
        for word in &self.words {
            hash ^= word;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    /// Exact row-set equality.
    pub fn same_rows(&self, other: &Cover) -> bool {
        self.words == other.words
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BoolMatrix;

    fn database() -> DataManager {
        // 70 rows so the mask spans two words. Attribute 0 is true on even
        // rows, attribute 1 on rows < 35, attribute 2 on multiples of 7.
        let rows = 70;
        let mut data = Vec::with_capacity(rows * 3);
        data.extend((0..rows).map(|i| i % 2 == 0));
        data.extend((0..rows).map(|i| i < 35));
        data.extend((0..rows).map(|i| i % 7 == 0));
        let labels: Vec<usize> = (0..rows).map(|i| usize::from(i % 3 == 0)).collect();
        let matrix = BoolMatrix::new(&data, rows, 3);
        DataManager::new(&matrix, &labels, None).unwrap()
    }

    #[test]
    fn test_root_and_intersect_counts() {
        let dm = database();
        let root = Cover::root(&dm);
        assert_eq!(root.count(), 70);

        let even = root.intersect(0, true);
        assert_eq!(even.count(), 35);
        let odd = root.intersect(0, false);
        assert_eq!(odd.count(), 35);
        assert_eq!(root.intersect_count(0, true), 35);

        let even_low = even.intersect(1, true);
        assert_eq!(even_low.count(), 18); // even rows below 35
        assert_eq!(even.intersect_count(1, true), 18);
    }

    #[test]
    fn test_class_counts_match_labels() {
        let dm = database();
        let root = Cover::root(&dm);
        let counts = root.class_counts();
        assert_eq!(counts, vec![46, 24]); // 24 multiples of 3 in 0..70
        assert_eq!(counts.iter().sum::<usize>(), root.count());

        let sevens = root.intersect(2, true);
        // multiples of 7 in 0..70: 0,7,...,63; of those 0,21,42,63 are %3==0
        assert_eq!(sevens.class_counts(), vec![6, 4]);
        assert_eq!(sevens.intersect_class_counts(0), root.intersect(2, true).intersect(0, true).class_counts());
    }

    #[test]
    fn test_intersection_is_order_independent() {
        let dm = database();
        let root = Cover::root(&dm);
        let a = root.intersect(0, true).intersect(1, false);
        let b = root.intersect(1, false).intersect(0, true);
        assert!(a.same_rows(&b));
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.count(), b.count());
    }

    #[test]
    fn test_child_is_subset_of_parent() {
        let dm = database();
        let root = Cover::root(&dm);
        let child = root.intersect(1, true);
        for (c, p) in child.words().iter().zip(root.words()) {
            assert_eq!(c & p, *c);
        }
    }

    #[test]
    fn test_signature_differs_for_different_row_sets() {
        let dm = database();
        let root = Cover::root(&dm);
        assert_ne!(root.signature(), root.intersect(0, true).signature());
    }

    #[test]
    fn test_weighted_class_sums() {
        let rows = 4;
        let data = vec![true, true, false, false];
        let labels = vec![0, 1, 0, 1];
        let weights = vec![0.5, 2.0, 1.0, 4.0];
        let matrix = BoolMatrix::new(&data, rows, 1);
        let dm = DataManager::new(&matrix, &labels, Some(&weights)).unwrap();
        let root = Cover::root(&dm);
        assert_eq!(root.class_weights(), vec![1.5, 6.0]);
        assert_eq!(root.intersect(0, true).class_weights(), vec![0.5, 2.0]);
    }
}
