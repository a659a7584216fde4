use crate::errors::OptitreeError;

/// Index of a splitting attribute (a boolean column of the dataset).
pub type Attribute = usize;

/// Number of transactions covered by a node or a side of a split.
pub type Support = usize;

/// Bits per storage word of the packed row masks.
pub const WORD_BITS: usize = 64;

/// Contiguous Column Major boolean matrix view.
///
/// Borrowed, not owned: the caller keeps the flat `data` slice alive for the
/// lifetime of the view. Column-major order keeps each attribute contiguous,
/// which is the access pattern used when packing attribute bit-vectors.
pub struct BoolMatrix<'a> {
    /// The raw data stored in a single slice.
    pub data: &'a [bool],
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
}

impl<'a> BoolMatrix<'a> {
    /// Create a new BoolMatrix.
    pub fn new(data: &'a [bool], rows: usize, cols: usize) -> Self {
        BoolMatrix { data, rows, cols }
    }

    /// Get a single item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> bool {
        self.data[j * self.rows + i]
    }

    /// Get a column of the matrix as a slice.
    pub fn get_col(&self, col: usize) -> &[bool] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }
}

/// Immutable owner of the binarized transaction database.
///
/// Holds, word-packed, one bit-vector per attribute (rows where the attribute
/// is 1) and one per class (rows carrying that label), plus optional per-row
/// weights for the weighted-frequency objective. Built once before a search
/// and read-only afterwards; every [`Cover`](crate::cover::Cover) borrows it.
pub struct DataManager {
    n_rows: usize,
    n_attributes: usize,
    n_classes: usize,
    labels: Vec<usize>,
    attribute_words: Vec<Vec<u64>>,
    class_words: Vec<Vec<u64>>,
    weights: Option<Vec<f64>>,
}

impl DataManager {
    /// Build the packed database from a binarized matrix and its labels.
    ///
    /// * `data` - rows × attributes boolean matrix.
    /// * `labels` - one class label per row; classes are `0..=max(labels)`.
    /// * `weights` - optional per-row weights, finite and non-negative.
    pub fn new(data: &BoolMatrix, labels: &[usize], weights: Option<&[f64]>) -> Result<Self, OptitreeError> {
        if data.rows == 0 || data.cols == 0 {
            return Err(OptitreeError::InvalidParameter(
                "data".to_string(),
                "a non-empty matrix".to_string(),
                format!("{} rows x {} columns", data.rows, data.cols),
            ));
        }
        if labels.len() != data.rows {
            return Err(OptitreeError::InvalidParameter(
                "labels".to_string(),
                format!("{} values", data.rows),
                format!("{} values", labels.len()),
            ));
        }
        if let Some(w) = weights {
            if w.len() != data.rows {
                return Err(OptitreeError::InvalidParameter(
                    "weights".to_string(),
                    format!("{} values", data.rows),
                    format!("{} values", w.len()),
                ));
            }
            if let Some(bad) = w.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(OptitreeError::InvalidParameter(
                    "weights".to_string(),
                    "finite non-negative values".to_string(),
                    format!("{}", bad),
                ));
            }
        }

        let n_rows = data.rows;
        let n_attributes = data.cols;
        let n_classes = labels.iter().max().map_or(0, |m| m + 1);
        let n_words = n_rows.div_ceil(WORD_BITS);

        let mut attribute_words = vec![vec![0u64; n_words]; n_attributes];
        for (attribute, words) in attribute_words.iter_mut().enumerate() {
            for (row, value) in data.get_col(attribute).iter().enumerate() {
                if *value {
                    words[row / WORD_BITS] |= 1u64 << (row % WORD_BITS);
                }
            }
        }

        let mut class_words = vec![vec![0u64; n_words]; n_classes];
        for (row, label) in labels.iter().enumerate() {
            class_words[*label][row / WORD_BITS] |= 1u64 << (row % WORD_BITS);
        }

        Ok(DataManager {
            n_rows,
            n_attributes,
            n_classes,
            labels: labels.to_vec(),
            attribute_words,
            class_words,
            weights: weights.map(|w| w.to_vec()),
        })
    }

    /// Number of transactions in the database.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of boolean attributes.
    pub fn n_attributes(&self) -> usize {
        self.n_attributes
    }

    /// Number of distinct class labels.
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Number of storage words per packed bit-vector.
    pub fn n_words(&self) -> usize {
        self.n_rows.div_ceil(WORD_BITS)
    }

    /// Class label of a single row.
    pub fn label(&self, row: usize) -> usize {
        self.labels[row]
    }

    /// Packed rows where `attribute` is 1.
    pub fn attribute_words(&self, attribute: Attribute) -> &[u64] {
        &self.attribute_words[attribute]
    }

    /// Packed rows labelled with `class`.
    pub fn class_words(&self, class: usize) -> &[u64] {
        &self.class_words[class]
    }

    /// Optional per-row weights.
    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> (Vec<bool>, Vec<usize>) {
        // 5 rows, 2 attributes, column-major.
        let data = vec![
            true, false, true, false, true, // attribute 0
            true, true, false, false, false, // attribute 1
        ];
        let labels = vec![0, 1, 0, 1, 1];
        (data, labels)
    }

    #[test]
    fn test_packing() {
        let (data, labels) = toy();
        let matrix = BoolMatrix::new(&data, 5, 2);
        let dm = DataManager::new(&matrix, &labels, None).unwrap();
        assert_eq!(dm.n_rows(), 5);
        assert_eq!(dm.n_attributes(), 2);
        assert_eq!(dm.n_classes(), 2);
        assert_eq!(dm.n_words(), 1);
        assert_eq!(dm.attribute_words(0), &[0b10101]);
        assert_eq!(dm.attribute_words(1), &[0b00011]);
        assert_eq!(dm.class_words(0), &[0b00101]);
        assert_eq!(dm.class_words(1), &[0b11010]);
    }

    #[test]
    fn test_multi_word_packing() {
        // 70 rows of a single all-true attribute spans two words.
        let data = vec![true; 70];
        let labels = vec![0; 70];
        let matrix = BoolMatrix::new(&data, 70, 1);
        let dm = DataManager::new(&matrix, &labels, None).unwrap();
        assert_eq!(dm.n_words(), 2);
        assert_eq!(dm.attribute_words(0)[0], u64::MAX);
        assert_eq!(dm.attribute_words(0)[1], (1u64 << 6) - 1);
    }

    #[test]
    fn test_label_mismatch_rejected() {
        let (data, _) = toy();
        let matrix = BoolMatrix::new(&data, 5, 2);
        assert!(DataManager::new(&matrix, &[0, 1], None).is_err());
    }

    #[test]
    fn test_bad_weights_rejected() {
        let (data, labels) = toy();
        let matrix = BoolMatrix::new(&data, 5, 2);
        let weights = vec![1.0, 1.0, f64::NAN, 1.0, 1.0];
        assert!(DataManager::new(&matrix, &labels, Some(&weights)).is_err());
        let weights = vec![1.0, -1.0, 1.0, 1.0, 1.0];
        assert!(DataManager::new(&matrix, &labels, Some(&weights)).is_err());
    }
}
