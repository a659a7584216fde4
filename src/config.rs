use crate::errors::OptitreeError;
use serde::{Deserialize, Serialize};

/// Static parameters of a search, read by every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum depth of the produced tree. Zero yields a single leaf.
    pub max_depth: usize,
    /// Minimum number of rows each leaf must cover. Must be at least 1.
    pub min_support: usize,
    /// Wall-clock budget in seconds. When it runs out the search unwinds and
    /// reports its best-known answer with `proven_optimal = false`.
    #[serde(default)]
    pub time_limit: Option<f64>,
    /// Initial upper bound: only trees strictly better than this are
    /// searched for. `None` searches unconditionally.
    #[serde(default)]
    pub max_error: Option<f64>,
    /// With `max_error` set, stop the root expansion as soon as any tree
    /// beating the bound is found instead of proving optimality.
    #[serde(default)]
    pub stop_after_better: bool,
    /// Solve subproblems with two remaining levels by direct enumeration
    /// instead of recursion. Disabling this forces the general expansion
    /// everywhere; results are identical, only slower.
    #[serde(default = "default_use_depth_two")]
    pub use_depth_two: bool,
}

fn default_use_depth_two() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_depth: 2,
            min_support: 1,
            time_limit: None,
            max_error: None,
            stop_after_better: false,
            use_depth_two: true,
        }
    }
}

impl SearchConfig {
    /// Validate all parameters, returning the first offending one.
    pub fn validate(&self) -> Result<(), OptitreeError> {
        if self.min_support < 1 {
            return Err(OptitreeError::InvalidParameter(
                "min_support".to_string(),
                "a value of at least 1".to_string(),
                format!("{}", self.min_support),
            ));
        }
        if let Some(limit) = self.time_limit {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(OptitreeError::InvalidParameter(
                    "time_limit".to_string(),
                    "a finite positive number of seconds".to_string(),
                    format!("{}", limit),
                ));
            }
        }
        if let Some(bound) = self.max_error {
            if !bound.is_finite() || bound <= 0.0 {
                return Err(OptitreeError::InvalidParameter(
                    "max_error".to_string(),
                    "a finite positive bound".to_string(),
                    format!("{}", bound),
                ));
            }
        }
        Ok(())
    }
}
