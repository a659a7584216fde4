//! Errors
//!
//! Custom error types used throughout the `optitree` crate.
use thiserror::Error;

/// Errors that can occur while setting up or running a search.
///
/// Infeasible constraints and exhausted time limits are *not* errors: both are
/// expected outcomes of a bounded search and are reported through
/// [`SearchResult`](crate::search::SearchResult).
#[derive(Debug, Error)]
pub enum OptitreeError {
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// A memoized subproblem was reached through a path whose covered rows do
    /// not match the rows recorded when the entry was created. The cache
    /// soundness invariant was violated; the search must abort.
    #[error("Cache entry disagrees with its cover signature: {0:#018x} stored, {1:#018x} observed.")]
    CacheInconsistency(u64, u64),
}
