mod depth_two;

// Modules
pub mod config;
pub mod cover;
pub mod data;
pub mod errors;
pub mod objective;
pub mod search;
pub mod tree;
pub mod trie;

// Individual classes, and functions
pub use config::SearchConfig;
pub use data::{BoolMatrix, DataManager};
pub use errors::OptitreeError;
pub use objective::Objective;
pub use search::{SearchResult, TreeSearch};
pub use tree::{Tree, TreeNode};
