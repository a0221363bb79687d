//! Candidate hierarchy built from gazetteer matches, and the pluggable
//! step that turns it into a candidate coordinate.

pub mod select;
pub mod tree;

pub use select::{CandidateSelector, ContextSelector, NoSelection, SelectionStrategy};
pub use tree::{build_tree, CandidateNode, CandidatePath, NodeKind};
