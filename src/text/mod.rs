//! String handling shared by gazetteer lookup and POI ranking.

pub mod normalize;
pub mod similarity;

pub use normalize::{normalize, normalize_mention};
pub use similarity::{is_subsequence, similarity_ratio};
