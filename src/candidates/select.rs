use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::candidates::tree::CandidateNode;
use crate::gazetteer::GazetteerIndex;
use crate::models::{Coordinate, LocationMention};
use crate::text::normalize;

/// Picks a candidate coordinate from the hierarchy using the mention's
/// district/state context. `None` sends the mention to direct geocoding.
pub trait CandidateSelector: Send + Sync {
    fn select(
        &self,
        tree: &CandidateNode,
        mention: &LocationMention,
        gazetteer: &GazetteerIndex,
    ) -> Option<Coordinate>;
}

/// Never yields a candidate: every mention goes to direct geocoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSelection;

impl CandidateSelector for NoSelection {
    fn select(&self, _: &CandidateNode, _: &LocationMention, _: &GazetteerIndex) -> Option<Coordinate> {
        None
    }
}

/// Scores each Office leaf by district match (+2) and state match (+1).
/// The first leaf with the highest positive score wins, provided its
/// gazetteer row has a coordinate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextSelector;

fn same_place(label: &str, declared: Option<&str>) -> bool {
    declared.is_some_and(|d| normalize(label).to_lowercase() == d.to_lowercase())
}

impl CandidateSelector for ContextSelector {
    fn select(
        &self,
        tree: &CandidateNode,
        mention: &LocationMention,
        gazetteer: &GazetteerIndex,
    ) -> Option<Coordinate> {
        let district = mention.district_name.as_deref();
        let state = mention.state_name.as_deref();

        let mut best: Option<(u8, Coordinate)> = None;
        for path in tree.paths() {
            let score = 2 * u8::from(same_place(path.district, district))
                + u8::from(same_place(path.state, state));
            if score == 0 {
                continue;
            }
            let Some(coordinate) = gazetteer.row(path.row).and_then(|r| r.coordinate) else {
                continue;
            };
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, coordinate));
            }
        }

        if let Some((score, coordinate)) = best {
            tracing::debug!(
                "Candidate for '{}' scored {score}: {:?}",
                mention.settlement_name,
                coordinate
            );
        }
        best.map(|(_, c)| c)
    }
}

/// Configured disambiguation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    #[default]
    None,
    Context,
}

impl SelectionStrategy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "none" => Some(Self::None),
            "context" => Some(Self::Context),
            _ => None,
        }
    }

    pub fn selector(self) -> Arc<dyn CandidateSelector> {
        match self {
            Self::None => Arc::new(NoSelection),
            Self::Context => Arc::new(ContextSelector),
        }
    }
}
