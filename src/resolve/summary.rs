use serde::Serialize;

use crate::models::{MentionId, ResolutionResult, ResolutionSource, UnresolvedReason};

/// Outcome counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub gazetteer: usize,
    pub poi_refinement: usize,
    pub direct_geocode: usize,
    pub geocode_failed: usize,
    pub rate_limited: usize,
    pub cancelled: usize,
    pub processing_error: usize,
}

impl RunSummary {
    pub fn tally(results: &[(MentionId, ResolutionResult)]) -> Self {
        let mut summary = Self::default();
        for (_, result) in results {
            summary.total += 1;
            let slot = match result {
                ResolutionResult::Resolved { source, .. } => match source {
                    ResolutionSource::Gazetteer => &mut summary.gazetteer,
                    ResolutionSource::PoiRefinement => &mut summary.poi_refinement,
                    ResolutionSource::DirectGeocode => &mut summary.direct_geocode,
                },
                ResolutionResult::Unresolved { reason } => match reason {
                    UnresolvedReason::GeocodeFailed => &mut summary.geocode_failed,
                    UnresolvedReason::RateLimited => &mut summary.rate_limited,
                    UnresolvedReason::Cancelled => &mut summary.cancelled,
                    UnresolvedReason::ProcessingError => &mut summary.processing_error,
                },
            };
            *slot += 1;
        }
        summary
    }

    pub fn resolved(&self) -> usize {
        self.gazetteer + self.poi_refinement + self.direct_geocode
    }

    pub fn log(&self) {
        tracing::info!(
            "Resolved {}/{} mentions (gazetteer {}, poi {}, geocode {}); unresolved: \
             geocode_failed {}, rate_limited {}, cancelled {}, processing_error {}",
            self.resolved(),
            self.total,
            self.gazetteer,
            self.poi_refinement,
            self.direct_geocode,
            self.geocode_failed,
            self.rate_limited,
            self.cancelled,
            self.processing_error
        );
    }
}
