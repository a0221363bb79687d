//! Per-mention fallback chain:
//!
//! ```text
//!   Start ──► GazetteerLookup ──(no rows / no candidate)──► DirectGeocode ──► Done
//!                   │                                             │
//!                   └──(candidate coordinate)──► Refine ──────────┴──────────► Done
//! ```
//!
//! Refine falls back to the gazetteer candidate when the POI search fails or
//! returns nothing. DirectGeocode failures end as `geocode_failed`.

pub mod context;
pub mod summary;

use std::sync::Arc;

use crate::candidates::{build_tree, CandidateSelector, NoSelection};
use crate::config::Config;
use crate::error::ResolveError;
use crate::gazetteer::GazetteerIndex;
use crate::models::{
    Coordinate, LocationMention, MentionId, PendingMention, ResolutionResult, ResolutionSource,
    UnresolvedReason,
};
use crate::providers::{GeocodeCandidate, Geocoder, HereGeocoder, PoiResult, PoiSearch, TomTomPoiSearch};
use crate::text::{normalize_mention, similarity_ratio};

pub use context::{CallBudget, CancelToken, ResolutionContext, Throttle};
pub use summary::RunSummary;

/// Resolves mentions against a shared gazetteer and the external providers.
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct Resolver {
    gazetteer: Arc<GazetteerIndex>,
    poi: Arc<dyn PoiSearch>,
    geocoder: Arc<dyn Geocoder>,
    selector: Arc<dyn CandidateSelector>,
}

impl Resolver {
    /// Resolver with the default selector, which never yields a candidate.
    pub fn new(
        gazetteer: Arc<GazetteerIndex>,
        poi: Arc<dyn PoiSearch>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        Self {
            gazetteer,
            poi,
            geocoder,
            selector: Arc::new(NoSelection),
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn CandidateSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Wire up the HTTP providers described by `config`.
    pub fn from_config(
        config: &Config,
        gazetteer: Arc<GazetteerIndex>,
        client: reqwest::Client,
    ) -> Self {
        let poi = TomTomPoiSearch::new(client.clone(), config.poi.clone());
        let geocoder = HereGeocoder::new(client, config.geocoder.clone());
        Self::new(gazetteer, Arc::new(poi), Arc::new(geocoder))
            .with_selector(config.candidate_selection.selector())
    }

    /// Resolve one mention. Never fails: every error is folded into an
    /// `Unresolved` outcome at this boundary.
    pub async fn resolve(&self, mention: &LocationMention, ctx: &ResolutionContext) -> ResolutionResult {
        match self.try_resolve(mention, ctx).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Error processing '{}': {e}", mention.settlement_name);
                ResolutionResult::unresolved(UnresolvedReason::ProcessingError)
            }
        }
    }

    async fn try_resolve(
        &self,
        mention: &LocationMention,
        ctx: &ResolutionContext,
    ) -> Result<ResolutionResult, ResolveError> {
        if ctx.cancel.is_cancelled() {
            return Ok(ResolutionResult::unresolved(UnresolvedReason::Cancelled));
        }

        let mention = normalize_mention(mention);
        // The settlement name is required. A name that normalizes to nothing
        // (e.g. "Village") is rejected as processing_error with no request
        // sent, rather than geocoding from district and state alone.
        if mention.settlement_name.is_empty() {
            return Err(ResolveError::InvalidMention(
                "settlement name is empty after normalization".to_string(),
            ));
        }

        match self.candidate(&mention) {
            Some(candidate) => self.refine(&mention, candidate, ctx).await,
            None => self.direct_geocode(&mention, ctx).await,
        }
    }

    /// Gazetteer lookup and hierarchy disambiguation.
    fn candidate(&self, mention: &LocationMention) -> Option<Coordinate> {
        let rows = self.gazetteer.find_by_name(&mention.settlement_name);
        if rows.is_empty() {
            tracing::debug!("No gazetteer rows for '{}'", mention.settlement_name);
            return None;
        }

        let tree = build_tree(mention, rows);
        tracing::debug!(
            "Candidate tree for '{}' has {} leaves",
            mention.settlement_name,
            tree.leaf_count()
        );
        self.selector.select(&tree, mention, &self.gazetteer)
    }

    async fn refine(
        &self,
        mention: &LocationMention,
        candidate: Coordinate,
        ctx: &ResolutionContext,
    ) -> Result<ResolutionResult, ResolveError> {
        let query = &mention.settlement_name;
        let request = self.poi.search_nearby(query, candidate);

        let results = match ctx.call(self.poi.name(), &ctx.poi_throttle, request).await {
            Ok(results) => results,
            Err(ResolveError::ProviderUnavailable { provider, reason }) => {
                tracing::warn!("{provider} failed for '{query}', keeping gazetteer candidate: {reason}");
                Vec::new()
            }
            Err(e) => return external_outcome(e),
        };

        Ok(match best_poi(query, &results) {
            Some(poi) => ResolutionResult::resolved(poi.position, ResolutionSource::PoiRefinement),
            None => ResolutionResult::resolved(candidate, ResolutionSource::Gazetteer),
        })
    }

    async fn direct_geocode(
        &self,
        mention: &LocationMention,
        ctx: &ResolutionContext,
    ) -> Result<ResolutionResult, ResolveError> {
        let query = geocode_query(mention);
        let request = self.geocoder.geocode(&query);

        let candidates = match ctx.call(self.geocoder.name(), &ctx.geocode_throttle, request).await {
            Ok(candidates) => candidates,
            Err(ResolveError::ProviderUnavailable { provider, reason }) => {
                tracing::warn!("{provider} failed for '{query}': {reason}");
                Vec::new()
            }
            Err(e) => return external_outcome(e),
        };

        Ok(match best_geocode(&candidates) {
            Some(best) => ResolutionResult::resolved(best.position, ResolutionSource::DirectGeocode),
            None => ResolutionResult::unresolved(UnresolvedReason::GeocodeFailed),
        })
    }

    /// Resolve a batch with at most `concurrency` mentions in flight.
    ///
    /// Returns exactly one outcome per input, tagged with its [`MentionId`].
    /// A worker that panics yields `processing_error` for its mention only.
    pub async fn resolve_batch(
        &self,
        mentions: Vec<PendingMention>,
        ctx: &ResolutionContext,
        concurrency: usize,
    ) -> Vec<(MentionId, ResolutionResult)> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::with_capacity(mentions.len());

        for pending in mentions {
            let resolver = self.clone();
            let ctx = ctx.clone();
            let sem = semaphore.clone();
            let id = pending.id.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await;
                resolver.resolve(&pending.mention, &ctx).await
            });
            handles.push((id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let result = handle.await.unwrap_or_else(|e| {
                tracing::error!("Resolution task for {id} failed: {e}");
                ResolutionResult::unresolved(UnresolvedReason::ProcessingError)
            });
            results.push((id, result));
        }
        results
    }
}

/// Outcome for an external call that was never sent.
fn external_outcome(err: ResolveError) -> Result<ResolutionResult, ResolveError> {
    match err {
        ResolveError::RateLimitExceeded => {
            Ok(ResolutionResult::unresolved(UnresolvedReason::RateLimited))
        }
        ResolveError::Cancelled => Ok(ResolutionResult::unresolved(UnresolvedReason::Cancelled)),
        other => Err(other),
    }
}

/// Free-text query from the most specific combination of available fields:
/// settlement, district, pincode and state, in that order.
pub fn geocode_query(mention: &LocationMention) -> String {
    [
        Some(mention.settlement_name.as_str()),
        mention.district_name.as_deref(),
        mention.pincode.as_deref(),
        mention.state_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// POI whose name is most similar to `settlement`. First maximum wins.
pub fn best_poi<'a>(settlement: &str, results: &'a [PoiResult]) -> Option<&'a PoiResult> {
    let target = settlement.to_lowercase();
    let mut best: Option<(f64, &PoiResult)> = None;
    for poi in results {
        let score = similarity_ratio(&target, &poi.name.to_lowercase());
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, poi));
        }
    }
    best.map(|(_, poi)| poi)
}

/// Geocode candidate with the highest `query_score`. First maximum wins.
pub fn best_geocode(candidates: &[GeocodeCandidate]) -> Option<&GeocodeCandidate> {
    let mut best: Option<&GeocodeCandidate> = None;
    for candidate in candidates {
        if best.map_or(true, |b| candidate.query_score > b.query_score) {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::ContextSelector;
    use crate::gazetteer::tests::row;
    use crate::gazetteer::GazetteerRow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    enum Reply<T> {
        Ok(Vec<T>),
        Fail,
        Hang,
        Panic,
    }

    struct FakePoi {
        reply: Reply<PoiResult>,
        calls: AtomicUsize,
    }

    struct FakeGeocoder {
        reply: Reply<GeocodeCandidate>,
        calls: AtomicUsize,
    }

    async fn answer<T: Clone>(reply: &Reply<T>) -> anyhow::Result<Vec<T>> {
        match reply {
            Reply::Ok(items) => Ok(items.clone()),
            Reply::Fail => anyhow::bail!("provider returned 500 Internal Server Error"),
            Reply::Hang => std::future::pending().await,
            Reply::Panic => panic!("provider blew up"),
        }
    }

    #[async_trait]
    impl PoiSearch for FakePoi {
        fn name(&self) -> &'static str {
            "fake-poi"
        }

        async fn search_nearby(&self, _: &str, _: Coordinate) -> anyhow::Result<Vec<PoiResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            answer(&self.reply).await
        }
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        fn name(&self) -> &'static str {
            "fake-geocoder"
        }

        async fn geocode(&self, _: &str) -> anyhow::Result<Vec<GeocodeCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            answer(&self.reply).await
        }
    }

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn poi(name: &str, lat: f64, lon: f64) -> PoiResult {
        PoiResult {
            name: name.to_string(),
            position: coord(lat, lon),
        }
    }

    fn candidate(score: f64, lat: f64, lon: f64) -> GeocodeCandidate {
        GeocodeCandidate {
            title: format!("candidate {score}"),
            position: coord(lat, lon),
            query_score: score,
        }
    }

    fn kochi_row() -> GazetteerRow {
        GazetteerRow {
            coordinate: Some(coord(9.9312, 76.2673)),
            ..row("Kochi Town", "Ernakulam", "Kerala")
        }
    }

    struct Harness {
        resolver: Resolver,
        poi: Arc<FakePoi>,
        geocoder: Arc<FakeGeocoder>,
    }

    fn harness(
        rows: Vec<GazetteerRow>,
        poi_reply: Reply<PoiResult>,
        geocode_reply: Reply<GeocodeCandidate>,
    ) -> Harness {
        let poi = Arc::new(FakePoi {
            reply: poi_reply,
            calls: AtomicUsize::new(0),
        });
        let geocoder = Arc::new(FakeGeocoder {
            reply: geocode_reply,
            calls: AtomicUsize::new(0),
        });
        let resolver = Resolver::new(
            Arc::new(GazetteerIndex::from_rows(rows)),
            poi.clone(),
            geocoder.clone(),
        )
        .with_selector(Arc::new(ContextSelector));
        Harness {
            resolver,
            poi,
            geocoder,
        }
    }

    fn ctx(budget: usize) -> ResolutionContext {
        ResolutionContext::new(budget, Duration::ZERO, Duration::ZERO)
    }

    fn kochi() -> LocationMention {
        LocationMention::new("Kochi Town")
            .with_district("Ernakulam District")
            .with_state("Kerala")
    }

    #[test]
    fn test_geocode_query_forms() {
        let m = LocationMention::new("Meppadi")
            .with_district("Wayanad")
            .with_state("Kerala");
        assert_eq!(geocode_query(&m), "Meppadi Wayanad Kerala");

        let m = m.with_pincode("673577");
        assert_eq!(geocode_query(&m), "Meppadi Wayanad 673577 Kerala");

        let m = LocationMention::new("Meppadi").with_state("Kerala");
        assert_eq!(geocode_query(&m), "Meppadi Kerala");

        let m = LocationMention::new("Meppadi")
            .with_pincode("673577")
            .with_state("Kerala");
        assert_eq!(geocode_query(&m), "Meppadi 673577 Kerala");
    }

    #[test]
    fn test_best_poi_first_maximum_wins() {
        let results = vec![
            poi("Kochi", 1.0, 1.0),
            poi("kochi", 2.0, 2.0),
            poi("Kochi Port", 3.0, 3.0),
        ];
        let best = best_poi("kochi", &results).unwrap();
        assert_eq!(best.position, coord(1.0, 1.0));
        assert!(best_poi("kochi", &[]).is_none());
    }

    #[test]
    fn test_best_geocode_highest_score() {
        let candidates = vec![candidate(0.6, 1.0, 1.0), candidate(0.9, 2.0, 2.0), candidate(0.9, 3.0, 3.0)];
        assert_eq!(best_geocode(&candidates).unwrap().position, coord(2.0, 2.0));
    }

    #[tokio::test]
    async fn test_no_gazetteer_rows_goes_to_direct_geocode() {
        let h = harness(
            vec![],
            Reply::Fail,
            Reply::Ok(vec![candidate(0.6, 11.0, 76.0), candidate(0.9, 11.5, 76.1)]),
        );
        let result = h.resolver.resolve(&kochi(), &ctx(10)).await;
        assert_eq!(
            result,
            ResolutionResult::resolved(coord(11.5, 76.1), ResolutionSource::DirectGeocode)
        );
        assert_eq!(h.poi.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_default_selector_always_direct_geocodes() {
        let h = harness(vec![kochi_row()], Reply::Fail, Reply::Ok(vec![candidate(0.8, 10.0, 76.0)]));
        let resolver = h.resolver.clone().with_selector(Arc::new(NoSelection));
        let result = resolver.resolve(&kochi(), &ctx(10)).await;
        assert_eq!(
            result,
            ResolutionResult::resolved(coord(10.0, 76.0), ResolutionSource::DirectGeocode)
        );
        assert_eq!(h.poi.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refine_picks_most_similar_poi() {
        let h = harness(
            vec![kochi_row()],
            Reply::Ok(vec![
                poi("Ernakulam Junction", 9.97, 76.29),
                poi("Kochi", 9.96, 76.24),
            ]),
            Reply::Fail,
        );
        let result = h.resolver.resolve(&kochi(), &ctx(10)).await;
        assert_eq!(
            result,
            ResolutionResult::resolved(coord(9.96, 76.24), ResolutionSource::PoiRefinement)
        );
        assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refine_failure_falls_back_to_candidate() {
        let h = harness(vec![kochi_row()], Reply::Fail, Reply::Fail);
        let result = h.resolver.resolve(&kochi(), &ctx(10)).await;
        assert_eq!(
            result,
            ResolutionResult::resolved(coord(9.9312, 76.2673), ResolutionSource::Gazetteer)
        );
    }

    #[tokio::test]
    async fn test_refine_empty_results_falls_back_to_candidate() {
        let h = harness(vec![kochi_row()], Reply::Ok(vec![]), Reply::Fail);
        let result = h.resolver.resolve(&kochi(), &ctx(10)).await;
        assert_eq!(
            result,
            ResolutionResult::resolved(coord(9.9312, 76.2673), ResolutionSource::Gazetteer)
        );
    }

    #[tokio::test]
    async fn test_geocode_empty_is_unresolved() {
        let h = harness(vec![], Reply::Fail, Reply::Ok(vec![]));
        let result = h.resolver.resolve(&kochi(), &ctx(10)).await;
        assert_eq!(result, ResolutionResult::unresolved(UnresolvedReason::GeocodeFailed));
    }

    #[tokio::test]
    async fn test_geocode_failure_is_unresolved() {
        let h = harness(vec![], Reply::Fail, Reply::Fail);
        let result = h.resolver.resolve(&kochi(), &ctx(10)).await;
        assert_eq!(result, ResolutionResult::unresolved(UnresolvedReason::GeocodeFailed));
    }

    #[tokio::test]
    async fn test_zero_budget_rate_limits_without_calls() {
        let h = harness(
            vec![kochi_row()],
            Reply::Ok(vec![poi("Kochi", 1.0, 1.0)]),
            Reply::Ok(vec![candidate(0.9, 1.0, 1.0)]),
        );
        let ctx = ctx(0);
        let refine = h.resolver.resolve(&kochi(), &ctx).await;
        let direct = h.resolver.resolve(&LocationMention::new("Meppadi"), &ctx).await;

        let limited = ResolutionResult::unresolved(UnresolvedReason::RateLimited);
        assert_eq!(refine, limited);
        assert_eq!(direct, limited);
        assert_eq!(h.poi.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_settlement_is_processing_error() {
        let h = harness(vec![], Reply::Fail, Reply::Ok(vec![candidate(0.9, 1.0, 1.0)]));
        let result = h.resolver.resolve(&LocationMention::new("Village"), &ctx(10)).await;
        assert_eq!(result, ResolutionResult::unresolved(UnresolvedReason::ProcessingError));
        assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_mentions() {
        let h = harness(vec![], Reply::Fail, Reply::Ok(vec![candidate(0.9, 1.0, 1.0)]));
        let ctx = ctx(10);
        ctx.cancel.cancel();
        let result = h.resolver.resolve(&kochi(), &ctx).await;
        assert_eq!(result, ResolutionResult::unresolved(UnresolvedReason::Cancelled));
        assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_in_flight_refine_cancel_falls_back() {
        let h = harness(vec![kochi_row()], Reply::Hang, Reply::Fail);
        let ctx = ctx(10);
        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });
        let result = h.resolver.resolve(&kochi(), &ctx).await;
        assert_eq!(
            result,
            ResolutionResult::resolved(coord(9.9312, 76.2673), ResolutionSource::Gazetteer)
        );
    }

    #[tokio::test]
    async fn test_batch_isolates_panicking_worker() {
        let h = harness(vec![kochi_row()], Reply::Panic, Reply::Ok(vec![candidate(0.7, 11.0, 76.0)]));
        let pending = vec![
            PendingMention {
                id: MentionId {
                    document_index: 0,
                    document_id: "doc-a".to_string(),
                    mention_index: 0,
                },
                mention: kochi(),
                published: None,
            },
            PendingMention {
                id: MentionId {
                    document_index: 0,
                    document_id: "doc-b".to_string(),
                    mention_index: 3,
                },
                mention: LocationMention::new("Meppadi"),
                published: None,
            },
        ];

        let results = h.resolver.resolve_batch(pending, &ctx(10), 2).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.document_id, "doc-a");
        assert_eq!(
            results[0].1,
            ResolutionResult::unresolved(UnresolvedReason::ProcessingError)
        );
        assert_eq!(results[1].0.mention_index, 3);
        assert_eq!(
            results[1].1,
            ResolutionResult::resolved(coord(11.0, 76.0), ResolutionSource::DirectGeocode)
        );
    }

    #[tokio::test]
    async fn test_batch_budget_shared_across_workers() {
        let h = harness(vec![], Reply::Fail, Reply::Ok(vec![candidate(0.7, 11.0, 76.0)]));
        let pending: Vec<PendingMention> = (0..6)
            .map(|i| PendingMention {
                id: MentionId {
                    document_index: 0,
                    document_id: "doc".to_string(),
                    mention_index: i,
                },
                mention: LocationMention::new(format!("Place {i}")),
                published: None,
            })
            .collect();

        let results = h.resolver.resolve_batch(pending, &ctx(4), 3).await;
        let summary = RunSummary::tally(&results);
        assert_eq!(summary.total, 6);
        assert_eq!(summary.direct_geocode, 4);
        assert_eq!(summary.rate_limited, 2);
        assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 4);
    }
}
