//! External lookup providers used by the fallback chain. Both are
//! HTTP GET services; any transport error or non-2xx status is a provider
//! failure that the chain recovers from locally.

pub mod here;
pub mod tomtom;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Coordinate;

pub use here::HereGeocoder;
pub use tomtom::TomTomPoiSearch;

/// A point of interest returned by a nearby search, in provider order.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiResult {
    pub name: String,
    pub position: Coordinate,
}

/// A free-text geocoding candidate with the provider's relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeCandidate {
    pub title: String,
    pub position: Coordinate,
    pub query_score: f64,
}

/// Nearby point-of-interest search around a known coordinate.
#[async_trait]
pub trait PoiSearch: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search_nearby(&self, query: &str, center: Coordinate) -> Result<Vec<PoiResult>>;
}

/// Free-text geocoding.
#[async_trait]
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn geocode(&self, query: &str) -> Result<Vec<GeocodeCandidate>>;
}
