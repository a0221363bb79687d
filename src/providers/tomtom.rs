//! TomTom POI search (`/search/2/poiSearch/{query}.json`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use crate::config::PoiConfig;
use crate::models::Coordinate;
use crate::providers::{PoiResult, PoiSearch};

pub struct TomTomPoiSearch {
    client: reqwest::Client,
    config: PoiConfig,
}

impl TomTomPoiSearch {
    pub fn new(client: reqwest::Client, config: PoiConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, query: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .with_context(|| format!("Invalid POI base URL {}", self.config.base_url))?;
        let file = format!("{query}.json");
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("POI base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["search", "2", "poiSearch", file.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl PoiSearch for TomTomPoiSearch {
    fn name(&self) -> &'static str {
        "tomtom"
    }

    async fn search_nearby(&self, query: &str, center: Coordinate) -> Result<Vec<PoiResult>> {
        let url = self.endpoint(query)?;
        tracing::debug!("TomTom POI search: {url} around {center:?}");

        let params = [
            ("limit", self.config.result_limit.to_string()),
            ("lat", center.lat.to_string()),
            ("lon", center.lon.to_string()),
            ("countrySet", self.config.country.clone()),
            ("view", self.config.country.clone()),
            ("radius", self.config.radius_meters.to_string()),
            ("relatedPois", "off".to_string()),
        ];
        let key = self.config.api_key.as_deref().unwrap_or_default();

        let resp = self
            .client
            .get(url)
            .timeout(self.config.timeout())
            .query(&params)
            .query(&[("key", key)])
            .send()
            .await
            .context("Failed to reach TomTom POI search")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("TomTom POI search returned {status}: {body}");
        }

        let body: PoiSearchResponse = resp
            .json()
            .await
            .context("Failed to parse TomTom POI search response")?;

        Ok(body.into_results())
    }
}

// ─── Response types ────────────────────────────────────

#[derive(Deserialize)]
struct PoiSearchResponse {
    #[serde(default)]
    results: Vec<PoiSearchResult>,
}

#[derive(Deserialize)]
struct PoiSearchResult {
    #[serde(default)]
    poi: Option<PoiInfo>,
    position: LatLon,
}

#[derive(Deserialize)]
struct PoiInfo {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

impl PoiSearchResponse {
    /// Keep provider order; drop entries with an unusable position.
    fn into_results(self) -> Vec<PoiResult> {
        self.results
            .into_iter()
            .filter_map(|r| {
                Some(PoiResult {
                    name: r.poi.map(|p| p.name).unwrap_or_default(),
                    position: Coordinate::new(r.position.lat, r.position.lon)?,
                })
            })
            .collect()
    }
}
