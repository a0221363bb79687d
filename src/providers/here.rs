//! HERE free-text geocoding (`/v1/geocode?q=...`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::GeocoderConfig;
use crate::models::Coordinate;
use crate::providers::{GeocodeCandidate, Geocoder};

pub struct HereGeocoder {
    client: reqwest::Client,
    config: GeocoderConfig,
}

impl HereGeocoder {
    pub fn new(client: reqwest::Client, config: GeocoderConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Geocoder for HereGeocoder {
    fn name(&self) -> &'static str {
        "here"
    }

    async fn geocode(&self, query: &str) -> Result<Vec<GeocodeCandidate>> {
        let url = format!("{}/v1/geocode", self.config.base_url.trim_end_matches('/'));
        tracing::debug!("HERE geocode: {url}?q={query}");

        let key = self.config.api_key.as_deref().unwrap_or_default();

        let resp = self
            .client
            .get(&url)
            .timeout(self.config.timeout())
            .query(&[("q", query), ("apiKey", key)])
            .send()
            .await
            .context("Failed to reach HERE geocoder")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("HERE geocoder returned {status}: {body}");
        }

        let body: GeocodeResponse = resp
            .json()
            .await
            .context("Failed to parse HERE geocode response")?;

        Ok(body.into_candidates())
    }
}

// ─── Response types ────────────────────────────────────

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    items: Vec<GeocodeItem>,
}

#[derive(Deserialize)]
struct GeocodeItem {
    #[serde(default)]
    title: String,
    position: LatLng,
    #[serde(default)]
    scoring: Option<Scoring>,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scoring {
    #[serde(default)]
    query_score: f64,
}

impl GeocodeResponse {
    fn into_candidates(self) -> Vec<GeocodeCandidate> {
        self.items
            .into_iter()
            .filter_map(|item| {
                Some(GeocodeCandidate {
                    title: item.title,
                    position: Coordinate::new(item.position.lat, item.position.lng)?,
                    query_score: item.scoring.map(|s| s.query_score).unwrap_or(0.0),
                })
            })
            .collect()
    }
}
