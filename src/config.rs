use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::candidates::SelectionStrategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Postal table (office name, district, state, pincode)
    pub pincode_file: PathBuf,
    /// Village table (settlement name, district, state)
    pub village_file: PathBuf,
    /// Keyed location store written after each run
    pub store_path: PathBuf,
    /// Hard cap on external provider calls per run
    pub max_external_calls: usize,
    /// Mentions resolved concurrently
    pub concurrency: usize,
    /// How a candidate coordinate is picked from gazetteer matches
    pub candidate_selection: SelectionStrategy,
    /// Nearby point-of-interest search provider
    pub poi: PoiConfig,
    /// Free-text geocoding provider
    pub geocoder: GeocoderConfig,
}

/// TomTom POI search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Country used as the region filter
    pub country: String,
    pub radius_meters: u32,
    pub result_limit: u32,
    /// Minimum delay between two calls to this provider
    pub min_delay_ms: u64,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

/// HERE geocoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub min_delay_ms: u64,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

impl Default for PoiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tomtom.com".to_string(),
            api_key: None,
            country: "IN".to_string(),
            radius_meters: 20_000,
            result_limit: 10,
            min_delay_ms: 250,
            timeout_secs: 10,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://geocode.search.hereapi.com".to_string(),
            api_key: None,
            min_delay_ms: 250,
            timeout_secs: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pincode_file: PathBuf::from("new_pincode.csv"),
            village_file: PathBuf::from("village_record.csv"),
            store_path: PathBuf::from("location_store.json"),
            max_external_calls: 1500,
            concurrency: 4,
            candidate_selection: SelectionStrategy::None,
            poi: PoiConfig::default(),
            geocoder: GeocoderConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("PLACE_RESOLVER_PINCODE_FILE") {
            config.pincode_file = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("PLACE_RESOLVER_VILLAGE_FILE") {
            config.village_file = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("PLACE_RESOLVER_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(v) = env_parse("PLACE_RESOLVER_MAX_EXTERNAL_CALLS") {
            config.max_external_calls = v;
        }
        if let Some(v) = env_parse::<usize>("PLACE_RESOLVER_CONCURRENCY") {
            config.concurrency = v.max(1);
        }
        if let Ok(raw) = std::env::var("PLACE_RESOLVER_CANDIDATE_SELECTION") {
            match SelectionStrategy::parse(&raw) {
                Some(strategy) => config.candidate_selection = strategy,
                None => tracing::warn!("Unknown candidate selection '{raw}', keeping default"),
            }
        }
        if let Ok(country) = std::env::var("PLACE_RESOLVER_COUNTRY") {
            config.poi.country = country;
        }

        // POI search provider
        if let Ok(url) = std::env::var("TOMTOM_BASE_URL") {
            config.poi.base_url = url;
        }
        if let Ok(key) = std::env::var("TOMTOM_API_KEY") {
            config.poi.api_key = Some(key);
        }
        if let Some(v) = env_parse("TOMTOM_MIN_DELAY_MS") {
            config.poi.min_delay_ms = v;
        }
        if let Some(v) = env_parse::<u64>("TOMTOM_TIMEOUT_SECS") {
            config.poi.timeout_secs = v.min(30);
        }
        if let Some(v) = env_parse("TOMTOM_RADIUS_METERS") {
            config.poi.radius_meters = v;
        }
        if let Some(v) = env_parse("TOMTOM_RESULT_LIMIT") {
            config.poi.result_limit = v;
        }

        // Geocoding provider
        if let Ok(url) = std::env::var("HERE_BASE_URL") {
            config.geocoder.base_url = url;
        }
        if let Ok(key) = std::env::var("HERE_API_KEY") {
            config.geocoder.api_key = Some(key);
        }
        if let Some(v) = env_parse("HERE_MIN_DELAY_MS") {
            config.geocoder.min_delay_ms = v;
        }
        if let Some(v) = env_parse::<u64>("HERE_TIMEOUT_SECS") {
            config.geocoder.timeout_secs = v.min(30);
        }

        config
    }
}

impl PoiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.min(30))
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.min(30))
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }
}
