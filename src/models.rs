use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A resolved position. Absence is modelled with `Option<Coordinate>`,
/// never with NaN components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting non-finite or out-of-range components.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementKind {
    Village,
    Town,
    #[serde(other)]
    Unknown,
}

impl SettlementKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "village" => Self::Village,
            "town" => Self::Town,
            _ => Self::Unknown,
        }
    }
}

/// One extracted place reference, keyed the way the extraction step emits it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationMention {
    #[serde(
        rename = "village_name/town_name",
        default,
        deserialize_with = "string_or_empty"
    )]
    pub settlement_name: String,
    #[serde(
        rename = "village/town",
        default,
        deserialize_with = "settlement_kind",
        skip_serializing_if = "Option::is_none"
    )]
    pub settlement_kind: Option<SettlementKind>,
    #[serde(
        default,
        deserialize_with = "opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub area_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub district_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub state_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub pincode: Option<String>,
    #[serde(
        rename = "nearby",
        default,
        deserialize_with = "opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub nearby_hint: Option<String>,
}

impl LocationMention {
    pub fn new(settlement_name: impl Into<String>) -> Self {
        Self {
            settlement_name: settlement_name.into(),
            ..Self::default()
        }
    }

    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district_name = Some(district.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state_name = Some(state.into());
        self
    }

    pub fn with_pincode(mut self, pincode: impl Into<String>) -> Self {
        self.pincode = Some(pincode.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Gazetteer,
    PoiRefinement,
    DirectGeocode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    GeocodeFailed,
    RateLimited,
    Cancelled,
    ProcessingError,
}

/// Final outcome for one mention. Created once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionResult {
    Resolved {
        coordinate: Coordinate,
        source: ResolutionSource,
    },
    Unresolved {
        reason: UnresolvedReason,
    },
}

impl ResolutionResult {
    pub fn resolved(coordinate: Coordinate, source: ResolutionSource) -> Self {
        Self::Resolved { coordinate, source }
    }

    pub fn unresolved(reason: UnresolvedReason) -> Self {
        Self::Unresolved { reason }
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Self::Resolved { coordinate, .. } => Some(*coordinate),
            Self::Unresolved { .. } => None,
        }
    }
}

/// Identity of a mention within one batch: the source document's position
/// in the batch plus the mention's position in that document's location
/// list. Links may repeat or be empty across a batch, so `document_id` alone
/// does not identify a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MentionId {
    pub document_index: usize,
    /// Source document link.
    pub document_id: String,
    pub mention_index: usize,
}

impl fmt::Display for MentionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.document_id.is_empty() {
            write!(f, "document {}#{}", self.document_index, self.mention_index)
        } else {
            write!(f, "{}#{}", self.document_id, self.mention_index)
        }
    }
}

/// A mention awaiting resolution, carrying what the sinks need to persist it.
#[derive(Debug, Clone)]
pub struct PendingMention {
    pub id: MentionId,
    pub mention: LocationMention,
    pub published: Option<String>,
}

// ─── Upstream document envelope ──────────────────────────

/// A source article as produced by the extraction step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(
        rename = "landslide_record",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub record: Option<ExtractedRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(
        rename = "landslide_report",
        default,
        deserialize_with = "opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub report: Option<String>,
    #[serde(default)]
    pub locations: Vec<MentionRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionRecord {
    #[serde(flatten)]
    pub mention: LocationMention,
    #[serde(
        default,
        deserialize_with = "location_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionResult>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    /// Whether the extraction step flagged this document as a report.
    pub fn is_report(&self) -> bool {
        self.record
            .as_ref()
            .and_then(|r| r.report.as_deref())
            .is_some_and(|r| r.eq_ignore_ascii_case("yes"))
    }

    /// Mentions of this document that do not carry a coordinate yet.
    /// `document_index` is the document's position in its batch.
    pub fn pending_mentions(&self, document_index: usize) -> Vec<PendingMention> {
        let Some(record) = self.record.as_ref().filter(|_| self.is_report()) else {
            return Vec::new();
        };

        record
            .locations
            .iter()
            .enumerate()
            .filter(|(_, r)| r.location.is_none())
            .map(|(i, r)| PendingMention {
                id: MentionId {
                    document_index,
                    document_id: self.link.clone(),
                    mention_index: i,
                },
                mention: r.mention.clone(),
                published: self.published.clone(),
            })
            .collect()
    }

    /// Mentions of this report that already carry a coordinate, with their
    /// position in the location list.
    pub fn located_mentions(&self) -> Vec<(usize, &MentionRecord, Coordinate)> {
        let Some(record) = self.record.as_ref().filter(|_| self.is_report()) else {
            return Vec::new();
        };

        record
            .locations
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.location.map(|c| (i, r, c)))
            .collect()
    }

    pub fn mention_mut(&mut self, index: usize) -> Option<&mut MentionRecord> {
        self.record.as_mut()?.locations.get_mut(index)
    }
}

/// All pending mentions across a batch, in document order.
pub fn collect_pending(documents: &[Document]) -> Vec<PendingMention> {
    documents
        .iter()
        .enumerate()
        .flat_map(|(i, doc)| doc.pending_mentions(i))
        .collect()
}

// ─── Lenient field readers ───────────────────────────────

fn scalar_to_string(value: Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_to_string(Value::deserialize(deserializer)?))
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string(deserializer)?.unwrap_or_default())
}

fn settlement_kind<'de, D>(deserializer: D) -> Result<Option<SettlementKind>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string(deserializer)?.map(|s| SettlementKind::parse(&s)))
}

fn coordinate_component(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts `[lat, lon]`, `{lat, lon}` or `{lat, lng}`; empty strings, empty
/// lists and non-finite values all read as "no coordinate".
fn location_field<'de, D>(deserializer: D) -> Result<Option<Coordinate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coordinate_from_value(&value))
}

pub fn coordinate_from_value(value: &Value) -> Option<Coordinate> {
    let (lat, lon) = match value {
        Value::Array(items) if items.len() >= 2 => (&items[0], &items[1]),
        Value::Object(map) => (map.get("lat")?, map.get("lon").or_else(|| map.get("lng"))?),
        _ => return None,
    };
    Coordinate::new(coordinate_component(lat)?, coordinate_component(lon)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coordinate_rejects_nan() {
        assert!(Coordinate::new(f64::NAN, 77.0).is_none());
        assert!(Coordinate::new(12.0, f64::INFINITY).is_none());
        assert_eq!(
            Coordinate::new(0.0, 0.0),
            Some(Coordinate { lat: 0.0, lon: 0.0 })
        );
    }

    #[test]
    fn test_location_field_shapes() {
        assert_eq!(
            coordinate_from_value(&json!([10.5, 76.2])),
            Some(Coordinate { lat: 10.5, lon: 76.2 })
        );
        assert_eq!(
            coordinate_from_value(&json!({"lat": 10.5, "lng": 76.2})),
            Some(Coordinate { lat: 10.5, lon: 76.2 })
        );
        assert_eq!(
            coordinate_from_value(&json!({"lat": "10.5", "lon": "76.2"})),
            Some(Coordinate { lat: 10.5, lon: 76.2 })
        );
        assert_eq!(coordinate_from_value(&json!([])), None);
        assert_eq!(coordinate_from_value(&json!(["", ""])), None);
        assert_eq!(coordinate_from_value(&json!({"lat": "", "lon": ""})), None);
    }

    #[test]
    fn test_mention_record_reads_extraction_output() {
        let raw = json!({
            "nearby": null,
            "road_name": "NH 66",
            "village/town": "village",
            "village_name/town_name": "Mundakkai",
            "area_name": "",
            "district_name": "Wayanad",
            "state_name": "Kerala",
            "pincode": 673577,
            "landslide_size": "large"
        });
        let record: MentionRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.mention.settlement_name, "Mundakkai");
        assert_eq!(record.mention.settlement_kind, Some(SettlementKind::Village));
        assert_eq!(record.mention.area_name, None);
        assert_eq!(record.mention.nearby_hint, None);
        assert_eq!(record.mention.pincode.as_deref(), Some("673577"));
        assert!(record.location.is_none());
        assert_eq!(record.extra.get("road_name"), Some(&json!("NH 66")));
        assert_eq!(record.extra.get("landslide_size"), Some(&json!("large")));
        assert!(!record.extra.contains_key("district_name"));
    }

    #[test]
    fn test_pending_mentions_skip_located_and_non_reports() {
        let doc: Document = serde_json::from_value(json!({
            "link": "https://news.example/a",
            "published": "Tue, 30 Jul 2024 10:00:00 GMT",
            "landslide_record": {
                "landslide_report": "yes",
                "locations": [
                    {"village_name/town_name": "Chooralmala", "location": [11.5, 76.25]},
                    {"village_name/town_name": "Meppadi", "location": ["", ""]}
                ]
            }
        }))
        .unwrap();
        let pending = doc.pending_mentions(4);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id.document_index, 4);
        assert_eq!(pending[0].id.mention_index, 1);

        let located = doc.located_mentions();
        assert_eq!(located.len(), 1);
        assert_eq!(located[0].0, 0);
        assert_eq!(located[0].2, Coordinate { lat: 11.5, lon: 76.25 });
        assert_eq!(pending[0].mention.settlement_name, "Meppadi");

        let not_report: Document = serde_json::from_value(json!({
            "link": "https://news.example/b",
            "landslide_record": {
                "landslide_report": "no",
                "locations": [{"village_name/town_name": "Meppadi"}]
            }
        }))
        .unwrap();
        assert!(not_report.pending_mentions(0).is_empty());
        assert!(not_report.located_mentions().is_empty());
    }

    #[test]
    fn test_resolution_result_serializes_tagged() {
        let resolved = ResolutionResult::resolved(
            Coordinate { lat: 1.0, lon: 2.0 },
            ResolutionSource::PoiRefinement,
        );
        let json = serde_json::to_value(resolved).unwrap();
        assert_eq!(json["status"], "resolved");
        assert_eq!(json["source"], "poi_refinement");

        let unresolved = ResolutionResult::unresolved(UnresolvedReason::RateLimited);
        let json = serde_json::to_value(unresolved).unwrap();
        assert_eq!(json, json!({"status": "unresolved", "reason": "rate_limited"}));
    }
}
