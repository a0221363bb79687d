use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::models::{Coordinate, Document, PendingMention, ResolutionResult, ResolutionSource};
use crate::sink::{write_json_atomic, ResultSink};

/// One resolved mention, keyed by `(url, mention_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub url: String,
    pub mention_index: usize,
    /// Publication date of the source document, when it parses.
    pub date: Option<DateTime<Utc>>,
    pub lat: f64,
    pub lon: f64,
    pub state: Option<String>,
    /// `None` when the coordinate arrived with the document.
    #[serde(default)]
    pub source: Option<ResolutionSource>,
    pub resolved_at: DateTime<Utc>,
}

impl LocationRecord {
    pub fn new(mention: &PendingMention, coordinate: Coordinate, source: ResolutionSource) -> Self {
        Self::located(
            &mention.id.document_id,
            mention.id.mention_index,
            mention.published.as_deref(),
            mention.mention.state_name.clone(),
            coordinate,
            Some(source),
        )
    }

    fn located(
        url: &str,
        mention_index: usize,
        published: Option<&str>,
        state: Option<String>,
        coordinate: Coordinate,
        source: Option<ResolutionSource>,
    ) -> Self {
        Self {
            url: url.to_string(),
            mention_index,
            date: published.and_then(parse_published),
            lat: coordinate.lat,
            lon: coordinate.lon,
            state,
            source,
            resolved_at: Utc::now(),
        }
    }

    fn key(&self) -> (String, usize) {
        (self.url.clone(), self.mention_index)
    }
}

/// Feed dates arrive as RFC 2822 (`Tue, 30 Jul 2024 10:00:00 GMT`); accept
/// RFC 3339 as well.
fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|d| d.with_timezone(&Utc))
        .ok()
}

/// Flat store of resolved locations with disk persistence.
///
/// Re-attaching the same mention replaces its record, so repeated runs over
/// the same documents never duplicate entries. Records need a url: mentions
/// from documents without a link are not stored.
pub struct LocationStore {
    records: RwLock<BTreeMap<(String, usize), LocationRecord>>,
    persist_path: PathBuf,
}

impl LocationStore {
    pub fn open_or_create(persist_path: &Path) -> Result<Self> {
        if let Some(parent) = persist_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let records: Vec<LocationRecord> = if persist_path.exists() {
            let data = std::fs::read_to_string(persist_path)
                .context("Failed to read location store")?;
            serde_json::from_str(&data).context("Failed to parse location store")?
        } else {
            Vec::new()
        };
        tracing::debug!(
            "Opened location store at {} with {} records",
            persist_path.display(),
            records.len()
        );

        Ok(Self {
            records: RwLock::new(records.into_iter().map(|r| (r.key(), r)).collect()),
            persist_path: persist_path.to_path_buf(),
        })
    }

    /// Insert or replace the record for `(url, mention_index)`. Returns false
    /// for a record without a url.
    pub fn upsert(&self, record: LocationRecord) -> bool {
        if record.url.trim().is_empty() {
            return false;
        }
        self.records.write().insert(record.key(), record);
        true
    }

    /// Add a record for every reported mention that already carries a
    /// coordinate. Existing records are kept. Returns the number added.
    pub fn seed_from_documents(&self, documents: &[Document]) -> usize {
        let mut records = self.records.write();
        let mut added = 0;
        for doc in documents.iter().filter(|d| !d.link.trim().is_empty()) {
            for (index, record, coordinate) in doc.located_mentions() {
                let key = (doc.link.clone(), index);
                if records.contains_key(&key) {
                    continue;
                }
                let source = match record.resolution {
                    Some(ResolutionResult::Resolved { source, .. }) => Some(source),
                    _ => None,
                };
                let located = LocationRecord::located(
                    &doc.link,
                    index,
                    doc.published.as_deref(),
                    record.mention.state_name.clone(),
                    coordinate,
                    source,
                );
                records.insert(key, located);
                added += 1;
            }
        }
        if added > 0 {
            tracing::info!("Added {added} already located mentions to the location store");
        }
        added
    }

    /// Remove every record from one source document.
    pub fn delete_by_url(&self, url: &str) -> usize {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|(record_url, _), _| record_url != url);
        before - records.len()
    }

    pub fn get(&self, url: &str, mention_index: usize) -> Option<LocationRecord> {
        self.records
            .read()
            .get(&(url.to_string(), mention_index))
            .cloned()
    }

    /// All records, ordered by url then mention index.
    pub fn records(&self) -> Vec<LocationRecord> {
        self.records.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Write the store to disk (atomic write via temp file + rename).
    pub fn persist(&self) -> Result<usize> {
        let records = self.records();
        write_json_atomic(&self.persist_path, &records)?;
        Ok(records.len())
    }
}

impl ResultSink for LocationStore {
    fn attach(&mut self, mention: &PendingMention, result: &ResolutionResult) {
        if let ResolutionResult::Resolved { coordinate, source } = *result {
            if !self.upsert(LocationRecord::new(mention, coordinate, source)) {
                tracing::debug!("Not storing {}: document has no link", mention.id);
            }
        }
    }

    fn flush(&mut self) -> Result<usize> {
        let written = self.persist()?;
        tracing::info!(
            "Saved {written} location records to {}",
            self.persist_path.display()
        );
        Ok(written)
    }
}
