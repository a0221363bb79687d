//! Where resolution outcomes end up: back on the source documents, and in a
//! flat store keyed by source document and mention position.

pub mod documents;
pub mod store;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{MentionId, PendingMention, ResolutionResult};

pub use documents::DocumentSink;
pub use store::{LocationRecord, LocationStore};

/// Destination for resolution outcomes.
pub trait ResultSink {
    /// Merge one outcome into the mention's persisted record.
    fn attach(&mut self, mention: &PendingMention, result: &ResolutionResult);

    /// Write everything attached so far. Returns the number of records written.
    fn flush(&mut self) -> Result<usize>;
}

/// Attach batch results to `sink`, matching each result to its mention by
/// identity rather than by position.
pub fn attach_all(
    sink: &mut dyn ResultSink,
    pending: &[PendingMention],
    results: &[(MentionId, ResolutionResult)],
) {
    let by_id: HashMap<&MentionId, &PendingMention> = pending.iter().map(|p| (&p.id, p)).collect();

    for (id, result) in results {
        match by_id.get(id) {
            Some(mention) => sink.attach(mention, result),
            None => tracing::warn!("Dropping result for unknown mention {id}"),
        }
    }
}

/// Serialize `value` as pretty JSON and replace `path` atomically
/// (temp file + rename).
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, data)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
