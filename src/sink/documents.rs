use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::{Document, PendingMention, ResolutionResult};
use crate::sink::{write_json_atomic, ResultSink};

/// Writes outcomes back onto the source documents and saves the whole set
/// next to the input as `<stem>_geocoded.<ext>`.
///
/// Mentions are matched to documents by batch position, so documents that
/// share a link (or have none) each keep their own outcomes.
pub struct DocumentSink {
    documents: Vec<Document>,
    output_path: PathBuf,
}

impl DocumentSink {
    pub fn new(documents: Vec<Document>, output_path: PathBuf) -> Self {
        warn_on_shared_links(&documents);
        Self {
            documents,
            output_path,
        }
    }

    /// Read a JSON array of documents.
    pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read documents from {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse documents in {}", path.display()))
    }

    /// `articles.json` -> `articles_geocoded.json`
    pub fn output_path_for(input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "documents".to_string());
        let file_name = match input.extension() {
            Some(ext) => format!("{stem}_geocoded.{}", ext.to_string_lossy()),
            None => format!("{stem}_geocoded"),
        };
        input.with_file_name(file_name)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl ResultSink for DocumentSink {
    fn attach(&mut self, mention: &PendingMention, result: &ResolutionResult) {
        let Some(document) = self.documents.get_mut(mention.id.document_index) else {
            tracing::warn!("No document for mention {}", mention.id);
            return;
        };
        if document.link != mention.id.document_id {
            tracing::warn!("Mention {} does not belong to this batch", mention.id);
            return;
        }
        let Some(record) = document.mention_mut(mention.id.mention_index) else {
            tracing::warn!("Mention {} is out of range", mention.id);
            return;
        };

        record.location = result.coordinate();
        record.resolution = Some(*result);
    }

    fn flush(&mut self) -> Result<usize> {
        write_json_atomic(&self.output_path, &self.documents)?;
        tracing::info!(
            "Saved {} documents to {}",
            self.documents.len(),
            self.output_path.display()
        );
        Ok(self.documents.len())
    }
}

/// Reported documents whose link is empty or repeated cannot be told apart
/// in the location store.
fn warn_on_shared_links(documents: &[Document]) {
    let mut seen = HashSet::new();
    for (i, doc) in documents.iter().enumerate().filter(|(_, d)| d.is_report()) {
        if doc.link.trim().is_empty() {
            tracing::warn!("Document {i} has no link; its locations are not stored");
        } else if !seen.insert(doc.link.as_str()) {
            tracing::warn!("Document {i} repeats link {}", doc.link);
        }
    }
}
