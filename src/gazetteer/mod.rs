//! Read-only gazetteer built from the postal (pincode) table and the
//! village table. Loaded once at startup and shared by every resolution.

pub mod load;

use serde::Serialize;

use crate::models::Coordinate;

pub use load::{load_table, LoadStats, TableKind};

/// Index of a row inside a [`GazetteerIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowId(pub usize);

/// One reference record. Village rows and some postal rows carry no
/// coordinate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GazetteerRow {
    pub table: TableKind,
    pub office_name: String,
    pub district: String,
    pub state: String,
    pub pincode: Option<String>,
    pub coordinate: Option<Coordinate>,
}

/// In-memory gazetteer. Postal rows come first, then village rows, each in
/// file order.
#[derive(Debug, Default)]
pub struct GazetteerIndex {
    rows: Vec<GazetteerRow>,
    /// Lower-cased `office_name`, parallel with `rows`.
    names: Vec<String>,
}

impl GazetteerIndex {
    pub fn from_rows(rows: Vec<GazetteerRow>) -> Self {
        let names = rows.iter().map(|r| r.office_name.to_lowercase()).collect();
        Self { rows, names }
    }

    /// Load both tables. Only a table that cannot be opened at all is fatal;
    /// malformed rows are skipped.
    pub fn load(
        pincode_path: &std::path::Path,
        village_path: &std::path::Path,
    ) -> anyhow::Result<Self> {
        let (mut rows, postal) = load_table(pincode_path, TableKind::Postal)?;
        let (village_rows, village) = load_table(village_path, TableKind::Village)?;
        rows.extend(village_rows);

        tracing::info!(
            "Gazetteer loaded: {} postal rows ({} skipped), {} village rows ({} skipped)",
            postal.loaded,
            postal.skipped,
            village.loaded,
            village.skipped
        );

        Ok(Self::from_rows(rows))
    }

    /// Case-insensitive substring search: `name` must occur inside a row's
    /// office/settlement name. Results keep dataset order; no ranking.
    pub fn find_by_name(&self, name: &str) -> Vec<(RowId, &GazetteerRow)> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.names
            .iter()
            .enumerate()
            .filter(|(_, haystack)| haystack.contains(&needle))
            .map(|(i, _)| (RowId(i), &self.rows[i]))
            .collect()
    }

    pub fn row(&self, id: RowId) -> Option<&GazetteerRow> {
        self.rows.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
