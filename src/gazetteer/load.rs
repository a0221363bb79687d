use std::path::Path;

use serde::Serialize;

use crate::error::GazetteerError;
use crate::gazetteer::GazetteerRow;
use crate::models::Coordinate;

/// Which source table a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Postal,
    Village,
}

impl TableKind {
    fn name_headers(self) -> &'static [&'static str] {
        match self {
            TableKind::Postal => &["officename", "office_name", "office"],
            TableKind::Village => &["villagename", "village_name", "village", "name"],
        }
    }
}

const DISTRICT_HEADERS: &[&str] = &["district", "districtname", "district_name"];
const STATE_HEADERS: &[&str] = &["statename", "state", "state_name"];
const PINCODE_HEADERS: &[&str] = &["pincode", "pin_code", "pin"];
const LAT_HEADERS: &[&str] = &["latitude", "lat"];
const LON_HEADERS: &[&str] = &["longitude", "lon", "lng", "long"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub loaded: usize,
    pub skipped: usize,
}

/// Column positions resolved from the header row.
#[derive(Debug)]
struct Columns {
    name: Option<usize>,
    district: Option<usize>,
    state: Option<usize>,
    pincode: Option<usize>,
    lat: Option<usize>,
    lon: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord, table: TableKind) -> Self {
        let find = |aliases: &[&str]| {
            headers.iter().position(|h| {
                let h = h.trim().to_lowercase();
                aliases.iter().any(|a| *a == h)
            })
        };

        Self {
            name: find(table.name_headers()),
            district: find(DISTRICT_HEADERS),
            state: find(STATE_HEADERS),
            pincode: find(PINCODE_HEADERS),
            lat: find(LAT_HEADERS),
            lon: find(LON_HEADERS),
        }
    }

    fn missing(&self, table: TableKind) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("name");
        }
        if self.district.is_none() {
            missing.push("district");
        }
        if self.state.is_none() {
            missing.push("state");
        }
        if table == TableKind::Postal && self.pincode.is_none() {
            missing.push("pincode");
        }
        missing
    }
}

/// Load one gazetteer table from CSV.
///
/// Fails only when the file cannot be opened or its header cannot be read.
/// Rows with a missing required value are dropped and counted in
/// [`LoadStats::skipped`].
pub fn load_table(
    path: &Path,
    table: TableKind,
) -> Result<(Vec<GazetteerRow>, LoadStats), GazetteerError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| GazetteerError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let headers = reader
        .headers()
        .map_err(|source| GazetteerError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    let columns = Columns::resolve(&headers, table);
    let missing = columns.missing(table);
    if !missing.is_empty() {
        tracing::warn!(
            "{} lacks required column(s) {:?}; every row will be skipped",
            path.display(),
            missing
        );
    }

    let mut rows = Vec::new();
    let mut stats = LoadStats::default();

    for (idx, result) in reader.records().enumerate() {
        let line = idx as u64 + 2;
        let parsed = result
            .map_err(|e| GazetteerError::MalformedRow {
                line,
                reason: e.to_string(),
            })
            .and_then(|record| parse_row(&record, &columns, table, line));

        match parsed {
            Ok(row) => {
                rows.push(row);
                stats.loaded += 1;
            }
            Err(e) => {
                tracing::debug!("Skipping {} row: {e}", path.display());
                stats.skipped += 1;
            }
        }
    }

    Ok((rows, stats))
}

fn parse_row(
    record: &csv::StringRecord,
    columns: &Columns,
    table: TableKind,
    line: u64,
) -> Result<GazetteerRow, GazetteerError> {
    let field = |col: Option<usize>| {
        col.and_then(|idx| record.get(idx))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let required = |col: Option<usize>, what: &str| {
        field(col).ok_or_else(|| GazetteerError::MalformedRow {
            line,
            reason: format!("missing {what}"),
        })
    };

    let office_name = required(columns.name, "name")?;
    let district = required(columns.district, "district")?;
    let state = required(columns.state, "state")?;
    let pincode = match table {
        TableKind::Postal => Some(required(columns.pincode, "pincode")?),
        TableKind::Village => field(columns.pincode),
    };

    let coordinate = match (field(columns.lat), field(columns.lon)) {
        (Some(lat), Some(lon)) => match (lat.parse(), lon.parse()) {
            (Ok(lat), Ok(lon)) => Coordinate::new(lat, lon),
            _ => None,
        },
        _ => None,
    };

    Ok(GazetteerRow {
        table,
        office_name,
        district,
        state,
        pincode,
        coordinate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_postal_table_with_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "pincode.csv",
            "CircleName,OfficeName,Pincode,District,StateName,Latitude,Longitude\n\
             Kerala Circle,Kochi Town,682001,Ernakulam,Kerala,9.9312,76.2673\n\
             Kerala Circle,Meppadi S.O,673577,Wayanad,Kerala,NA,NA\n",
        );
        let (rows, stats) = load_table(&path, TableKind::Postal).unwrap();
        assert_eq!(stats, LoadStats { loaded: 2, skipped: 0 });
        assert_eq!(rows[0].office_name, "Kochi Town");
        assert_eq!(rows[0].pincode.as_deref(), Some("682001"));
        assert_eq!(
            rows[0].coordinate,
            Some(Coordinate { lat: 9.9312, lon: 76.2673 })
        );
        assert!(rows[1].coordinate.is_none());
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "village.csv",
            "VillageName,District,State\n\
             Mundakkai,Wayanad,Kerala\n\
             ,Wayanad,Kerala\n\
             Chooralmala,Wayanad\n\
             Kavalappara,Malappuram,Kerala\n",
        );
        let (rows, stats) = load_table(&path, TableKind::Village).unwrap();
        assert_eq!(stats, LoadStats { loaded: 2, skipped: 2 });
        assert_eq!(rows[0].office_name, "Mundakkai");
        assert_eq!(rows[1].office_name, "Kavalappara");
        assert_eq!(rows[1].table, TableKind::Village);
    }

    #[test]
    fn test_missing_required_column_skips_all_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "pincode.csv", "OfficeName,District,StateName\nKochi,Ernakulam,Kerala\n");
        let (rows, stats) = load_table(&path, TableKind::Postal).unwrap();
        assert!(rows.is_empty());
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_table(&dir.path().join("nope.csv"), TableKind::Postal).unwrap_err();
        assert!(matches!(err, GazetteerError::Open { .. }));
    }
}
