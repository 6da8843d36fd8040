use csv::{ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::models::UnitRecord;

/// Options for reading a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    /// Field separator
    pub delimiter: u8,
    /// Number of `x{i}`/`y{i}` corner column pairs to look for
    pub corner_points: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            corner_points: 5,
        }
    }
}

/// What happened while reading a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Data rows read, including skipped ones
    pub rows: usize,
    /// Rows dropped because their id did not parse
    pub skipped_rows: usize,
    /// Non-empty fields that did not parse and were replaced by the sentinel
    pub malformed_fields: usize,
}

/// Header positions of the columns we understand.
struct Columns {
    id: usize,
    name: usize,
    parent: Option<usize>,
    admin_level: Option<usize>,
    population: Option<usize>,
    area: Option<usize>,
    density: Option<usize>,
    corners: Vec<(usize, usize)>,
}

impl Columns {
    fn from_headers(headers: &StringRecord, corner_points: usize) -> Result<Self, IngestError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let corners = (1..=corner_points)
            .filter_map(|i| Some((find(&format!("x{}", i))?, find(&format!("y{}", i))?)))
            .collect();

        Ok(Self {
            id: find("id").ok_or(IngestError::MissingColumn("id"))?,
            name: find("name").ok_or(IngestError::MissingColumn("name"))?,
            parent: find("parent"),
            admin_level: find("admin_level"),
            population: find("population"),
            area: find("area"),
            density: find("density"),
            corners,
        })
    }
}

/// Load units from a file. Files ending in `.gz` are decompressed on the fly.
pub fn read_units(
    path: &Path,
    options: &IngestOptions,
) -> Result<(Vec<UnitRecord>, IngestReport), IngestError> {
    info!("Loading admin units from {}", path.display());

    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    read_units_from(reader, options)
}

/// Load units from any reader producing delimited text with a header row.
pub fn read_units_from<R: Read>(
    reader: R,
    options: &IngestOptions,
) -> Result<(Vec<UnitRecord>, IngestReport), IngestError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let columns = Columns::from_headers(&headers, options.corner_points)?;
    if columns.corners.is_empty() {
        warn!("No corner point columns found, every bounding box will be empty");
    }

    let mut report = IngestReport::default();
    let mut records = Vec::new();

    for result in csv_reader.records() {
        let row = result?;
        report.rows += 1;

        match parse_row(&row, &columns, &mut report) {
            Some(record) => records.push(record),
            None => {
                warn!("Skipping row {}: unparsable id {:?}", report.rows, row.get(columns.id));
                report.skipped_rows += 1;
            }
        }
    }

    info!(
        "Loaded {} units ({} rows skipped, {} malformed fields)",
        records.len(),
        report.skipped_rows,
        report.malformed_fields
    );
    Ok((records, report))
}

/// Coerce one row. Returns `None` only when the id is unusable.
fn parse_row(row: &StringRecord, columns: &Columns, report: &mut IngestReport) -> Option<UnitRecord> {
    let id: i64 = row.get(columns.id)?.trim().parse().ok()?;

    let parent_raw = raw_field(row, columns.parent);
    let level_raw = raw_field(row, columns.admin_level);
    let population_raw = raw_field(row, columns.population);
    let area_raw = raw_field(row, columns.area);
    let density_raw = raw_field(row, columns.density);

    let parent_id = coerce::<i64>(id, "parent", parent_raw, report).unwrap_or(0);
    let admin_level = coerce::<u8>(id, "admin_level", level_raw, report).unwrap_or(0);
    let population = coerce::<u64>(id, "population", population_raw, report).unwrap_or(0);
    let area = coerce_non_negative(id, "area", area_raw, report);
    let density = coerce_non_negative(id, "density", density_raw, report);

    let corners = columns
        .corners
        .iter()
        .map(|&(x, y)| {
            let x = coerce_finite(row.get(x));
            let y = coerce_finite(row.get(y));
            x.zip(y)
        })
        .collect();

    Some(UnitRecord {
        id,
        parent_id,
        name: row.get(columns.name).unwrap_or_default().trim().to_string(),
        admin_level,
        population,
        area,
        density,
        corners,
    })
}

fn raw_field(row: &StringRecord, idx: Option<usize>) -> Option<String> {
    let raw = row.get(idx?)?.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Parse an optional field, counting non-empty values that fail to parse.
fn coerce<T: FromStr>(id: i64, label: &str, raw: Option<String>, report: &mut IngestReport) -> Option<T> {
    let raw = raw?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!("Unit {}: malformed {} {:?}", id, label, raw);
            report.malformed_fields += 1;
            None
        }
    }
}

fn coerce_non_negative(id: i64, label: &str, raw: Option<String>, report: &mut IngestReport) -> f64 {
    match coerce::<f64>(id, label, raw, report) {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        Some(v) => {
            debug!("Unit {}: {} {} is not a non-negative number", id, label, v);
            report.malformed_fields += 1;
            0.0
        }
        None => 0.0,
    }
}

fn coerce_finite(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "id,parent,name,admin_level,population,area,density,x1,y1,x2,y2,x3,y3,x4,y4,x5,y5";

    fn read(text: &str) -> (Vec<UnitRecord>, IngestReport) {
        read_units_from(text.as_bytes(), &IngestOptions::default()).unwrap()
    }

    #[test]
    fn test_reads_typed_fields() {
        let text = format!(
            "{}\n1,,województwo małopolskie,4,3400000,15183.0,224.0,19.0,49.0,21.0,49.0,21.0,50.5,19.0,50.5,19.0,49.0\n",
            HEADER
        );
        let (records, report) = read(&text);

        assert_eq!(report, IngestReport { rows: 1, skipped_rows: 0, malformed_fields: 0 });
        let r = &records[0];
        assert_eq!(r.id, 1);
        assert_eq!(r.parent_id, 0);
        assert_eq!(r.name, "województwo małopolskie");
        assert_eq!(r.admin_level, 4);
        assert_eq!(r.population, 3_400_000);
        assert_eq!(r.area, 15183.0);
        assert_eq!(r.density, 224.0);
        assert_eq!(r.bbox().bounds(), Some((19.0, 49.0, 21.0, 50.5)));
    }

    #[test]
    fn test_malformed_fields_become_unknown() {
        let text = format!(
            "{}\n7,abc,Gmina,seven,-5,n/a,NaN,1.0,1.0,oops,2.0,,,,,,\n",
            HEADER
        );
        let (records, report) = read(&text);

        let r = &records[0];
        assert_eq!(r.parent_id, 0);
        assert_eq!(r.admin_level, 0);
        assert_eq!(r.population, 0);
        assert_eq!(r.area, 0.0);
        assert_eq!(r.density, 0.0);
        assert_eq!(r.corners.iter().flatten().count(), 1);
        assert_eq!(r.bbox().bounds(), Some((1.0, 1.0, 1.0, 1.0)));
        // parent, admin_level, population, area, density
        assert_eq!(report.malformed_fields, 5);
    }

    #[test]
    fn test_empty_fields_are_not_malformed() {
        let text = format!("{}\n3,,Empty,,,,,,,,,,,,,,\n", HEADER);
        let (records, report) = read(&text);
        assert_eq!(report.malformed_fields, 0);
        assert!(records[0].bbox().is_empty());
    }

    #[test]
    fn test_bad_id_skips_row_only() {
        let text = format!("{}\nx,,Bad,8,1,1,1,0,0,0,0,0,0,0,0,0,0\n2,,Good,8,1,1,1,0,0,0,0,0,0,0,0,0,0\n", HEADER);
        let (records, report) = read(&text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Good");
        assert_eq!(report.rows, 2);
        assert_eq!(report.skipped_rows, 1);
    }

    #[test]
    fn test_quoted_names_and_short_rows() {
        let text = "id,name,admin_level,x1,y1\n5,\"Kraków, miasto\",8,19.9,50.0\n6,Short\n";
        let (records, _) = read(text);
        assert_eq!(records[0].name, "Kraków, miasto");
        assert_eq!(records[0].admin_level, 8);
        assert_eq!(records[1].name, "Short");
        assert!(records[1].bbox().is_empty());
    }

    #[test]
    fn test_raw_levels_kept_exactly() {
        let text = "id,name,admin_level\n1,Ten,10\n2,Eleven,11\n3,Odd,42\n4,Huge,300\n";
        let (records, report) = read(text);
        let levels: Vec<u8> = records.iter().map(|r| r.admin_level).collect();
        assert_eq!(levels, vec![10, 11, 42, 0]);
        assert_eq!(report.malformed_fields, 1);
    }

    #[test]
    fn test_missing_required_column() {
        let err = read_units_from("name,parent\nA,0\n".as_bytes(), &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn("id")));
    }

    #[test]
    fn test_custom_delimiter() {
        let options = IngestOptions {
            delimiter: b';',
            corner_points: 1,
        };
        let (records, _) = read_units_from("id;name;x1;y1\n1;A;2.5;3.5\n".as_bytes(), &options).unwrap();
        assert_eq!(records[0].bbox().bounds(), Some((2.5, 3.5, 2.5, 3.5)));
    }
}
