//! Tabular ingest of administrative unit datasets.
//!
//! Reads delimited files (optionally gzip-compressed) into [`UnitRecord`]s.
//! Bad fields fall back to the zero sentinel and bad rows are skipped, so a
//! single malformed value never aborts a run.

mod reader;

pub use reader::{read_units, read_units_from, IngestOptions, IngestReport};
