//! TOML configuration for the `larch` binary.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::IngestOptions;
use crate::models::AdminLevel;
use crate::neighbors::NeighborSearch;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub neighbors: NeighborConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub path: Option<PathBuf>,
    pub delimiter: char,
    pub corner_points: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NeighborConfig {
    pub max_distance_km: f64,
    pub distance_level: AdminLevel,
    pub include_self: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: None,
            delimiter: ',',
            corner_points: 5,
        }
    }
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            max_distance_km: 15.0,
            distance_level: AdminLevel::Locality,
            include_self: false,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }
}

impl InputConfig {
    pub fn ingest_options(&self) -> Result<IngestOptions> {
        let delimiter = u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .with_context(|| format!("Delimiter {:?} is not a single ASCII character", self.delimiter))?;
        Ok(IngestOptions {
            delimiter,
            corner_points: self.corner_points,
        })
    }
}

impl NeighborConfig {
    pub fn search(&self) -> NeighborSearch {
        NeighborSearch::within(self.max_distance_km).include_self(self.include_self)
    }
}
