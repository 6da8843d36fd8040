//! Larch - administrative unit hierarchies with bounding-box geometry
//!
//! This library rebuilds the containment forest of a flat admin-unit dataset,
//! fills in missing statistics from ancestors and answers neighbor and
//! filter queries over the result. The `larch` binary is a thin CLI on top.

pub mod config;
pub mod error;
pub mod hierarchy;
pub mod ingest;
pub mod models;
pub mod neighbors;
pub mod query;

pub use error::{GeometryError, IngestError};
pub use hierarchy::{AdminUnitList, BuildReport, HierarchyBuilder};
pub use models::{AdminLevel, AdminUnit, BoundingBox, UnitId, UnitRecord};
pub use neighbors::{NeighborFinder, NeighborSearch, Neighbors};
pub use query::{SortKey, UnitQuery};
