//! Core data models: bounding boxes, administrative units and input records.

pub mod admin;
pub mod bbox;
pub mod record;

pub use admin::{AdminLevel, AdminUnit, UnitId};
pub use bbox::{BoundingBox, EARTH_RADIUS_KM};
pub use record::UnitRecord;
