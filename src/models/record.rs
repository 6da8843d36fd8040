//! Flat input records consumed by the hierarchy builder.

use serde::{Deserialize, Serialize};

use super::{AdminUnit, BoundingBox};

/// One row of the source dataset, already coerced to typed values.
///
/// Unknown numeric values are zero. Corner points that failed to parse are
/// `None` and are skipped when the bounding box is folded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: i64,
    /// 0 = no parent
    pub parent_id: i64,
    pub name: String,
    /// Raw admin level, 0 when unknown
    pub admin_level: u8,
    pub population: u64,
    pub area: f64,
    pub density: f64,
    #[serde(default)]
    pub corners: Vec<Option<(f64, f64)>>,
}

impl UnitRecord {
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_points(self.corners.iter().flatten().copied())
    }

    /// Build the unlinked unit for this record.
    pub(crate) fn to_unit(&self) -> AdminUnit {
        AdminUnit {
            id: self.id,
            parent_id: self.parent_id,
            name: self.name.clone(),
            admin_level: self.admin_level,
            population: self.population,
            area: self.area,
            density: self.density,
            bbox: self.bbox(),
            parent: None,
            children: Vec::new(),
        }
    }
}
