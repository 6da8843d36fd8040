//! Administrative units and their hierarchy levels.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::BoundingBox;

/// OSM admin_level mapping to semantic level names.
/// See: https://wiki.openstreetmap.org/wiki/Tag:boundary%3Dadministrative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AdminLevel {
    /// Country (admin_level=2)
    Country,
    /// Macro region / federal district (admin_level=3)
    MacroRegion,
    /// Region / state / province / voivodeship (admin_level=4)
    Region,
    /// Macro county (admin_level=5)
    MacroCounty,
    /// County / district (admin_level=6)
    County,
    /// Local admin / municipality (admin_level=7)
    LocalAdmin,
    /// Locality / city / town / village (admin_level=8)
    Locality,
    /// Borough / city district (admin_level=9)
    Borough,
    /// Neighbourhood / suburb (admin_level=10)
    Neighbourhood,
}

impl AdminLevel {
    /// Convert OSM admin_level number to AdminLevel
    pub fn from_osm_level(level: u8) -> Option<Self> {
        match level {
            2 => Some(AdminLevel::Country),
            3 => Some(AdminLevel::MacroRegion),
            4 => Some(AdminLevel::Region),
            5 => Some(AdminLevel::MacroCounty),
            6 => Some(AdminLevel::County),
            7 => Some(AdminLevel::LocalAdmin),
            8 => Some(AdminLevel::Locality),
            9 => Some(AdminLevel::Borough),
            10 | 11 => Some(AdminLevel::Neighbourhood),
            _ => None,
        }
    }

    /// Get the OSM admin_level number
    pub fn to_osm_level(&self) -> u8 {
        match self {
            AdminLevel::Country => 2,
            AdminLevel::MacroRegion => 3,
            AdminLevel::Region => 4,
            AdminLevel::MacroCounty => 5,
            AdminLevel::County => 6,
            AdminLevel::LocalAdmin => 7,
            AdminLevel::Locality => 8,
            AdminLevel::Borough => 9,
            AdminLevel::Neighbourhood => 10,
        }
    }

    /// Get all admin levels in hierarchical order (country first)
    pub fn all() -> &'static [AdminLevel] {
        &[
            AdminLevel::Country,
            AdminLevel::MacroRegion,
            AdminLevel::Region,
            AdminLevel::MacroCounty,
            AdminLevel::County,
            AdminLevel::LocalAdmin,
            AdminLevel::Locality,
            AdminLevel::Borough,
            AdminLevel::Neighbourhood,
        ]
    }

    /// Get the field name for this level
    pub fn field_name(&self) -> &'static str {
        match self {
            AdminLevel::Country => "country",
            AdminLevel::MacroRegion => "macro_region",
            AdminLevel::Region => "region",
            AdminLevel::MacroCounty => "macro_county",
            AdminLevel::County => "county",
            AdminLevel::LocalAdmin => "local_admin",
            AdminLevel::Locality => "locality",
            AdminLevel::Borough => "borough",
            AdminLevel::Neighbourhood => "neighbourhood",
        }
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl std::str::FromStr for AdminLevel {
    type Err = String;

    /// Accepts either a field name (`"locality"`) or an OSM number (`"8"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<u8>() {
            return AdminLevel::from_osm_level(n).ok_or_else(|| format!("unknown admin level {}", n));
        }
        AdminLevel::all()
            .iter()
            .copied()
            .find(|l| l.field_name() == s)
            .ok_or_else(|| format!("unknown admin level '{}'", s))
    }
}

/// Stable index of a unit inside its [`crate::hierarchy::AdminUnitList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub(crate) usize);

impl UnitId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A single administrative unit.
///
/// Numeric statistics use zero as the "unknown" sentinel, matching the source
/// datasets. Parent and children are arena indices owned by the list that
/// built the unit.
#[derive(Debug, Clone, Serialize)]
pub struct AdminUnit {
    /// Source record id
    pub id: i64,

    /// Parent id declared by the source record (0 = none)
    pub parent_id: i64,

    pub name: String,

    /// Raw admin level from the source (0 = missing or unparsable).
    /// Neighbor matching compares this value exactly.
    pub admin_level: u8,

    pub population: u64,

    /// Area in km²
    pub area: f64,

    /// Inhabitants per km²
    pub density: f64,

    pub bbox: BoundingBox,

    pub(crate) parent: Option<UnitId>,
    pub(crate) children: Vec<UnitId>,
}

impl AdminUnit {
    pub fn parent(&self) -> Option<UnitId> {
        self.parent
    }

    pub fn children(&self) -> &[UnitId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Named level for display and filtering; several raw levels may share
    /// one name.
    pub fn level(&self) -> Option<AdminLevel> {
        AdminLevel::from_osm_level(self.admin_level)
    }

    /// Whether the raw level is exactly the OSM number of `level`.
    pub fn is_at(&self, level: AdminLevel) -> bool {
        self.admin_level == level.to_osm_level()
    }

    /// Both density and population are unknown and need estimating.
    pub fn needs_imputation(&self) -> bool {
        self.density == 0.0 && self.population == 0
    }
}

impl fmt::Display for AdminUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AdminUnit{{name='{}', adminLevel={}, population={}, area={}, density={}, bbox={}}}",
            self.name, self.admin_level, self.population, self.area, self.density, self.bbox
        )
    }
}
