//! Administrative hierarchy: an arena-backed forest of [`AdminUnit`]s.
//!
//! Units are owned by [`AdminUnitList`] and refer to each other through
//! [`UnitId`] indices, so parent and child links can be followed in O(1)
//! in both directions without shared ownership.

mod builder;
mod impute;

pub use builder::{BuildReport, HierarchyBuilder};

use hashbrown::HashMap;

use crate::models::{AdminUnit, BoundingBox, UnitId, UnitRecord};

/// Set of raw admin levels, one bit per possible `u8` value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LevelSet([u64; 4]);

impl LevelSet {
    pub fn insert(&mut self, level: u8) {
        self.0[(level >> 6) as usize] |= 1u64 << (level & 63);
    }

    pub fn contains(&self, level: u8) -> bool {
        self.0[(level >> 6) as usize] & (1u64 << (level & 63)) != 0
    }

    pub fn union_with(&mut self, other: &LevelSet) {
        for (word, other) in self.0.iter_mut().zip(other.0) {
            *word |= other;
        }
    }
}

/// Aggregate facts about a unit and all of its descendants.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SubtreeSummary {
    /// Union of every bounding box in the subtree
    pub extent: BoundingBox,
    /// Raw admin levels present in the subtree
    pub levels: LevelSet,
}

impl SubtreeSummary {
    pub fn has_level(&self, level: u8) -> bool {
        self.levels.contains(level)
    }
}

/// The built forest of administrative units.
#[derive(Debug, Clone, Default)]
pub struct AdminUnitList {
    units: Vec<AdminUnit>,
    by_id: HashMap<i64, UnitId>,
    roots: Vec<UnitId>,
    summaries: Vec<SubtreeSummary>,
}

impl AdminUnitList {
    /// Build, link and impute in one go with default builder settings.
    pub fn from_records<I>(records: I) -> (Self, BuildReport)
    where
        I: IntoIterator<Item = UnitRecord>,
    {
        HierarchyBuilder::new().build(records)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Look up a unit by arena index.
    ///
    /// Panics if `id` did not come from this list.
    pub fn get(&self, id: UnitId) -> &AdminUnit {
        &self.units[id.0]
    }

    /// Arena index of the unit carrying source id `id` (the last one, if
    /// the source repeated the id).
    pub fn find_by_id(&self, id: i64) -> Option<UnitId> {
        self.by_id.get(&id).copied()
    }

    /// Units in source order.
    pub fn units(&self) -> &[AdminUnit] {
        &self.units
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitId, &AdminUnit)> + '_ {
        self.units.iter().enumerate().map(|(i, u)| (UnitId(i), u))
    }

    pub fn ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        (0..self.units.len()).map(UnitId)
    }

    /// Units without a resolved parent, in source order.
    pub fn roots(&self) -> &[UnitId] {
        &self.roots
    }

    pub fn parent(&self, id: UnitId) -> Option<&AdminUnit> {
        self.get(id).parent.map(|p| self.get(p))
    }

    pub fn children(&self, id: UnitId) -> impl Iterator<Item = &AdminUnit> + '_ {
        self.get(id).children.iter().map(move |c| self.get(*c))
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: UnitId) -> Ancestors<'_> {
        Ancestors {
            list: self,
            next: self.get(id).parent,
        }
    }

    /// `id` and all of its descendants in depth-first pre-order.
    pub fn subtree(&self, id: UnitId) -> Vec<UnitId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.get(current).children.iter().rev().copied());
        }
        out
    }

    /// Number of ancestor hops from `id` to its root.
    pub fn depth(&self, id: UnitId) -> usize {
        self.ancestors(id).count()
    }

    pub(crate) fn summary(&self, id: UnitId) -> &SubtreeSummary {
        &self.summaries[id.0]
    }

    /// Recompute subtree extents and level sets, children before parents.
    fn summarize(&mut self) {
        let mut order = Vec::with_capacity(self.units.len());
        let mut stack: Vec<UnitId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.units[id.0].children.iter().copied());
        }

        let mut summaries = vec![SubtreeSummary::default(); self.units.len()];
        for id in order.into_iter().rev() {
            let unit = &self.units[id.0];
            let mut summary = SubtreeSummary {
                extent: unit.bbox,
                levels: LevelSet::default(),
            };
            summary.levels.insert(unit.admin_level);
            for child in &unit.children {
                let child_summary = summaries[child.0];
                summary.extent.add(&child_summary.extent);
                summary.levels.union_with(&child_summary.levels);
            }
            summaries[id.0] = summary;
        }
        self.summaries = summaries;
    }
}

/// Iterator over the ancestors of a unit, see [`AdminUnitList::ancestors`].
pub struct Ancestors<'a> {
    list: &'a AdminUnitList,
    next: Option<UnitId>,
}

impl Iterator for Ancestors<'_> {
    type Item = UnitId;

    fn next(&mut self) -> Option<UnitId> {
        let current = self.next?;
        self.next = self.list.get(current).parent;
        Some(current)
    }
}
