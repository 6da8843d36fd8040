//! Flat and hierarchy-pruned neighbor search.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GeometryError;
use crate::hierarchy::AdminUnitList;
use crate::models::{AdminLevel, AdminUnit, UnitId};

/// Parameters of a single neighbor query.
///
/// A unit with a non-empty box matches its own predicates, so an unfiltered
/// search lists it among its own neighbors. [`NeighborSearch::within`] leaves
/// it out; set `include_self` to keep it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeighborSearch {
    /// Center-to-center radius, only applied at the distance-capped level
    pub max_distance_km: f64,
    /// Keep the queried unit in its own result when it matches itself
    pub include_self: bool,
}

impl NeighborSearch {
    pub fn within(max_distance_km: f64) -> Self {
        Self {
            max_distance_km,
            include_self: false,
        }
    }

    pub fn include_self(mut self, include_self: bool) -> Self {
        self.include_self = include_self;
        self
    }
}

/// Result of a neighbor query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Neighbors {
    /// Matching units in source order
    pub units: Vec<UnitId>,
    /// Number of candidate units whose predicates were evaluated
    pub examined: usize,
}

/// Neighbor queries over a built [`AdminUnitList`].
///
/// The finder only borrows the list, so one list can serve many finders and
/// many threads at once.
#[derive(Debug, Clone, Copy)]
pub struct NeighborFinder<'a> {
    list: &'a AdminUnitList,
    distance_level: u8,
}

/// State of one query while candidates are being scanned.
struct Scan<'s> {
    id: UnitId,
    unit: &'s AdminUnit,
    search: &'s NeighborSearch,
    found: Vec<UnitId>,
    examined: usize,
}

impl<'a> NeighborFinder<'a> {
    pub fn new(list: &'a AdminUnitList) -> Self {
        Self {
            list,
            distance_level: AdminLevel::Locality.to_osm_level(),
        }
    }

    /// Level at which the distance radius applies (default: locality).
    pub fn with_distance_level(mut self, level: AdminLevel) -> Self {
        self.distance_level = level.to_osm_level();
        self
    }

    /// Raw admin level at which the distance radius applies.
    pub fn distance_level(&self) -> u8 {
        self.distance_level
    }

    /// Scan every unit in the list.
    ///
    /// Candidates must carry exactly the same raw admin level as the unit,
    /// so level 0 (unknown) units only match each other.
    pub fn neighbors(&self, id: UnitId, search: &NeighborSearch) -> Result<Neighbors, GeometryError> {
        let mut scan = self.start(id, search);

        for candidate in self.list.ids() {
            self.consider(&mut scan, candidate)?;
        }

        Ok(self.finish(scan, "flat"))
    }

    /// Same result as [`Self::neighbors`], visiting far fewer candidates.
    ///
    /// The search starts in the unit's own subtree, then climbs one ancestor
    /// at a time and scans the sibling subtrees it has not seen yet (siblings,
    /// then cousins, and so on), finishing with the other roots. A subtree is
    /// skipped when its extent misses the unit's box or it holds no unit of
    /// the wanted level; every match lies inside all of its ancestors'
    /// extents, so skipping never loses one.
    pub fn neighbors_hierarchical(
        &self,
        id: UnitId,
        search: &NeighborSearch,
    ) -> Result<Neighbors, GeometryError> {
        let mut scan = self.start(id, search);
        if scan.unit.bbox.is_empty() {
            return Ok(self.finish(scan, "hierarchical"));
        }

        self.scan_subtree(&mut scan, id)?;

        let mut below = id;
        for ancestor in self.list.ancestors(id) {
            self.consider(&mut scan, ancestor)?;
            for &sibling in self.list.get(ancestor).children() {
                if sibling != below {
                    self.scan_subtree(&mut scan, sibling)?;
                }
            }
            below = ancestor;
        }

        for &root in self.list.roots() {
            if root != below {
                self.scan_subtree(&mut scan, root)?;
            }
        }

        scan.found.sort_unstable();
        Ok(self.finish(scan, "hierarchical"))
    }

    /// Hierarchical search for every unit, fanned out over the rayon pool.
    pub fn neighbors_all(
        &self,
        search: &NeighborSearch,
    ) -> Result<Vec<(UnitId, Neighbors)>, GeometryError> {
        let ids: Vec<UnitId> = self.list.ids().collect();
        ids.into_par_iter()
            .map(|id| self.neighbors_hierarchical(id, search).map(|found| (id, found)))
            .collect()
    }

    fn start<'s>(&'s self, id: UnitId, search: &'s NeighborSearch) -> Scan<'s> {
        Scan {
            id,
            unit: self.list.get(id),
            search,
            found: Vec::new(),
            examined: 0,
        }
    }

    fn finish(&self, scan: Scan<'_>, mode: &str) -> Neighbors {
        debug!(
            "{} neighbor search for {}: {} matches, {} candidates examined",
            mode,
            scan.unit.name,
            scan.found.len(),
            scan.examined
        );
        Neighbors {
            units: scan.found,
            examined: scan.examined,
        }
    }

    /// Depth-first walk of `root`'s subtree, pruned by subtree summaries.
    fn scan_subtree(&self, scan: &mut Scan<'_>, root: UnitId) -> Result<(), GeometryError> {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let summary = self.list.summary(node);
            if !summary.has_level(scan.unit.admin_level) || !summary.extent.intersects(&scan.unit.bbox) {
                continue;
            }
            self.consider(scan, node)?;
            stack.extend(self.list.get(node).children().iter().copied());
        }
        Ok(())
    }

    fn consider(&self, scan: &mut Scan<'_>, candidate: UnitId) -> Result<(), GeometryError> {
        scan.examined += 1;
        if candidate == scan.id && !scan.search.include_self {
            return Ok(());
        }
        if self.is_neighbor(scan.unit, self.list.get(candidate), scan.search)? {
            scan.found.push(candidate);
        }
        Ok(())
    }

    fn is_neighbor(
        &self,
        unit: &AdminUnit,
        candidate: &AdminUnit,
        search: &NeighborSearch,
    ) -> Result<bool, GeometryError> {
        if candidate.admin_level != unit.admin_level || !unit.bbox.intersects(&candidate.bbox) {
            return Ok(false);
        }
        if unit.admin_level == self.distance_level {
            return Ok(unit.bbox.distance_to(&candidate.bbox)? <= search.max_distance_km);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyBuilder;
    use crate::models::{BoundingBox, UnitRecord, EARTH_RADIUS_KM};

    fn record(id: i64, parent_id: i64, level: AdminLevel, bbox: BoundingBox) -> UnitRecord {
        let corners = match bbox.bounds() {
            Some((xmin, ymin, xmax, ymax)) => vec![Some((xmin, ymin)), Some((xmax, ymax))],
            None => Vec::new(),
        };
        UnitRecord {
            id,
            parent_id,
            name: format!("unit-{}", id),
            admin_level: level.to_osm_level(),
            population: 1,
            area: 1.0,
            density: 1.0,
            corners,
        }
    }

    /// Box of the given half-size centered `km` north of (20, 50).
    fn north_of_origin(km: f64, half: f64) -> BoundingBox {
        let lat = 50.0 + (km / EARTH_RADIUS_KM).to_degrees();
        BoundingBox::new(20.0 - half, lat - half, 20.0 + half, lat + half)
    }

    fn names(list: &AdminUnitList, ids: &[UnitId]) -> Vec<String> {
        ids.iter().map(|id| list.get(*id).name.clone()).collect()
    }

    #[test]
    fn test_locality_distance_cap() {
        let records = vec![
            record(1, 0, AdminLevel::County, north_of_origin(0.0, 1.0)),
            record(10, 1, AdminLevel::Locality, north_of_origin(0.0, 0.2)),
            record(11, 1, AdminLevel::Locality, north_of_origin(5.0, 0.2)),
            record(12, 1, AdminLevel::Locality, north_of_origin(20.0, 0.2)),
        ];
        let (list, _) = HierarchyBuilder::new().build(records);
        let finder = NeighborFinder::new(&list);
        let reference = list.find_by_id(10).unwrap();
        let search = NeighborSearch::within(10.0);

        let flat = finder.neighbors(reference, &search).unwrap();
        assert_eq!(names(&list, &flat.units), vec!["unit-11"]);

        let hier = finder.neighbors_hierarchical(reference, &search).unwrap();
        assert_eq!(hier.units, flat.units);
    }

    #[test]
    fn test_coarse_levels_ignore_distance() {
        let records = vec![
            record(1, 0, AdminLevel::Region, BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
            record(2, 1, AdminLevel::County, BoundingBox::new(0.0, 0.0, 5.0, 5.0)),
            record(3, 1, AdminLevel::County, BoundingBox::new(5.0, 0.0, 10.0, 5.0)),
            record(4, 1, AdminLevel::County, BoundingBox::new(6.0, 6.0, 10.0, 10.0)),
        ];
        let (list, _) = HierarchyBuilder::new().build(records);
        let finder = NeighborFinder::new(&list);
        let west = list.find_by_id(2).unwrap();

        let result = finder.neighbors(west, &NeighborSearch::within(1.0)).unwrap();
        assert_eq!(names(&list, &result.units), vec!["unit-3"]);
    }

    #[test]
    fn test_include_self() {
        let records = vec![
            record(1, 0, AdminLevel::Locality, north_of_origin(0.0, 0.1)),
            record(2, 0, AdminLevel::Locality, north_of_origin(1.0, 0.1)),
        ];
        let (list, _) = HierarchyBuilder::new().build(records);
        let finder = NeighborFinder::new(&list);
        let first = list.find_by_id(1).unwrap();

        let without = finder.neighbors(first, &NeighborSearch::within(5.0)).unwrap();
        assert_eq!(names(&list, &without.units), vec!["unit-2"]);

        let search = NeighborSearch::within(5.0).include_self(true);
        let with = finder.neighbors(first, &search).unwrap();
        assert_eq!(names(&list, &with.units), vec!["unit-1", "unit-2"]);
        assert_eq!(finder.neighbors_hierarchical(first, &search).unwrap().units, with.units);
    }

    #[test]
    fn test_empty_box_has_no_neighbors_and_unknown_levels_match() {
        let mut unknown = record(3, 0, AdminLevel::Locality, north_of_origin(0.0, 0.1));
        unknown.admin_level = 0;
        let mut other_unknown = record(4, 0, AdminLevel::Locality, north_of_origin(0.5, 0.1));
        other_unknown.admin_level = 0;
        let records = vec![
            record(1, 0, AdminLevel::Locality, BoundingBox::Empty),
            record(2, 0, AdminLevel::Locality, north_of_origin(0.0, 0.1)),
            unknown,
            other_unknown,
        ];
        let (list, _) = HierarchyBuilder::new().build(records);
        let finder = NeighborFinder::new(&list);
        let search = NeighborSearch::within(100.0).include_self(true);

        for id in list.ids() {
            let flat = finder.neighbors(id, &search).unwrap();
            let hier = finder.neighbors_hierarchical(id, &search).unwrap();
            assert_eq!(flat.units, hier.units);
        }
        let empty = list.find_by_id(1).unwrap();
        assert!(finder.neighbors(empty, &search).unwrap().units.is_empty());
        let unknown = list.find_by_id(3).unwrap();
        let found = finder.neighbors(unknown, &search).unwrap();
        assert_eq!(names(&list, &found.units), vec!["unit-3", "unit-4"]);
    }

    #[test]
    fn test_hierarchical_examines_fewer_candidates() {
        let mut records = Vec::new();
        for region in 0..4i64 {
            let x = region as f64 * 10.0;
            let region_id = 100 + region;
            records.push(record(region_id, 0, AdminLevel::Region, BoundingBox::new(x, 0.0, x + 9.0, 9.0)));
            for town in 0..10i64 {
                let tx = x + town as f64 * 0.8;
                records.push(record(
                    region_id * 100 + town,
                    region_id,
                    AdminLevel::Locality,
                    BoundingBox::new(tx, 1.0, tx + 1.0, 2.0),
                ));
            }
        }
        let (list, _) = HierarchyBuilder::new().build(records);
        let finder = NeighborFinder::new(&list);
        let town = list.find_by_id(10_005).unwrap();
        let search = NeighborSearch::within(500.0);

        let flat = finder.neighbors(town, &search).unwrap();
        let hier = finder.neighbors_hierarchical(town, &search).unwrap();
        assert_eq!(flat.units, hier.units);
        assert_eq!(flat.units.len(), 2);
        assert_eq!(flat.examined, list.len());
        assert!(hier.examined < flat.examined);
    }

    #[test]
    fn test_neighbors_across_region_border() {
        let records = vec![
            record(1, 0, AdminLevel::Region, BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            record(2, 0, AdminLevel::Region, BoundingBox::new(1.0, 0.0, 2.0, 1.0)),
            record(10, 1, AdminLevel::Locality, BoundingBox::new(0.95, 0.5, 1.0, 0.55)),
            record(20, 2, AdminLevel::Locality, BoundingBox::new(1.0, 0.5, 1.05, 0.55)),
        ];
        let (list, _) = HierarchyBuilder::new().build(records);
        let finder = NeighborFinder::new(&list);
        let west = list.find_by_id(10).unwrap();
        let search = NeighborSearch::within(10.0);

        let hier = finder.neighbors_hierarchical(west, &search).unwrap();
        assert_eq!(names(&list, &hier.units), vec!["unit-20"]);
        assert_eq!(hier.units, finder.neighbors(west, &search).unwrap().units);
    }

    #[test]
    fn test_raw_levels_must_match_exactly() {
        let mut ten = record(1, 0, AdminLevel::Neighbourhood, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        ten.admin_level = 10;
        let mut eleven = record(2, 0, AdminLevel::Neighbourhood, BoundingBox::new(0.5, 0.5, 1.5, 1.5));
        eleven.admin_level = 11;
        let (list, _) = HierarchyBuilder::new().build(vec![ten, eleven]);
        let finder = NeighborFinder::new(&list);
        let search = NeighborSearch::within(10.0);

        for id in list.ids() {
            assert!(finder.neighbors(id, &search).unwrap().units.is_empty());
            assert!(finder.neighbors_hierarchical(id, &search).unwrap().units.is_empty());
        }
    }

    #[test]
    fn test_custom_distance_level() {
        let records = vec![
            record(1, 0, AdminLevel::County, north_of_origin(0.0, 0.5)),
            record(2, 0, AdminLevel::County, north_of_origin(30.0, 0.5)),
        ];
        let (list, _) = HierarchyBuilder::new().build(records);
        let first = list.find_by_id(1).unwrap();
        let search = NeighborSearch::within(10.0);

        let default = NeighborFinder::new(&list);
        assert_eq!(default.neighbors(first, &search).unwrap().units.len(), 1);

        let capped = NeighborFinder::new(&list).with_distance_level(AdminLevel::County);
        assert!(capped.neighbors(first, &search).unwrap().units.is_empty());
    }

    #[test]
    fn test_neighbors_all_matches_single_queries() {
        let records = vec![
            record(1, 0, AdminLevel::Locality, north_of_origin(0.0, 0.1)),
            record(2, 0, AdminLevel::Locality, north_of_origin(2.0, 0.1)),
            record(3, 0, AdminLevel::Locality, north_of_origin(50.0, 0.1)),
        ];
        let (list, _) = HierarchyBuilder::new().build(records);
        let finder = NeighborFinder::new(&list);
        let search = NeighborSearch::within(10.0);

        let all = finder.neighbors_all(&search).unwrap();
        assert_eq!(all.len(), 3);
        for (id, result) in all {
            assert_eq!(result.units, finder.neighbors(id, &search).unwrap().units);
        }
    }
}
