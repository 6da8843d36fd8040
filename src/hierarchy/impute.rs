//! Filling unknown population and density from ancestors.

use tracing::debug;

use super::AdminUnitList;
use crate::models::UnitId;

impl AdminUnitList {
    /// Estimate missing statistics for every unit whose density and
    /// population are both unknown (zero).
    ///
    /// The density comes from [`Self::estimated_density`] and the population
    /// is back-computed as `area × density`, truncated. Running this again is
    /// a no-op. Returns how many units received a nonzero density.
    pub fn fix_missing_values(&mut self) -> usize {
        let mut imputed = 0;
        for i in 0..self.units.len() {
            if !self.units[i].needs_imputation() {
                continue;
            }
            let density = self.estimated_density(UnitId(i));
            let unit = &mut self.units[i];
            unit.density = density;
            unit.population = (unit.area * density) as u64;
            if density != 0.0 {
                debug!(
                    "Imputed {}: density {} population {}",
                    unit.name, unit.density, unit.population
                );
                imputed += 1;
            }
        }
        imputed
    }

    /// Density of the nearest ancestor with a nonzero density, or 0.
    ///
    /// The walk moves one resolved parent at a time, so a missing link in the
    /// middle of the chain ends the search.
    pub fn estimated_density(&self, id: UnitId) -> f64 {
        for ancestor in self.ancestors(id) {
            let density = self.get(ancestor).density;
            if density != 0.0 {
                return density;
            }
        }
        0.0
    }
}

#[cfg(test)]
mod tests {
    use crate::hierarchy::HierarchyBuilder;
    use crate::models::UnitRecord;

    fn unit(id: i64, parent_id: i64, population: u64, area: f64, density: f64) -> UnitRecord {
        UnitRecord {
            id,
            parent_id,
            name: format!("unit-{}", id),
            admin_level: 6,
            population,
            area,
            density,
            corners: Vec::new(),
        }
    }

    #[test]
    fn test_inherits_parent_density() {
        let records = vec![unit(1, 0, 100_000, 2000.0, 50.0), unit(2, 1, 0, 100.0, 0.0)];
        let (list, report) = HierarchyBuilder::new().build(records);

        let child = list.get(list.find_by_id(2).unwrap());
        assert_eq!(child.density, 50.0);
        assert_eq!(child.population, 5000);
        assert_eq!(report.imputed, 1);
    }

    #[test]
    fn test_skips_unknown_intermediate_ancestors() {
        let records = vec![
            unit(1, 0, 0, 0.0, 120.5),
            unit(2, 1, 0, 0.0, 0.0),
            unit(3, 2, 0, 10.0, 0.0),
        ];
        let (list, _) = HierarchyBuilder::new().build(records);
        let leaf = list.get(list.find_by_id(3).unwrap());
        assert_eq!(leaf.density, 120.5);
        assert_eq!(leaf.population, 1205);
    }

    #[test]
    fn test_population_is_truncated() {
        let records = vec![unit(1, 0, 1, 1.0, 3.3), unit(2, 1, 0, 2.0, 0.0)];
        let (list, _) = HierarchyBuilder::new().build(records);
        assert_eq!(list.get(list.find_by_id(2).unwrap()).population, 6);
    }

    #[test]
    fn test_missing_link_ends_search() {
        // 3 -> 2 is dangling; 1 has a density but is unreachable from 3
        let records = vec![unit(1, 0, 0, 0.0, 80.0), unit(3, 2, 0, 10.0, 0.0)];
        let (list, report) = HierarchyBuilder::new().build(records);
        let leaf = list.get(list.find_by_id(3).unwrap());
        assert_eq!(leaf.density, 0.0);
        assert_eq!(leaf.population, 0);
        assert_eq!(report.imputed, 0);
    }

    #[test]
    fn test_known_values_untouched() {
        let records = vec![
            unit(1, 0, 0, 0.0, 50.0),
            unit(2, 1, 700, 100.0, 0.0),
            unit(3, 1, 0, 100.0, 9.0),
        ];
        let (list, _) = HierarchyBuilder::new().build(records);
        let two = list.get(list.find_by_id(2).unwrap());
        assert_eq!((two.population, two.density), (700, 0.0));
        let three = list.get(list.find_by_id(3).unwrap());
        assert_eq!((three.population, three.density), (0, 9.0));
    }

    #[test]
    fn test_imputation_is_idempotent() {
        let records = vec![
            unit(1, 0, 0, 0.0, 42.0),
            unit(2, 1, 0, 33.3, 0.0),
            unit(3, 2, 0, 7.7, 0.0),
            unit(4, 0, 0, 5.0, 0.0),
        ];
        let (mut list, _) = HierarchyBuilder::new().build(records);
        let once: Vec<(u64, f64)> = list.units().iter().map(|u| (u.population, u.density)).collect();
        list.fix_missing_values();
        let twice: Vec<(u64, f64)> = list.units().iter().map(|u| (u.population, u.density)).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_builder_can_skip_imputation() {
        let records = vec![unit(1, 0, 0, 0.0, 50.0), unit(2, 1, 0, 100.0, 0.0)];
        let (mut list, report) = HierarchyBuilder::new().impute(false).build(records);
        assert_eq!(report.imputed, 0);
        let child = list.find_by_id(2).unwrap();
        assert_eq!(list.get(child).population, 0);

        assert_eq!(list.fix_missing_values(), 1);
        assert_eq!(list.get(child).population, 5000);
    }
}
