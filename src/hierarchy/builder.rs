//! Flat record list to linked forest.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::AdminUnitList;
use crate::models::{UnitId, UnitRecord};

/// Counters collected while building a hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub units: usize,
    pub roots: usize,
    /// Units whose declared parent id matched no record
    pub dangling_parents: usize,
    /// Parent links dropped because they closed a cycle
    pub broken_cycles: usize,
    /// Records whose id had already been seen
    pub duplicate_ids: usize,
    /// Units that received a nonzero estimated density
    pub imputed: usize,
}

/// Builds an [`AdminUnitList`] from flat records keyed by id and parent id.
#[derive(Debug, Clone)]
pub struct HierarchyBuilder {
    impute: bool,
}

impl Default for HierarchyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self { impute: true }
    }

    /// Whether to run [`AdminUnitList::fix_missing_values`] after linking.
    pub fn impute(mut self, impute: bool) -> Self {
        self.impute = impute;
        self
    }

    /// Link records into a forest.
    ///
    /// Ids are expected to be unique; a repeated id shadows the earlier unit
    /// in the id map (last write wins) and the shadowed unit receives no
    /// children. A parent id of 0, or one that matches no record, leaves the
    /// unit as a root. Links that would close a cycle are dropped.
    pub fn build<I>(&self, records: I) -> (AdminUnitList, BuildReport)
    where
        I: IntoIterator<Item = UnitRecord>,
    {
        let mut report = BuildReport::default();
        let mut list = AdminUnitList::default();

        // Pass 1: construct units and index them by source id
        for record in records {
            let id = UnitId(list.units.len());
            if list.by_id.insert(record.id, id).is_some() {
                warn!("Duplicate unit id {} ({}), last one wins", record.id, record.name);
                report.duplicate_ids += 1;
            }
            list.units.push(record.to_unit());
        }

        // Pass 2: resolve declared parents through the id map
        let mut parents: Vec<Option<UnitId>> = Vec::with_capacity(list.units.len());
        for unit in &list.units {
            let parent = match unit.parent_id {
                0 => None,
                pid => {
                    let resolved = list.by_id.get(&pid).copied();
                    if resolved.is_none() {
                        debug!("Unit {} references missing parent {}", unit.id, pid);
                        report.dangling_parents += 1;
                    }
                    resolved
                }
            };
            parents.push(parent);
        }

        report.broken_cycles = break_cycles(&mut parents, &list);

        // Children follow from the final parent links, in source order
        for (i, parent) in parents.iter().enumerate() {
            let id = UnitId(i);
            list.units[i].parent = *parent;
            match parent {
                Some(p) => list.units[p.0].children.push(id),
                None => list.roots.push(id),
            }
        }

        list.summarize();

        report.units = list.units.len();
        report.roots = list.roots.len();

        if self.impute {
            report.imputed = list.fix_missing_values();
        }

        info!(
            "Built hierarchy: {} units, {} roots, {} dangling parents, {} cycles broken, {} imputed",
            report.units, report.roots, report.dangling_parents, report.broken_cycles, report.imputed
        );

        (list, report)
    }
}

/// Drop every parent link that closes a cycle. Returns how many were dropped.
///
/// Each walk follows parent links from a start unit until it reaches a root or
/// a unit finished by an earlier walk. Reaching a unit on the current path
/// means the last link taken closed a loop, so that link is cut.
fn break_cycles(parents: &mut [Option<UnitId>], list: &AdminUnitList) -> usize {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnPath,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; parents.len()];
    let mut path: Vec<usize> = Vec::new();
    let mut broken = 0;

    for start in 0..parents.len() {
        let mut current = start;
        loop {
            match marks[current] {
                Mark::Done => break,
                Mark::OnPath => {
                    if let Some(&last) = path.last() {
                        let unit = &list.units[last];
                        warn!(
                            "Parent link {} -> {} closes a cycle, treating {} as a root",
                            unit.id, unit.parent_id, unit.name
                        );
                        parents[last] = None;
                        broken += 1;
                    }
                    break;
                }
                Mark::Unvisited => {
                    marks[current] = Mark::OnPath;
                    path.push(current);
                    match parents[current] {
                        Some(p) => current = p.0,
                        None => break,
                    }
                }
            }
        }
        for visited in path.drain(..) {
            marks[visited] = Mark::Done;
        }
    }

    broken
}
