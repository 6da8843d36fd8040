//! Filter, sort and paginate built units.

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io::{self, Write};

use crate::hierarchy::AdminUnitList;
use crate::models::{AdminLevel, AdminUnit};

type Predicate<'a> = Box<dyn Fn(&AdminUnit) -> bool + 'a>;
type Comparator<'a> = Box<dyn Fn(&AdminUnit, &AdminUnit) -> Ordering + 'a>;

/// Fluent query over an [`AdminUnitList`].
///
/// ```
/// # use larch::{AdminLevel, AdminUnitList};
/// # let (list, _) = AdminUnitList::from_records(Vec::new());
/// let largest = list
///     .query()
///     .filter(|u| u.is_at(AdminLevel::County))
///     .sort(|a, b| b.area.total_cmp(&a.area))
///     .limit(10)
///     .execute();
/// # assert!(largest.is_empty());
/// ```
pub struct UnitQuery<'a> {
    list: &'a AdminUnitList,
    predicate: Option<Predicate<'a>>,
    comparator: Option<Comparator<'a>>,
    offset: usize,
    limit: Option<usize>,
}

impl<'a> UnitQuery<'a> {
    pub fn new(list: &'a AdminUnitList) -> Self {
        Self {
            list,
            predicate: None,
            comparator: None,
            offset: 0,
            limit: None,
        }
    }

    /// Replace the current predicate.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AdminUnit) -> bool + 'a,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub fn and<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AdminUnit) -> bool + 'a,
    {
        let combined: Predicate<'a> = match self.predicate.take() {
            Some(current) => Box::new(move |u: &AdminUnit| current(u) && predicate(u)),
            None => Box::new(predicate),
        };
        self.predicate = Some(combined);
        self
    }

    pub fn or<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AdminUnit) -> bool + 'a,
    {
        let combined: Predicate<'a> = match self.predicate.take() {
            Some(current) => Box::new(move |u: &AdminUnit| current(u) || predicate(u)),
            None => Box::new(predicate),
        };
        self.predicate = Some(combined);
        self
    }

    /// Order results; the sort is stable, so ties keep source order.
    pub fn sort<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&AdminUnit, &AdminUnit) -> Ordering + 'a,
    {
        self.comparator = Some(Box::new(comparator));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn execute(self) -> Vec<&'a AdminUnit> {
        let mut selected: Vec<&'a AdminUnit> = match &self.predicate {
            Some(predicate) => self.list.units().iter().filter(|u| predicate(*u)).collect(),
            None => self.list.units().iter().collect(),
        };
        if let Some(comparator) = &self.comparator {
            selected.sort_by(|a, b| comparator(*a, *b));
        }
        selected
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Sort keys exposed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Name,
    Level,
    Population,
    Area,
    Density,
}

impl SortKey {
    pub fn compare(&self, a: &AdminUnit, b: &AdminUnit) -> Ordering {
        match self {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Level => a.admin_level.cmp(&b.admin_level),
            SortKey::Population => a.population.cmp(&b.population),
            SortKey::Area => a.area.total_cmp(&b.area),
            SortKey::Density => a.density.total_cmp(&b.density),
        }
    }
}

impl AdminUnitList {
    pub fn query(&self) -> UnitQuery<'_> {
        UnitQuery::new(self)
    }

    /// Units whose name matches `pattern`.
    ///
    /// With `regex` the whole name must match the expression; otherwise a
    /// plain substring test is used.
    pub fn select_by_name(&self, pattern: &str, regex: bool) -> Result<Vec<&AdminUnit>, regex::Error> {
        if regex {
            let re = Regex::new(&format!("^(?:{})$", pattern))?;
            Ok(self.query().filter(move |u| re.is_match(&u.name)).execute())
        } else {
            let pattern = pattern.to_string();
            Ok(self.query().filter(move |u| u.name.contains(pattern.as_str())).execute())
        }
    }

    /// Units whose raw level is exactly `level`'s OSM number, in source order.
    pub fn at_level(&self, level: AdminLevel) -> Vec<&AdminUnit> {
        self.query().filter(move |u| u.is_at(level)).execute()
    }

    /// Write at most `limit` units starting at `offset`, one per line.
    pub fn list<W: Write>(&self, out: &mut W, offset: usize, limit: usize) -> io::Result<()> {
        for unit in self.query().offset(offset).limit(limit).execute() {
            writeln!(out, "{}", unit)?;
        }
        Ok(())
    }
}
