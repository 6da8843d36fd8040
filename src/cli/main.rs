//! Command line front end.
//!
//! Loads an admin-unit dataset, builds the hierarchy and runs listing,
//! name selection and neighbor queries against it.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use larch::config::Config;
use larch::ingest::read_units;
use larch::{AdminLevel, AdminUnitList, HierarchyBuilder, NeighborFinder, SortKey, UnitId};

#[derive(Parser, Debug)]
#[command(name = "larch")]
#[command(about = "Query administrative unit hierarchies")]
struct Args {
    /// Admin units CSV file (may be .gz)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Field delimiter, overrides the config file
    #[arg(long)]
    delimiter: Option<char>,

    /// Skip filling in missing population and density
    #[arg(long)]
    no_impute: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print units, optionally filtered and sorted
    List {
        #[arg(long, default_value = "0")]
        offset: usize,

        #[arg(long, default_value = "100")]
        limit: usize,

        /// Only units at this level (name or OSM number)
        #[arg(long)]
        level: Option<AdminLevel>,

        #[arg(long, value_enum)]
        sort: Option<SortKey>,

        /// Reverse the sort order
        #[arg(long)]
        desc: bool,
    },

    /// Print units whose name matches a pattern
    Select {
        pattern: String,

        /// Treat the pattern as a regular expression matching the whole name
        #[arg(long)]
        regex: bool,
    },

    /// Find neighbors of a unit (by source id), or of every unit
    Neighbors {
        /// Source id of the unit
        #[arg(required_unless_present = "all")]
        id: Option<i64>,

        /// Run for every unit and print match counts
        #[arg(long)]
        all: bool,

        /// Distance radius in km, overrides the config file
        #[arg(long)]
        max_distance: Option<f64>,

        /// Keep the unit itself in its result
        #[arg(long)]
        include_self: bool,

        /// Scan the whole list instead of pruning by hierarchy
        #[arg(long)]
        flat: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Check that flat and hierarchical neighbor search agree for every unit
    Crosscheck {
        #[arg(long)]
        max_distance: Option<f64>,
    },
}

#[derive(Serialize)]
struct NeighborOutput<'a> {
    id: i64,
    name: &'a str,
    distance_km: Option<f64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(file) = &args.file {
        config.input.path = Some(file.clone());
    }
    if let Some(delimiter) = args.delimiter {
        config.input.delimiter = delimiter;
    }

    let path = config
        .input
        .path
        .clone()
        .context("No input file given (use --file or [input] path in the config)")?;
    let (records, ingest_report) = read_units(&path, &config.input.ingest_options()?)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    if ingest_report.skipped_rows > 0 {
        warn!("{} rows were skipped", ingest_report.skipped_rows);
    }

    let (list, build_report) = HierarchyBuilder::new()
        .impute(!args.no_impute)
        .build(records);
    info!("Build report: {}", serde_json::to_string(&build_report)?);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.command {
        Command::List {
            offset,
            limit,
            level,
            sort,
            desc,
        } => {
            let mut query = list.query().offset(offset).limit(limit);
            if let Some(level) = level {
                query = query.filter(move |u| u.is_at(level));
            }
            if let Some(key) = sort {
                query = query.sort(move |a, b| {
                    let ord = key.compare(a, b);
                    if desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                });
            }
            for unit in query.execute() {
                writeln!(out, "{}", unit)?;
            }
        }

        Command::Select { pattern, regex } => {
            let units = list
                .select_by_name(&pattern, regex)
                .with_context(|| format!("Invalid pattern {:?}", pattern))?;
            for unit in units {
                writeln!(out, "{}", unit)?;
            }
        }

        Command::Neighbors {
            id,
            all,
            max_distance,
            include_self,
            flat,
            json,
        } => {
            let mut neighbor_config = config.neighbors.clone();
            if let Some(max_distance) = max_distance {
                neighbor_config.max_distance_km = max_distance;
            }
            neighbor_config.include_self |= include_self;
            let search = neighbor_config.search();
            let finder = NeighborFinder::new(&list).with_distance_level(neighbor_config.distance_level);

            if all {
                for (unit_id, found) in finder.neighbors_all(&search)? {
                    let unit = list.get(unit_id);
                    writeln!(out, "{}\t{}\t{}", unit.id, unit.name, found.units.len())?;
                }
                return Ok(());
            }

            // clap guarantees an id when --all is absent
            let source_id = id.context("Missing unit id")?;
            let unit_id = list
                .find_by_id(source_id)
                .with_context(|| format!("No unit with id {}", source_id))?;

            let found = if flat {
                finder.neighbors(unit_id, &search)?
            } else {
                finder.neighbors_hierarchical(unit_id, &search)?
            };
            info!(
                "{} neighbors, {} candidates examined",
                found.units.len(),
                found.examined
            );

            let rows = neighbor_rows(&list, unit_id, &found.units);
            if json {
                serde_json::to_writer_pretty(&mut out, &rows)?;
                writeln!(out)?;
            } else {
                for row in rows {
                    match row.distance_km {
                        Some(d) => writeln!(out, "{}\t{}\t{:.2} km", row.id, row.name, d)?,
                        None => writeln!(out, "{}\t{}", row.id, row.name)?,
                    }
                }
            }
        }

        Command::Crosscheck { max_distance } => {
            let mut neighbor_config = config.neighbors.clone();
            if let Some(max_distance) = max_distance {
                neighbor_config.max_distance_km = max_distance;
            }
            let search = neighbor_config.search();
            let finder = NeighborFinder::new(&list).with_distance_level(neighbor_config.distance_level);

            let ids: Vec<UnitId> = list.ids().collect();
            let outcomes = ids
                .par_iter()
                .map(|&id| -> Result<_, larch::GeometryError> {
                    let flat = finder.neighbors(id, &search)?;
                    let hier = finder.neighbors_hierarchical(id, &search)?;
                    Ok((id, flat.units == hier.units, flat.examined, hier.examined))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let mismatches: Vec<UnitId> = outcomes
                .iter()
                .filter(|(_, same, _, _)| !same)
                .map(|(id, _, _, _)| *id)
                .collect();
            let flat_total: usize = outcomes.iter().map(|o| o.2).sum();
            let hier_total: usize = outcomes.iter().map(|o| o.3).sum();

            writeln!(
                out,
                "{} units checked, {} mismatches, candidates examined: flat {} / hierarchical {}",
                outcomes.len(),
                mismatches.len(),
                flat_total,
                hier_total
            )?;
            for id in &mismatches {
                writeln!(out, "mismatch: {}", list.get(*id))?;
            }
            if !mismatches.is_empty() {
                anyhow::bail!("flat and hierarchical neighbor search disagree");
            }
        }
    }

    Ok(())
}

fn neighbor_rows<'a>(list: &'a AdminUnitList, origin: UnitId, found: &[UnitId]) -> Vec<NeighborOutput<'a>> {
    let origin_box = list.get(origin).bbox;
    found
        .iter()
        .map(|id| {
            let unit = list.get(*id);
            NeighborOutput {
                id: unit.id,
                name: &unit.name,
                distance_km: origin_box.distance_to(&unit.bbox).ok(),
            }
        })
        .collect()
}
