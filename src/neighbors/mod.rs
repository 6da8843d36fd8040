//! Neighbor discovery over a built hierarchy.
//!
//! Two units are neighbors when they sit at the same admin level and their
//! bounding boxes intersect. At the distance-capped level (localities by
//! default) the haversine distance between box centers must also stay within
//! the search radius, since many small boxes overlap without being close.

mod finder;

pub use finder::{NeighborFinder, NeighborSearch, Neighbors};
