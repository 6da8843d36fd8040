//! Axis-aligned bounding boxes in longitude/latitude.

use std::fmt;

use geo::Point;
use geo_types::{coord, Rect};
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Mean Earth radius used by [`BoundingBox::distance_to`], in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Bounding box envelope over decimal-degree coordinates (x = lon, y = lat).
///
/// A box is either `Empty` (no extent yet) or `Bounded` with
/// `xmin <= xmax` and `ymin <= ymax`. Growing operations never shrink it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BoundingBox {
    #[default]
    Empty,
    Bounded {
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    },
}

impl BoundingBox {
    /// Build a box from two corners, normalizing the order of each axis.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        BoundingBox::Bounded {
            xmin: x1.min(x2),
            ymin: y1.min(y2),
            xmax: x1.max(x2),
            ymax: y1.max(y2),
        }
    }

    /// Fold a sequence of points into a box. No points gives an empty box.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut bbox = BoundingBox::Empty;
        for (x, y) in points {
            bbox.add_point(x, y);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, BoundingBox::Empty)
    }

    /// Bounds as `(xmin, ymin, xmax, ymax)`, or `None` when empty.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        match *self {
            BoundingBox::Empty => None,
            BoundingBox::Bounded {
                xmin,
                ymin,
                xmax,
                ymax,
            } => Some((xmin, ymin, xmax, ymax)),
        }
    }

    /// Grow the box to include `(x, y)`. An empty box collapses to that point.
    pub fn add_point(&mut self, x: f64, y: f64) {
        match self {
            BoundingBox::Empty => {
                *self = BoundingBox::Bounded {
                    xmin: x,
                    ymin: y,
                    xmax: x,
                    ymax: y,
                };
            }
            BoundingBox::Bounded {
                xmin,
                ymin,
                xmax,
                ymax,
            } => {
                *xmin = xmin.min(x);
                *ymin = ymin.min(y);
                *xmax = xmax.max(x);
                *ymax = ymax.max(y);
            }
        }
    }

    /// Whether the point lies inside the box, edges included.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        match self.bounds() {
            None => false,
            Some((xmin, ymin, xmax, ymax)) => xmin <= x && x <= xmax && ymin <= y && y <= ymax,
        }
    }

    /// Whether `other` lies entirely inside this box.
    ///
    /// An empty box is contained by every box, including an empty one.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        match (self.bounds(), other.bounds()) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some((axmin, aymin, axmax, aymax)), Some((bxmin, bymin, bxmax, bymax))) => {
                axmin <= bxmin && axmax >= bxmax && aymin <= bymin && aymax >= bymax
            }
        }
    }

    /// Whether the two boxes overlap on both axes. Touching edges count.
    ///
    /// An empty box overlaps nothing.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        match (self.bounds(), other.bounds()) {
            (Some((axmin, aymin, axmax, aymax)), Some((bxmin, bymin, bxmax, bymax))) => {
                axmin <= bxmax && bxmin <= axmax && aymin <= bymax && bymin <= aymax
            }
            _ => false,
        }
    }

    /// Union in place: grow this box to also cover `other`.
    ///
    /// An empty `self` becomes exactly `other`; an empty `other` is a no-op.
    pub fn add(&mut self, other: &BoundingBox) -> &mut Self {
        if let Some((xmin, ymin, xmax, ymax)) = other.bounds() {
            self.add_point(xmin, ymin);
            self.add_point(xmax, ymax);
        }
        self
    }

    /// Union without mutating either operand.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut out = *self;
        out.add(other);
        out
    }

    pub fn center_x(&self) -> Result<f64, GeometryError> {
        let (xmin, _, xmax, _) = self.bounds().ok_or(GeometryError::EmptyGeometry)?;
        Ok((xmax + xmin) / 2.0)
    }

    pub fn center_y(&self) -> Result<f64, GeometryError> {
        let (_, ymin, _, ymax) = self.bounds().ok_or(GeometryError::EmptyGeometry)?;
        Ok((ymax + ymin) / 2.0)
    }

    /// Center as a `geo` point (x = lon, y = lat).
    pub fn center(&self) -> Result<Point<f64>, GeometryError> {
        Ok(Point::new(self.center_x()?, self.center_y()?))
    }

    /// Great-circle distance in kilometers between the centers of two boxes.
    ///
    /// This is a center-to-center approximation computed with the haversine
    /// formula on a sphere of radius [`EARTH_RADIUS_KM`]. It is not the minimum
    /// distance between the two rectangles: overlapping boxes with distinct
    /// centers report a positive distance.
    pub fn distance_to(&self, other: &BoundingBox) -> Result<f64, GeometryError> {
        let a = self.center()?;
        let b = other.center()?;

        let lat1 = a.y().to_radians();
        let lat2 = b.y().to_radians();
        let dlat = (b.y() - a.y()).to_radians();
        let dlon = (b.x() - a.x()).to_radians();

        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

        Ok(EARTH_RADIUS_KM * c)
    }

    /// Convert to a `geo` rectangle, if there is any extent.
    pub fn to_rect(&self) -> Option<Rect<f64>> {
        self.bounds().map(|(xmin, ymin, xmax, ymax)| {
            Rect::new(coord! { x: xmin, y: ymin }, coord! { x: xmax, y: ymax })
        })
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        BoundingBox::Bounded {
            xmin: rect.min().x,
            ymin: rect.min().y,
            xmax: rect.max().x,
            ymax: rect.max().y,
        }
    }
}

impl PartialEq for BoundingBox {
    fn eq(&self, other: &Self) -> bool {
        self.bounds() == other.bounds()
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds() {
            None => write!(f, "BoundingBox{{empty}}"),
            Some((xmin, ymin, xmax, ymax)) => write!(
                f,
                "BoundingBox{{xmin={}, ymin={}, xmax={}, ymax={}}}",
                xmin, ymin, xmax, ymax
            ),
        }
    }
}
