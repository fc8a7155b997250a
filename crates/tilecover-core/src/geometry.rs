//! Query geometry construction.
//!
//! An area of interest is either an axis-aligned bounding box (optionally
//! buffered outward) or an ordered set of points. Points are turned into a
//! region by taking the convex hull of the points and the path through them,
//! so the area enclosed by a winding route is queried and not just a thin
//! corridor along it.

use crate::crs::Crs;
use crate::{Result, TileCoverError};
use geo::{Area, ConvexHull, Coord, Geometry, LineString, Polygon};
use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, PI};
use tracing::{debug, warn};

/// Default radius of the disk built around a single query point.
pub const DEFAULT_POINT_RADIUS: f64 = 0.001;

/// Default number of arc segments per quarter circle.
pub const DEFAULT_QUADRANT_SEGMENTS: u32 = 8;

/// The user's area of interest, in the input CRS.
#[derive(Debug, Clone, PartialEq)]
pub enum AreaOfInterest {
    /// Axis-aligned bounding box with an optional outward buffer.
    BoundingBox {
        /// Minimum X (longitude).
        min_x: f64,
        /// Minimum Y (latitude).
        min_y: f64,
        /// Maximum X (longitude).
        max_x: f64,
        /// Maximum Y (latitude).
        max_y: f64,
        /// Outward buffer distance in input units (0 for none).
        buffer: f64,
    },
    /// Ordered points forming a path.
    Points(Vec<Coord<f64>>),
}

impl AreaOfInterest {
    /// Convenience constructor for an unbuffered bounding box.
    pub fn bbox(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        AreaOfInterest::BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
            buffer: 0.0,
        }
    }
}

/// How a query geometry was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Bounding box (buffered or not).
    Bbox,
    /// Convex hull of two or more points.
    Path,
    /// Disk around a single point.
    Point,
}

/// The area of interest as a geometry, tagged with its origin.
///
/// The shape is normally a polygon. The hull of collinear points has no area,
/// so it is kept as the line segment between the extreme points instead.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryGeometry {
    /// Region to intersect tiles with.
    pub shape: Geometry<f64>,
    /// How the region was built.
    pub kind: QueryKind,
}

impl QueryGeometry {
    /// Whether this geometry came from a bounding box.
    ///
    /// Only bbox queries get coverage and overrun statistics.
    pub fn is_bbox(&self) -> bool {
        self.kind == QueryKind::Bbox
    }

    /// Planar area of the shape in its current CRS units.
    pub fn area(&self) -> f64 {
        self.shape.unsigned_area()
    }

    /// Replace the shape (after reprojection), keeping the tag.
    pub fn with_shape(&self, shape: Geometry<f64>) -> Self {
        Self {
            shape,
            kind: self.kind,
        }
    }
}

/// Builds [`QueryGeometry`] values from an [`AreaOfInterest`].
#[derive(Debug, Clone, Copy)]
pub struct QueryGeometryBuilder {
    point_radius: f64,
    quadrant_segments: u32,
}

impl Default for QueryGeometryBuilder {
    fn default() -> Self {
        Self {
            point_radius: DEFAULT_POINT_RADIUS,
            quadrant_segments: DEFAULT_QUADRANT_SEGMENTS,
        }
    }
}

impl QueryGeometryBuilder {
    /// Create a builder with default radius and segment count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the radius of the disk used for a single point.
    ///
    /// A radius that is not a positive finite number is ignored and the
    /// current one kept, so the disk always has an area.
    pub fn with_point_radius(mut self, radius: f64) -> Self {
        if radius.is_finite() && radius > 0.0 {
            self.point_radius = radius;
        } else {
            warn!(radius, kept = self.point_radius, "Ignoring invalid point radius");
        }
        self
    }

    /// Set the number of arc segments per quarter circle.
    pub fn with_quadrant_segments(mut self, segments: u32) -> Self {
        self.quadrant_segments = segments.max(1);
        self
    }

    /// Build the query geometry in the input CRS.
    pub fn build(&self, area: &AreaOfInterest, input_crs: &Crs) -> Result<QueryGeometry> {
        match area {
            AreaOfInterest::BoundingBox {
                min_x,
                min_y,
                max_x,
                max_y,
                buffer,
            } => self.build_bbox((*min_x, *min_y, *max_x, *max_y), *buffer, input_crs),
            AreaOfInterest::Points(points) => self.build_points(points, input_crs),
        }
    }

    fn build_bbox(
        &self,
        bounds: (f64, f64, f64, f64),
        buffer: f64,
        input_crs: &Crs,
    ) -> Result<QueryGeometry> {
        let (min_x, min_y, max_x, max_y) = bounds;

        for (x, y) in [(min_x, min_y), (max_x, max_y)] {
            input_crs
                .validate_coord(x, y)
                .map_err(|reason| TileCoverError::invalid_bounds(bounds, reason))?;
        }
        if min_x >= max_x {
            return Err(TileCoverError::invalid_bounds(bounds, "min_x must be less than max_x"));
        }
        if min_y >= max_y {
            return Err(TileCoverError::invalid_bounds(bounds, "min_y must be less than max_y"));
        }
        if !buffer.is_finite() || buffer < 0.0 {
            return Err(TileCoverError::invalid_bounds(
                bounds,
                format!("buffer must be a non-negative distance, got {}", buffer),
            ));
        }

        let shape = if buffer > 0.0 {
            rounded_rect(bounds, buffer, self.quadrant_segments)
        } else {
            geo::Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y }).to_polygon()
        };

        debug!(
            min_x,
            min_y,
            max_x,
            max_y,
            buffer,
            area = shape.unsigned_area(),
            "Built bbox query geometry"
        );

        Ok(QueryGeometry {
            shape: shape.into(),
            kind: QueryKind::Bbox,
        })
    }

    fn build_points(&self, points: &[Coord<f64>], input_crs: &Crs) -> Result<QueryGeometry> {
        if points.is_empty() {
            return Err(TileCoverError::InvalidInput(
                "point set is empty".to_string(),
            ));
        }

        for (i, p) in points.iter().enumerate() {
            input_crs
                .validate_coord(p.x, p.y)
                .map_err(|reason| TileCoverError::InvalidInput(format!("point {}: {}", i + 1, reason)))?;
        }

        let first = points[0];
        if points.iter().all(|p| *p == first) {
            debug!(x = first.x, y = first.y, radius = self.point_radius, "Built point query disk");
            return Ok(QueryGeometry {
                shape: disk(first, self.point_radius, self.quadrant_segments).into(),
                kind: QueryKind::Point,
            });
        }

        // The hull of the path through the points equals the hull of the
        // points themselves, since every path segment lies between two of them.
        let path = LineString::from(points.to_vec());
        let hull = path.convex_hull();

        let shape: Geometry<f64> = if hull.unsigned_area() > 0.0 {
            hull.into()
        } else {
            extreme_segment(points).into()
        };

        debug!(
            points = points.len(),
            area = shape.unsigned_area(),
            "Built path query geometry"
        );

        Ok(QueryGeometry {
            shape,
            kind: QueryKind::Path,
        })
    }
}

/// Exact outward buffer of a rectangle: straight edges pushed out by `distance`
/// joined by quarter-circle arcs at the corners.
fn rounded_rect(
    (min_x, min_y, max_x, max_y): (f64, f64, f64, f64),
    distance: f64,
    quadrant_segments: u32,
) -> Polygon<f64> {
    // Corner centres in counter-clockwise order, each with the start angle of its arc
    let corners = [
        (max_x, min_y, -FRAC_PI_2),
        (max_x, max_y, 0.0),
        (min_x, max_y, FRAC_PI_2),
        (min_x, min_y, PI),
    ];

    let mut ring = Vec::with_capacity(4 * (quadrant_segments as usize + 1) + 1);
    for (cx, cy, start) in corners {
        for i in 0..=quadrant_segments {
            let angle = start + FRAC_PI_2 * i as f64 / quadrant_segments as f64;
            ring.push(Coord {
                x: cx + distance * angle.cos(),
                y: cy + distance * angle.sin(),
            });
        }
    }

    Polygon::new(LineString::from(ring), vec![])
}

/// Regular polygon approximating a circle of `radius` around `center`.
fn disk(center: Coord<f64>, radius: f64, quadrant_segments: u32) -> Polygon<f64> {
    let n = 4 * quadrant_segments;
    let ring: Vec<Coord<f64>> = (0..n)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            Coord {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            }
        })
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}

/// Segment between the two extreme points of a collinear set.
fn extreme_segment(points: &[Coord<f64>]) -> LineString<f64> {
    let lexicographic = |a: &&Coord<f64>, b: &&Coord<f64>| {
        a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
    };
    // Non-empty is checked by the caller; fall back to the first point regardless
    let lo = points.iter().min_by(lexicographic).copied().unwrap_or(points[0]);
    let hi = points.iter().max_by(lexicographic).copied().unwrap_or(points[0]);
    LineString::from(vec![lo, hi])
}
