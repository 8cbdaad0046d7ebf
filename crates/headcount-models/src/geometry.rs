//! Frame geometry: points, bounding boxes, counting lines and zones.
//!
//! All coordinates are in frame pixels. Points travel on the wire as
//! `[x, y]` pairs, lines as `[[x1, y1], [x2, y2]]` and zones as a list of
//! points, matching the request body the front-end forwards.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Tolerance used for "exactly on the line/edge" decisions.
const EPSILON: f64 = 1e-9;

/// A point in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (f64, f64) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Axis-aligned bounding box in `x1, y1, x2, y2` form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Geometric center of the box, the reference point for line and zone tests.
    pub fn centroid(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Side of a directed line a point was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// Last recorded side of a track; `Unknown` until the first observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSide {
    #[default]
    Unknown,
    Left,
    Right,
}

impl From<Side> for LineSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => LineSide::Left,
            Side::Right => LineSide::Right,
        }
    }
}

/// Directed counting line from `start` to `end`.
///
/// The side of a point is the sign of `(end - start) x (point - start)`:
/// positive is [`Side::Left`], negative is [`Side::Right`] (mathematical
/// orientation; with image coordinates, where y grows downwards, "left" is
/// visually on the clockwise side of the direction of travel).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(Point, Point)", into = "(Point, Point)")]
pub struct Line {
    pub start: Point,
    pub end: Point,
}

impl Line {
    /// Create a line, rejecting zero-length segments.
    pub fn new(start: Point, end: Point) -> Result<Self, ModelError> {
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        if dx.abs() < EPSILON && dy.abs() < EPSILON {
            return Err(ModelError::invalid_geometry(
                "line start and end must be distinct points",
            ));
        }
        Ok(Self { start, end })
    }

    /// Cross product of the line direction with `point - start`.
    pub fn cross(&self, point: Point) -> f64 {
        (self.end.x - self.start.x) * (point.y - self.start.y)
            - (self.end.y - self.start.y) * (point.x - self.start.x)
    }

    /// Side of the line `point` lies on, or `None` when exactly on the line.
    pub fn side_of(&self, point: Point) -> Option<Side> {
        let cross = self.cross(point);
        if cross > EPSILON {
            Some(Side::Left)
        } else if cross < -EPSILON {
            Some(Side::Right)
        } else {
            None
        }
    }
}

impl TryFrom<(Point, Point)> for Line {
    type Error = ModelError;

    fn try_from((start, end): (Point, Point)) -> Result<Self, Self::Error> {
        Line::new(start, end)
    }
}

impl From<Line> for (Point, Point) {
    fn from(line: Line) -> Self {
        (line.start, line.end)
    }
}

/// Ordered polygon used for zone occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Zone {
    points: Vec<Point>,
}

impl Zone {
    /// Create a zone; a polygon needs at least three vertices.
    pub fn new(points: Vec<Point>) -> Result<Self, ModelError> {
        if points.len() < 3 {
            return Err(ModelError::invalid_geometry(format!(
                "zone needs at least 3 points, got {}",
                points.len()
            )));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Point-in-polygon membership (even-odd rule). Points on an edge are inside.
    pub fn contains(&self, p: Point) -> bool {
        let n = self.points.len();
        let mut inside = false;
        let mut j = n - 1;

        for i in 0..n {
            let a = self.points[i];
            let b = self.points[j];

            if on_segment(a, b, p) {
                return true;
            }

            if (a.y > p.y) != (b.y > p.y) {
                let x_at_y = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_at_y {
                    inside = !inside;
                }
            }
            j = i;
        }

        inside
    }
}

impl TryFrom<Vec<Point>> for Zone {
    type Error = ModelError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        Zone::new(points)
    }
}

impl From<Zone> for Vec<Point> {
    fn from(zone: Zone) -> Self {
        zone.points
    }
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    if cross.abs() > EPSILON {
        return false;
    }
    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}
