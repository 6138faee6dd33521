//! Minimal planar geometry for the region shapes.
//!
//! Coordinates are `x` = longitude and `y` = latitude. The computations are
//! planar: at the scale of a few islands, the distortion does not matter for a
//! synthetic placement.

use crate::config::GeoErrors;

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Coordinate {
        Coordinate { x, y }
    }
}

/// An axis-aligned bounding box.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    fn of_points(points: &[Coordinate]) -> BoundingBox {
        let mut bb = BoundingBox {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for p in points.iter() {
            bb.min_x = bb.min_x.min(p.x);
            bb.min_y = bb.min_y.min(p.y);
            bb.max_x = bb.max_x.max(p.x);
            bb.max_y = bb.max_y.max(p.y);
        }
        bb
    }

    fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }
}

/// A polygon: one exterior ring and any number of holes.
///
/// Rings may or may not repeat their first vertex at the end, as in GeoJSON.
#[derive(PartialEq, Debug, Clone)]
pub struct Polygon {
    exterior: Vec<Coordinate>,
    holes: Vec<Vec<Coordinate>>,
}

impl Polygon {
    pub fn new(
        exterior: Vec<Coordinate>,
        holes: Vec<Vec<Coordinate>>,
    ) -> Result<Polygon, GeoErrors> {
        let exterior = open_ring(exterior);
        if exterior.len() < 3 {
            return Err(GeoErrors::EmptyGeometry);
        }
        let holes = holes
            .into_iter()
            .map(open_ring)
            .filter(|h| h.len() >= 3)
            .collect();
        Ok(Polygon { exterior, holes })
    }

    pub fn exterior(&self) -> &[Coordinate] {
        &self.exterior
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::of_points(&self.exterior)
    }

    pub fn contains(&self, p: &Coordinate) -> bool {
        ring_contains(&self.exterior, p) && !self.holes.iter().any(|h| ring_contains(h, p))
    }

    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(|h| signed_area(h).abs()).sum();
        (signed_area(&self.exterior).abs() - holes).max(0.0)
    }

    // (area, area-weighted centroid) of the exterior minus the holes.
    fn weighted_centroid(&self) -> (f64, Coordinate) {
        let (a_ext, c_ext) = ring_centroid(&self.exterior);
        let mut area = a_ext;
        let mut sx = a_ext * c_ext.x;
        let mut sy = a_ext * c_ext.y;
        for h in self.holes.iter() {
            let (a_h, c_h) = ring_centroid(h);
            area -= a_h;
            sx -= a_h * c_h.x;
            sy -= a_h * c_h.y;
        }
        if area > 0.0 {
            (area, Coordinate::new(sx / area, sy / area))
        } else {
            (0.0, c_ext)
        }
    }
}

/// The shape of a region: a single polygon or several disjoint parts.
#[derive(PartialEq, Debug, Clone)]
pub enum Geometry {
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    pub fn parts(&self) -> &[Polygon] {
        match self {
            Geometry::Polygon(p) => std::slice::from_ref(p),
            Geometry::MultiPolygon(ps) => ps.as_slice(),
        }
    }

    /// The bounding box of all the parts, or None for an empty multipolygon.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.parts()
            .iter()
            .map(|p| p.bounding_box())
            .reduce(|a, b| a.union(&b))
    }

    /// True if the point lies inside any of the parts.
    pub fn contains(&self, p: &Coordinate) -> bool {
        self.parts().iter().any(|part| part.contains(p))
    }

    pub fn area(&self) -> f64 {
        self.parts().iter().map(|p| p.area()).sum()
    }

    /// The area-weighted centroid of the parts.
    ///
    /// Degenerate shapes without area fall back to the mean of the exterior vertices.
    pub fn centroid(&self) -> Option<Coordinate> {
        let mut area = 0.0;
        let mut sx = 0.0;
        let mut sy = 0.0;
        for part in self.parts() {
            let (a, c) = part.weighted_centroid();
            area += a;
            sx += a * c.x;
            sy += a * c.y;
        }
        if area > 0.0 {
            return Some(Coordinate::new(sx / area, sy / area));
        }
        let vertices: Vec<&Coordinate> = self
            .parts()
            .iter()
            .flat_map(|p| p.exterior.iter())
            .collect();
        if vertices.is_empty() {
            return None;
        }
        let n = vertices.len() as f64;
        Some(Coordinate::new(
            vertices.iter().map(|c| c.x).sum::<f64>() / n,
            vertices.iter().map(|c| c.y).sum::<f64>() / n,
        ))
    }
}

fn open_ring(mut ring: Vec<Coordinate>) -> Vec<Coordinate> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

// Even-odd rule.
fn ring_contains(ring: &[Coordinate], p: &Coordinate) -> bool {
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (&ring[i], &ring[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn signed_area(ring: &[Coordinate]) -> f64 {
    let mut s = 0.0;
    for i in 0..ring.len() {
        let a = &ring[i];
        let b = &ring[(i + 1) % ring.len()];
        s += a.x * b.y - b.x * a.y;
    }
    s / 2.0
}

// Returns the absolute area and the centroid of a simple ring.
fn ring_centroid(ring: &[Coordinate]) -> (f64, Coordinate) {
    let a = signed_area(ring);
    if a == 0.0 {
        let n = ring.len() as f64;
        let c = Coordinate::new(
            ring.iter().map(|c| c.x).sum::<f64>() / n,
            ring.iter().map(|c| c.y).sum::<f64>() / n,
        );
        return (0.0, c);
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..ring.len() {
        let p = &ring[i];
        let q = &ring[(i + 1) % ring.len()];
        let cross = p.x * q.y - q.x * p.y;
        cx += (p.x + q.x) * cross;
        cy += (p.y + q.y) * cross;
    }
    (a.abs(), Coordinate::new(cx / (6.0 * a), cy / (6.0 * a)))
}
