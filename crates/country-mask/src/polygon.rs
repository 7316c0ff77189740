//! Point-in-polygon tests for country boundaries.
//!
//! Coordinates are (lon, lat) degrees with longitudes in -180..180, the
//! convention of the boundary GeoJSON. Containment uses even-odd ray
//! casting with a bounding-box pre-check; holes subtract.

/// A polygon: one exterior ring plus optional interior holes. Rings are
/// (lon, lat) pairs; closing the ring explicitly is not required.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub exterior: Vec<(f64, f64)>,
    pub holes: Vec<Vec<(f64, f64)>>,
    bbox: (f64, f64, f64, f64),
}

impl Polygon {
    pub fn new(exterior: Vec<(f64, f64)>, holes: Vec<Vec<(f64, f64)>>) -> Self {
        let bbox = ring_bbox(&exterior);
        Self {
            exterior,
            holes,
            bbox,
        }
    }

    /// Whether a point lies inside the exterior and outside all holes.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let (min_x, min_y, max_x, max_y) = self.bbox;
        if lon < min_x || lon > max_x || lat < min_y || lat > max_y {
            return false;
        }
        if !ring_contains(&self.exterior, lon, lat) {
            return false;
        }
        !self.holes.iter().any(|h| ring_contains(h, lon, lat))
    }
}

fn ring_bbox(ring: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    let mut bbox = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in ring {
        bbox.0 = bbox.0.min(x);
        bbox.1 = bbox.1.min(y);
        bbox.2 = bbox.2.max(x);
        bbox.3 = bbox.3.max(y);
    }
    bbox
}

/// Even-odd crossing test.
fn ring_contains(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}
