//! Bounding-box tracker (C8).
//!
//! Widen-only: starts at the inverse box and every `set_node` call expands
//! it monotonically. Compaction never shrinks it, even though the node that
//! pushed a bound out may later be deleted — matching the spec exactly.

use crate::geo::GeoPoint;

/// Axis-aligned lat/lon rectangle enclosing every live node ever inserted.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// The inverse box: any real coordinate widens it.
    pub fn inverse() -> Self {
        Self {
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
        }
    }

    /// Widen to include `point`. Never shrinks.
    pub fn widen(&mut self, point: GeoPoint) {
        let lat = point.lat as f64;
        let lon = point.lon as f64;
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
    }

    /// True if the box has never been widened (still the inverse box).
    pub fn is_empty(&self) -> bool {
        self.min_lat > self.max_lat
    }

    /// True if `point` falls within the box (inclusive).
    pub fn contains(&self, point: GeoPoint) -> bool {
        let lat = point.lat as f64;
        let lon = point.lon as f64;
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::inverse()
    }
}
