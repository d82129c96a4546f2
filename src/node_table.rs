//! Node table (C3).
//!
//! Three parallel dense arrays indexed by [`NodeId`]: latitude, longitude,
//! and the head-of-adjacency-list pointer. Grows geometrically (1.5x, floor
//! 10) rather than one slot at a time, matching §4.2.

use log::debug;

use crate::geo::GeoPoint;
use crate::ids::NodeId;
use crate::segment_store::EMPTY_LINK;

#[derive(Clone, Debug, Default)]
pub struct NodeTable {
    lats: Vec<f32>,
    lons: Vec<f32>,
    head: Vec<u32>,
    node_count: usize,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from arrays read back from disk (C7), where length already
    /// equals `node_count` — persistence trims to `node_count` on save, so
    /// capacity here is just `lats.len()`, not an over-allocated buffer.
    pub fn from_parts(lats: Vec<f32>, lons: Vec<f32>, head: Vec<u32>, node_count: usize) -> Self {
        debug_assert_eq!(lats.len(), node_count);
        Self { lats, lons, head, node_count }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn capacity(&self) -> usize {
        self.lats.len()
    }

    pub fn lats(&self) -> &[f32] {
        &self.lats
    }

    pub fn lons(&self) -> &[f32] {
        &self.lons
    }

    pub fn heads(&self) -> &[u32] {
        &self.head
    }

    /// Grow the backing arrays to `max(10, ceil((i+1) * 1.5))` if `i` doesn't
    /// fit yet, and bump `node_count` to include `i`.
    pub fn ensure_node_index(&mut self, i: usize) {
        if i >= self.lats.len() {
            let new_cap = ((i + 1) as f64 * 1.5).ceil() as usize;
            let new_cap = new_cap.max(10);
            debug!("node table grew from {} to {} capacity", self.lats.len(), new_cap);
            self.lats.resize(new_cap, 0.0);
            self.lons.resize(new_cap, 0.0);
            self.head.resize(new_cap, EMPTY_LINK as u32);
        }
        if i + 1 > self.node_count {
            self.node_count = i + 1;
        }
    }

    pub fn set_node(&mut self, id: NodeId, point: GeoPoint) {
        self.ensure_node_index(id.index());
        self.lats[id.index()] = point.lat;
        self.lons[id.index()] = point.lon;
    }

    pub fn get_node(&self, id: NodeId) -> GeoPoint {
        GeoPoint { lat: self.lats[id.index()], lon: self.lons[id.index()] }
    }

    pub fn head(&self, id: NodeId) -> i32 {
        self.head[id.index()] as i32
    }

    pub fn set_head(&mut self, id: NodeId, pointer: i32) {
        self.head[id.index()] = pointer as u32;
    }

    /// Move a node's full payload from `old` to `new` (§4.6 step 5).
    pub fn move_payload(&mut self, old: NodeId, new: NodeId) {
        self.lats[new.index()] = self.lats[old.index()];
        self.lons[new.index()] = self.lons[old.index()];
        self.head[new.index()] = self.head[old.index()];
    }

    /// Truncate `node_count` after compaction removes `deleted` ids (§4.6 step 7).
    pub fn shrink_to(&mut self, new_count: usize) {
        self.node_count = new_count;
    }
}
