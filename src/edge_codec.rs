//! Edge record layout and codec (C4).
//!
//! Reads and writes the 7-`i32` edge record at a base pointer inside a
//! [`SegmentStore`]. This module knows nothing about adjacency lists or
//! insertion order — it is pure field access plus the distance
//! quantization and `link_pos` address arithmetic every other component
//! builds on.

use crate::segment_store::SegmentStore;

pub const OFFSET_NODE_A: i32 = 0;
pub const OFFSET_NODE_B: i32 = 1;
pub const OFFSET_LINK_A: i32 = 2;
pub const OFFSET_LINK_B: i32 = 3;
pub const OFFSET_FLAGS: i32 = 4;
pub const OFFSET_DIST_Q: i32 = 5;
pub const OFFSET_SHORTCUT: i32 = 6;

const DISTANCE_SCALE: f64 = 10_000.0;

#[inline]
pub fn node_a(store: &SegmentStore, p: i32) -> i32 {
    store.get(p + OFFSET_NODE_A)
}

#[inline]
pub fn node_b(store: &SegmentStore, p: i32) -> i32 {
    store.get(p + OFFSET_NODE_B)
}

#[inline]
pub fn link_a(store: &SegmentStore, p: i32) -> i32 {
    store.get(p + OFFSET_LINK_A)
}

#[inline]
pub fn link_b(store: &SegmentStore, p: i32) -> i32 {
    store.get(p + OFFSET_LINK_B)
}

#[inline]
pub fn flags(store: &SegmentStore, p: i32) -> i32 {
    store.get(p + OFFSET_FLAGS)
}

#[inline]
pub fn dist_q(store: &SegmentStore, p: i32) -> i32 {
    store.get(p + OFFSET_DIST_Q)
}

#[inline]
pub fn shortcut_node(store: &SegmentStore, p: i32) -> i32 {
    store.get(p + OFFSET_SHORTCUT)
}

/// `distance_m = dist_q / 10000`.
#[inline]
pub fn get_distance(store: &SegmentStore, p: i32) -> f64 {
    dist_q(store, p) as f64 / DISTANCE_SCALE
}

/// `round(distance_m * 10000)`.
#[inline]
pub fn quantize_distance(distance_m: f64) -> i32 {
    (distance_m * DISTANCE_SCALE).round() as i32
}

/// The link field (`linkA` or `linkB` offset) that belongs to `self_id`'s
/// adjacency list for the record at `p` whose endpoints are `self_id` and
/// `other_id` (in either canonical order — this is computed before the
/// record is necessarily written in canonical order, see [`crate::adjacency`]).
#[inline]
pub fn link_pos(self_id: u32, other_id: u32, p: i32) -> i32 {
    if self_id <= other_id { p + OFFSET_LINK_A } else { p + OFFSET_LINK_B }
}

/// The endpoint of the record at `p` that isn't `node`.
#[inline]
pub fn other_endpoint(store: &SegmentStore, p: i32, node: u32) -> i32 {
    let a = node_a(store, p);
    if a as u32 == node { node_b(store, p) } else { a }
}

/// Write a complete edge record at `p`, canonicalizing `node_a <= node_b`
/// and direction-swapping `flags` if the caller's order needed flipping.
#[allow(clippy::too_many_arguments)]
pub fn write_record<F: Fn(i32) -> i32>(
    store: &mut SegmentStore,
    p: i32,
    a: i32,
    b: i32,
    link_a_val: i32,
    link_b_val: i32,
    raw_flags: i32,
    dist_q_val: i32,
    shortcut_val: i32,
    swap_direction: F,
) {
    let (na, nb, la, lb, fl) = if a <= b {
        (a, b, link_a_val, link_b_val, raw_flags)
    } else {
        (b, a, link_b_val, link_a_val, swap_direction(raw_flags))
    };
    store.set(p + OFFSET_NODE_A, na);
    store.set(p + OFFSET_NODE_B, nb);
    store.set(p + OFFSET_LINK_A, la);
    store.set(p + OFFSET_LINK_B, lb);
    store.set(p + OFFSET_FLAGS, fl);
    store.set(p + OFFSET_DIST_Q, dist_q_val);
    store.set(p + OFFSET_SHORTCUT, shortcut_val);
}
