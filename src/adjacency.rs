//! Adjacency engine (C5): edge insertion, the per-node linked-list walk,
//! unlink, and the direction-filtered iterator.
//!
//! The per-node list is intrusive: it lives entirely inside the edge
//! records' `linkA`/`linkB` fields (C4), threaded through `head[v]` (C3).
//! There is no separate adjacency-list allocation.

use log::trace;

use crate::edge_codec::{self, get_distance, link_pos, other_endpoint, quantize_distance, write_record};
use crate::error::{GraphError, GraphResult};
use crate::flags::EdgeFlags;
use crate::ids::NodeId;
use crate::node_table::NodeTable;
use crate::segment_store::{SegmentStore, EMPTY_LINK};

/// Any single walk of a node's adjacency list longer than this is treated
/// as corruption (a loop or a dangling pointer), not a functional limit.
const MAX_WALK_HOPS: u32 = 1000;

/// Append `new_p` to `node`'s adjacency list, walking to the tail if
/// non-empty. At each hop, the tail edge's own other endpoint (not the new
/// edge's) decides which link field (`linkA`/`linkB`) to follow or rewrite.
fn append_to_list(
    nodes: &mut NodeTable,
    store: &mut SegmentStore,
    node: u32,
    new_p: i32,
) -> GraphResult<()> {
    let node_id = NodeId(node);
    let head = nodes.head(node_id);
    if head == EMPTY_LINK {
        nodes.set_head(node_id, new_p);
        return Ok(());
    }

    let mut cursor = head;
    let mut hops = 0u32;
    loop {
        let cursor_other = other_endpoint(store, cursor, node) as u32;
        let link_field = link_pos(node, cursor_other, cursor);
        let next = store.get(link_field);
        if next == EMPTY_LINK {
            store.set(link_field, new_p);
            return Ok(());
        }
        cursor = next;
        hops += 1;
        if hops > MAX_WALK_HOPS {
            return Err(GraphError::Corruption {
                detail: format!("adjacency walk from node {node} exceeded {MAX_WALK_HOPS} hops"),
            });
        }
    }
}

/// Insert an edge `(a, b, distance_m, raw_flags)` (§4.4). Returns the
/// canonical base pointer of the new record.
pub fn insert_edge<F: EdgeFlags>(
    nodes: &mut NodeTable,
    store: &mut SegmentStore,
    a: NodeId,
    b: NodeId,
    distance_m: f64,
    raw_flags: i32,
) -> GraphResult<i32> {
    nodes.ensure_node_index(a.index().max(b.index()));

    let new_p = store.allocate_record()?;
    trace!("inserting edge {a}-{b} at pointer {new_p}");

    append_to_list(nodes, store, a.0, new_p)?;
    if a.0 != b.0 {
        append_to_list(nodes, store, b.0, new_p)?;
    }

    write_record(
        store,
        new_p,
        a.0 as i32,
        b.0 as i32,
        EMPTY_LINK,
        EMPTY_LINK,
        raw_flags,
        quantize_distance(distance_m),
        0,
        F::swap_direction,
    );

    Ok(new_p)
}

/// Splice `edge_pointer` out of `node`'s adjacency list (§4.7). Edges are
/// not zeroed; they become unreachable from any head but remain present in
/// the flat store until `optimize` rewrites or the segments are dropped.
pub fn unlink(
    nodes: &mut NodeTable,
    store: &mut SegmentStore,
    node: u32,
    edge_pointer: i32,
    prev_edge_pointer: Option<i32>,
) {
    let other = other_endpoint(store, edge_pointer, node) as u32;
    let next = store.get(link_pos(node, other, edge_pointer));

    match prev_edge_pointer {
        None => nodes.set_head(NodeId(node), next),
        Some(prev) => {
            let prev_other = other_endpoint(store, prev, node) as u32;
            store.set(link_pos(node, prev_other, prev), next);
        }
    }
}

/// One edge as observed while walking from a particular node.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EdgeView {
    /// The edge's base pointer, usable with [`unlink`] or the codec directly.
    pub pointer: i32,
    /// The endpoint that isn't the node the iterator was constructed for
    /// (equal to that node itself for a self-loop).
    pub other: NodeId,
    pub distance_m: f64,
    /// Raw flags as stored, direction-swapped if the walker stands at
    /// endpoint B relative to the stored canonical order (§4.5).
    pub effective_flags: i32,
}

/// Direction-filtered iterator over one node's adjacency list (§4.5).
pub struct EdgeIterator<'a, F: EdgeFlags> {
    nodes: &'a NodeTable,
    store: &'a SegmentStore,
    node: u32,
    cursor: i32,
    accept_incoming: bool,
    accept_outgoing: bool,
    hops: u32,
    _flags: std::marker::PhantomData<F>,
}

impl<'a, F: EdgeFlags> EdgeIterator<'a, F> {
    pub fn new(
        nodes: &'a NodeTable,
        store: &'a SegmentStore,
        node: NodeId,
        accept_incoming: bool,
        accept_outgoing: bool,
    ) -> Self {
        Self {
            nodes,
            store,
            node: node.0,
            cursor: nodes.head(node),
            accept_incoming,
            accept_outgoing,
            hops: 0,
            _flags: std::marker::PhantomData,
        }
    }
}

impl<'a, F: EdgeFlags> Iterator for EdgeIterator<'a, F> {
    type Item = EdgeView;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cursor == EMPTY_LINK {
                return None;
            }
            self.hops += 1;
            if self.hops > MAX_WALK_HOPS {
                // A corrupt list during a read is still a programming error,
                // but iterators can't return Result; stop rather than loop.
                return None;
            }

            let p = self.cursor;
            let other = other_endpoint(self.store, p, self.node) as u32;
            let next = self.store.get(link_pos(self.node, other, p));
            self.cursor = next;

            let stored_flags = edge_codec::flags(self.store, p);
            let walker_is_b = self.node > other;
            let effective_flags = if walker_is_b { F::swap_direction(stored_flags) } else { stored_flags };

            let forward = F::is_forward(effective_flags);
            let backward = F::is_backward(effective_flags);
            if (self.accept_outgoing && forward) || (self.accept_incoming && backward) {
                return Some(EdgeView {
                    pointer: p,
                    other: NodeId(other),
                    distance_m: get_distance(self.store, p),
                    effective_flags,
                });
            }
        }
    }
}

/// Iterator over every edge record `[7, next_global_pointer]`, one record
/// per stop, without any direction filter. Only meaningful immediately
/// after `optimize()` or when no deletions have occurred (§9 open question).
pub struct AllEdges<'a> {
    store: &'a SegmentStore,
    cursor: i32,
    end: i32,
}

impl<'a> AllEdges<'a> {
    pub fn new(store: &'a SegmentStore) -> Self {
        let end = store.next_global_pointer();
        Self { store, cursor: crate::segment_store::EDGE_RECORD_LEN, end }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EdgeRecordView {
    pub pointer: i32,
    pub node_a: NodeId,
    pub node_b: NodeId,
    pub distance_m: f64,
    pub flags: i32,
}

impl<'a> Iterator for AllEdges<'a> {
    type Item = EdgeRecordView;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor > self.end {
            return None;
        }
        let p = self.cursor;
        let view = EdgeRecordView {
            pointer: p,
            node_a: NodeId(edge_codec::node_a(self.store, p) as u32),
            node_b: NodeId(edge_codec::node_b(self.store, p) as u32),
            distance_m: get_distance(self.store, p),
            flags: edge_codec::flags(self.store, p),
        };
        self.cursor += crate::segment_store::EDGE_RECORD_LEN;
        Some(view)
    }
}
