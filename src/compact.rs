//! Compactor (C6): lazy deletion + in-place compaction.
//!
//! `mark_deleted` is O(1). `optimize` pairs each deleted low id with a live
//! high id, unlinks edges into the deleted set, moves node payloads, and
//! rewrites every edge record that referenced a moved or deleted id — all
//! without reallocating the edge store (§4.6).

use std::collections::HashMap;

use log::{info, warn};

use crate::adjacency::unlink;
use crate::bitset::DenseBitset;
use crate::edge_codec::{self, link_pos, other_endpoint, write_record};
use crate::error::{GraphError, GraphResult};
use crate::flags::EdgeFlags;
use crate::ids::NodeId;
use crate::node_table::NodeTable;
use crate::segment_store::{SegmentStore, EDGE_RECORD_LEN, EMPTY_LINK};

/// Any single walk performed while checking compaction's own work, longer
/// than this, is itself corruption rather than a large but valid list.
const MAX_VERIFY_HOPS: u32 = 1_000_000;

/// Callback invoked once per `(old_id, new_id)` node relocation during
/// `optimize`, so an embedder can move parallel per-node data it keeps
/// outside the core (§9 "hook" note). `()` is the no-op implementation.
pub trait NodeMoveObserver {
    fn on_node_moved(&mut self, old_id: NodeId, new_id: NodeId);
}

impl NodeMoveObserver for () {
    fn on_node_moved(&mut self, _old_id: NodeId, _new_id: NodeId) {}
}

/// Run compaction with a no-op move observer.
pub fn optimize<F: EdgeFlags>(
    nodes: &mut NodeTable,
    store: &mut SegmentStore,
    deleted: &mut DenseBitset,
) -> GraphResult<()> {
    optimize_with::<F, _>(nodes, store, deleted, &mut ())
}

/// Run compaction, notifying `observer` of every node relocation.
pub fn optimize_with<F: EdgeFlags, O: NodeMoveObserver>(
    nodes: &mut NodeTable,
    store: &mut SegmentStore,
    deleted: &mut DenseBitset,
    observer: &mut O,
) -> GraphResult<()> {
    let deleted_count = deleted.count();
    if deleted_count == 0 {
        warn!("optimize() called with an empty deleted set; no-op");
        return Ok(());
    }

    let node_count = nodes.node_count();

    // Step 2: pair deleted-low with live-high.
    let mut old_to_new: HashMap<u32, u32> = HashMap::new();
    let mut to_update = DenseBitset::with_capacity(node_count);
    let mut pairs: Vec<(u32, u32)> = Vec::new();

    {
        let mut high = node_count;
        for d in deleted.iter_set() {
            // Every deleted node's neighbors need their edges to it unlinked,
            // whether or not `d` ends up paired with a move below.
            mark_neighbors(nodes, store, d as u32, &mut to_update);

            // Find the greatest live id m > d, scanning downward past deleted ids.
            let m = loop {
                if high == 0 {
                    break None;
                }
                high -= 1;
                if high <= d {
                    break None;
                }
                if !deleted.get(high) {
                    break Some(high);
                }
            };
            // No live id above `d` remains: `d` (and every higher deleted id,
            // since `high` only decreases) is simply trimmed off the top by
            // the node_count shrink in step 7, with no payload move.
            let Some(m) = m else {
                continue;
            };

            pairs.push((m as u32, d as u32));
            old_to_new.insert(m as u32, d as u32);

            // Neighbors of the about-to-move node need their edges rewritten
            // to the new id.
            mark_neighbors(nodes, store, m as u32, &mut to_update);
        }
    }

    // Step 3: unlink edges to deleted nodes.
    for u in to_update.iter_set() {
        unlink_edges_to_deleted(nodes, store, u as u32, deleted);
    }

    // Step 3b: the unlink phase above must have removed every reference to
    // a deleted node from every list it touched (§7 "Corruption detected").
    // A survivor here means the adjacency list was already inconsistent
    // before optimize ran.
    for u in to_update.iter_set() {
        if deleted.get(u) {
            continue;
        }
        verify_no_deleted_neighbor(nodes, store, u as u32, deleted)?;
    }

    // Step 5: move node payload for each pair.
    for &(old_id, new_id) in &pairs {
        nodes.move_payload(NodeId(old_id), NodeId(new_id));
        observer.on_node_moved(NodeId(old_id), NodeId(new_id));
    }

    // Step 6: rewrite every edge record touching a moved or deleted id.
    rewrite_edges::<F>(store, &old_to_new, &to_update);

    // Step 7: shrink node_count and clear the deleted set.
    let new_count = node_count - deleted_count;
    nodes.shrink_to(new_count);
    deleted.clear_all(new_count);

    info!("optimize: removed {deleted_count} nodes, {new_count} remain");
    Ok(())
}

/// Add every live neighbor of `node` to `to_update`.
fn mark_neighbors(nodes: &NodeTable, store: &SegmentStore, node: u32, to_update: &mut DenseBitset) {
    let mut cursor = nodes.head(NodeId(node));
    let mut hops = 0u32;
    while cursor != EMPTY_LINK {
        let other = other_endpoint(store, cursor, node) as u32;
        to_update.set(other as usize);
        let next = store.get(link_pos(node, other, cursor));
        cursor = next;
        hops += 1;
        if hops > 1_000_000 {
            break; // defensive; a real corruption would already have been caught on insert.
        }
    }
}

/// Walk `u`'s adjacency list and unlink every edge whose other endpoint is
/// marked deleted, splicing in place (§4.7) rather than restarting the walk.
fn unlink_edges_to_deleted(nodes: &mut NodeTable, store: &mut SegmentStore, u: u32, deleted: &DenseBitset) {
    let mut prev: Option<i32> = None;
    let mut cursor = nodes.head(NodeId(u));
    let mut hops = 0u32;

    while cursor != EMPTY_LINK {
        let other = other_endpoint(store, cursor, u) as u32;
        let next = store.get(link_pos(u, other, cursor));

        if deleted.get(other as usize) {
            unlink(nodes, store, u, cursor, prev);
            cursor = next;
            // prev is unchanged: the slot we just removed no longer exists
            // between prev and next.
        } else {
            prev = Some(cursor);
            cursor = next;
        }

        hops += 1;
        if hops > 1_000_000 {
            break;
        }
    }
}

/// Walk `node`'s adjacency list and fail if any edge still reaches a
/// deleted node — the unlink phase (step 3) is supposed to make that
/// impossible, so a survivor here means the list was already corrupt.
fn verify_no_deleted_neighbor(
    nodes: &NodeTable,
    store: &SegmentStore,
    node: u32,
    deleted: &DenseBitset,
) -> GraphResult<()> {
    let mut cursor = nodes.head(NodeId(node));
    let mut hops = 0u32;
    while cursor != EMPTY_LINK {
        let other = other_endpoint(store, cursor, node) as u32;
        if deleted.get(other as usize) {
            return Err(GraphError::Corruption {
                detail: format!(
                    "node {node} still references deleted node {other} after the unlink phase"
                ),
            });
        }
        cursor = store.get(link_pos(node, other, cursor));
        hops += 1;
        if hops > MAX_VERIFY_HOPS {
            return Err(GraphError::Corruption {
                detail: format!("adjacency walk from node {node} exceeded {MAX_VERIFY_HOPS} hops during compaction verification"),
            });
        }
    }
    Ok(())
}

/// Linear scan over every edge record; rewrite endpoints that moved.
fn rewrite_edges<F: EdgeFlags>(
    store: &mut SegmentStore,
    old_to_new: &HashMap<u32, u32>,
    to_update: &DenseBitset,
) {
    let end = store.next_global_pointer();
    let mut p = EDGE_RECORD_LEN;
    while p <= end {
        let a = edge_codec::node_a(store, p) as u32;
        let b = edge_codec::node_b(store, p) as u32;

        if to_update.get(a as usize) || to_update.get(b as usize) {
            let updated_a = *old_to_new.get(&a).unwrap_or(&a);
            let updated_b = *old_to_new.get(&b).unwrap_or(&b);
            if updated_a != a || updated_b != b {
                let link_a = edge_codec::link_a(store, p);
                let link_b = edge_codec::link_b(store, p);
                let flags = edge_codec::flags(store, p);
                let dist_q = edge_codec::dist_q(store, p);
                let shortcut = edge_codec::shortcut_node(store, p);
                write_record(
                    store,
                    p,
                    updated_a as i32,
                    updated_b as i32,
                    link_a,
                    link_b,
                    flags,
                    dist_q,
                    shortcut,
                    F::swap_direction,
                );
            }
        }

        p += EDGE_RECORD_LEN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::{insert_edge, EdgeIterator};
    use crate::flags::DefaultFlags;
    use crate::geo::GeoPoint;

    fn path_graph(n: usize) -> (NodeTable, SegmentStore) {
        let mut nodes = NodeTable::new();
        let mut store = SegmentStore::new(16);
        for i in 0..n {
            nodes.set_node(NodeId(i as u32), GeoPoint::new(i as f64, 0.0));
        }
        for i in 0..(n - 1) {
            insert_edge::<DefaultFlags>(
                &mut nodes,
                &mut store,
                NodeId(i as u32),
                NodeId((i + 1) as u32),
                1.0,
                DefaultFlags::BOTH,
            )
            .unwrap();
        }
        (nodes, store)
    }

    #[test]
    fn optimize_noop_on_empty_deleted_set() {
        let (mut nodes, mut store) = path_graph(3);
        let mut deleted = DenseBitset::new();
        optimize::<DefaultFlags>(&mut nodes, &mut store, &mut deleted).unwrap();
        assert_eq!(nodes.node_count(), 3);
    }

    #[test]
    fn delete_and_compact_shrinks_node_count() {
        let (mut nodes, mut store) = path_graph(6);
        let mut deleted = DenseBitset::with_capacity(6);
        deleted.set(2);
        deleted.set(4);
        optimize::<DefaultFlags>(&mut nodes, &mut store, &mut deleted).unwrap();
        assert_eq!(nodes.node_count(), 4);
        assert_eq!(deleted.count(), 0);
    }

    #[test]
    fn no_live_edge_references_deleted_id_after_optimize() {
        let (mut nodes, mut store) = path_graph(6);
        let mut deleted = DenseBitset::with_capacity(6);
        deleted.set(2);
        deleted.set(4);
        optimize::<DefaultFlags>(&mut nodes, &mut store, &mut deleted).unwrap();

        for v in 0..nodes.node_count() as u32 {
            let edges: Vec<_> =
                EdgeIterator::<DefaultFlags>::new(&nodes, &store, NodeId(v), true, true).collect();
            for e in edges {
                assert!(e.other.index() < nodes.node_count());
            }
        }
    }

    #[test]
    fn optimize_is_idempotent() {
        let (mut nodes, mut store) = path_graph(6);
        let mut deleted = DenseBitset::with_capacity(6);
        deleted.set(2);
        optimize::<DefaultFlags>(&mut nodes, &mut store, &mut deleted).unwrap();
        let count_after_first = nodes.node_count();
        optimize::<DefaultFlags>(&mut nodes, &mut store, &mut deleted).unwrap();
        assert_eq!(nodes.node_count(), count_after_first);
    }

    #[test]
    fn verify_no_deleted_neighbor_passes_on_a_clean_list() {
        let (nodes, store) = path_graph(3);
        let deleted = DenseBitset::with_capacity(3);
        assert!(verify_no_deleted_neighbor(&nodes, &store, 0, &deleted).is_ok());
    }

    #[test]
    fn verify_no_deleted_neighbor_reports_corruption() {
        let (nodes, store) = path_graph(3);
        let mut deleted = DenseBitset::with_capacity(3);
        // Node 1 is still (wrongly) reachable from node 0's list, but we
        // mark it deleted without running the unlink phase first — the
        // scenario step 3b is meant to catch.
        deleted.set(1);
        let result = verify_no_deleted_neighbor(&nodes, &store, 0, &deleted);
        assert!(matches!(result, Err(GraphError::Corruption { .. })));
    }
}
