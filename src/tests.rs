//! End-to-end scenario tests, mirroring the testable properties (§8).
//!
//! Each scenario submodule below corresponds to one S1–S6 property.

#[cfg(test)]
mod helpers {
    use crate::{DefaultFlags, GeoPoint, GraphConfig, NodeId, RoadGraph};

    /// A 6-node path graph, 0-1-2-3-4-5, bidirectional, 1.0m per hop.
    pub fn path_graph(n: u32) -> RoadGraph<DefaultFlags> {
        let mut g = RoadGraph::in_memory(GraphConfig::default());
        for i in 0..n {
            g.set_node(NodeId(i), GeoPoint::new(i as f64, 0.0));
        }
        for i in 0..n.saturating_sub(1) {
            g.edge(NodeId(i), NodeId(i + 1), 1.0, DefaultFlags::BOTH).unwrap();
        }
        g
    }
}

/// S1: basic insert and traversal — every edge is visible from both endpoints.
#[cfg(test)]
mod s1_basic_traversal {
    use crate::{DefaultFlags, GeoPoint, GraphConfig, NodeId, RoadGraph};

    #[test]
    fn edges_visible_from_both_endpoints() {
        let mut g = RoadGraph::<DefaultFlags>::in_memory(GraphConfig::default());
        g.set_node(NodeId(0), GeoPoint::new(10.0, 20.0));
        g.set_node(NodeId(1), GeoPoint::new(10.1, 20.1));
        g.set_node(NodeId(2), GeoPoint::new(10.2, 20.2));
        g.edge(NodeId(0), NodeId(1), 5.0, DefaultFlags::BOTH).unwrap();
        g.edge(NodeId(1), NodeId(2), 7.0, DefaultFlags::BOTH).unwrap();

        let n1_edges: Vec<_> = g.get_edges(NodeId(1)).collect();
        assert_eq!(n1_edges.len(), 2);
        let n1_neighbors: Vec<_> = n1_edges.iter().map(|e| e.other).collect();
        assert!(n1_neighbors.contains(&NodeId(0)));
        assert!(n1_neighbors.contains(&NodeId(2)));

        assert_eq!(g.get_edges(NodeId(0)).count(), 1);
        assert_eq!(g.get_edges(NodeId(2)).count(), 1);
    }

    #[test]
    fn all_edges_scan_covers_every_insert() {
        let mut g = RoadGraph::<DefaultFlags>::in_memory(GraphConfig::default());
        for i in 0..4u32 {
            g.set_node(NodeId(i), GeoPoint::new(i as f64, 0.0));
        }
        for i in 0..3u32 {
            g.edge(NodeId(i), NodeId(i + 1), 2.0, DefaultFlags::BOTH).unwrap();
        }
        assert_eq!(g.get_all_edges().count(), 3);
    }
}

/// S2: inserting with out-of-order endpoints canonicalizes storage order
/// and swaps direction flags so traversal semantics are unaffected.
#[cfg(test)]
mod s2_swap_on_insert {
    use crate::{DefaultFlags, GeoPoint, GraphConfig, NodeId, RoadGraph};

    #[test]
    fn forward_only_edge_swaps_correctly() {
        let mut g = RoadGraph::<DefaultFlags>::in_memory(GraphConfig::default());
        g.set_node(NodeId(0), GeoPoint::new(0.0, 0.0));
        g.set_node(NodeId(9), GeoPoint::new(1.0, 1.0));

        // Caller passes (9, 0): should store canonically as (0, 9) with
        // flags swapped so "forward" still means "9 -> 0".
        g.edge(NodeId(9), NodeId(0), 42.0, DefaultFlags::FORWARD_ONLY).unwrap();

        assert_eq!(g.get_outgoing(NodeId(9)).count(), 1);
        assert_eq!(g.get_incoming(NodeId(0)).count(), 1);
        assert_eq!(g.get_outgoing(NodeId(0)).count(), 0);
        assert_eq!(g.get_incoming(NodeId(9)).count(), 0);
    }
}

/// S3: delete + compact relocates the highest live id into a freed low id
/// and leaves no live edge referencing a deleted or stale id.
#[cfg(test)]
mod s3_delete_and_compact {
    use super::helpers::path_graph;
    use crate::NodeId;

    #[test]
    fn relocated_node_carries_its_coordinates() {
        let mut g = path_graph(6);
        let original_coords = g.get_node(NodeId(5));

        g.mark_deleted(NodeId(2));
        g.mark_deleted(NodeId(4));
        g.optimize().unwrap();

        assert_eq!(g.node_count(), 4);
        // node 5 (the highest live id) should have been relocated to id 2.
        assert_eq!(g.get_node(NodeId(2)), original_coords);
    }

    #[test]
    fn no_surviving_edge_references_an_out_of_range_id() {
        let mut g = path_graph(6);
        g.mark_deleted(NodeId(2));
        g.mark_deleted(NodeId(4));
        g.optimize().unwrap();

        for i in 0..g.node_count() as u32 {
            for e in g.get_edges(NodeId(i)) {
                assert!(e.other.index() < g.node_count());
            }
        }
    }

    #[test]
    fn deleting_every_node_empties_the_graph() {
        let mut g = path_graph(4);
        for i in 0..4u32 {
            g.mark_deleted(NodeId(i));
        }
        g.optimize().unwrap();
        assert_eq!(g.node_count(), 0);
    }
}

/// S4: a graph flushed to disk and reopened has identical nodes and edges.
#[cfg(test)]
mod s4_persistence_round_trip {
    use crate::{DefaultFlags, GeoPoint, GraphConfig, NodeId, RoadGraph};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn small_graph_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = RoadGraph::<DefaultFlags>::open(dir.path(), GraphConfig::default(), 12345).unwrap();
        for i in 0..10u32 {
            g.set_node(NodeId(i), GeoPoint::new(i as f64 * 0.1, i as f64 * -0.1));
        }
        for i in 0..9u32 {
            g.edge(NodeId(i), NodeId(i + 1), (i + 1) as f64, DefaultFlags::BOTH).unwrap();
        }
        let bounds_before = g.bounds();
        g.close().unwrap();

        let reopened = RoadGraph::<DefaultFlags>::open(dir.path(), GraphConfig::default(), 0).unwrap();
        assert_eq!(reopened.node_count(), 10);
        assert_eq!(reopened.bounds(), bounds_before);
        for i in 0..9u32 {
            let edges: Vec<_> = reopened.get_edges(NodeId(i)).collect();
            assert!(edges.iter().any(|e| e.other == NodeId(i + 1)), "node {i} lost its forward edge across reopen");
        }
        assert_eq!(reopened.get_edges(NodeId(9)).count(), 1);
    }

    #[test]
    fn larger_randomized_graph_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = SmallRng::seed_from_u64(7);

        let mut g = RoadGraph::<DefaultFlags>::open(dir.path(), GraphConfig::default(), 0).unwrap();
        const N: u32 = 200;
        for i in 0..N {
            g.set_node(NodeId(i), GeoPoint::new(rng.gen_range(-90.0..90.0), rng.gen_range(-180.0..180.0)));
        }
        let mut inserted = 0usize;
        for _ in 0..600 {
            let a = rng.gen_range(0..N);
            let b = rng.gen_range(0..N);
            let dist = rng.gen_range(1.0..5000.0);
            g.edge(NodeId(a), NodeId(b), dist, DefaultFlags::BOTH).unwrap();
            inserted += 1;
        }
        let edge_count_before = g.get_all_edges().count();
        g.close().unwrap();

        let reopened = RoadGraph::<DefaultFlags>::open(dir.path(), GraphConfig::default(), 0).unwrap();
        assert_eq!(reopened.node_count(), N as usize);
        assert_eq!(reopened.get_all_edges().count(), edge_count_before);
        assert_eq!(inserted, 600);
    }

    #[test]
    fn reopening_a_fresh_directory_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-yet-created");
        let g = RoadGraph::<DefaultFlags>::open(&missing, GraphConfig::default(), 0).unwrap();
        assert_eq!(g.node_count(), 0);
    }
}

/// S5: the segment store grows by appending whole segments as pointers
/// cross a segment boundary, never reallocating an existing segment.
#[cfg(test)]
mod s5_segment_growth {
    use crate::segment_store::{SegmentStore, EDGE_RECORD_LEN};

    #[test]
    fn allocating_past_one_segment_appends_another() {
        let mut store = SegmentStore::new(1); // smallest segment size (8192 slots)
        let records_per_segment = store.segment_size() / EDGE_RECORD_LEN as usize;
        assert_eq!(store.segment_count(), 1);

        for _ in 0..records_per_segment {
            store.allocate_record().unwrap();
        }
        let count_at_boundary = store.segment_count();

        store.allocate_record().unwrap();
        assert!(store.segment_count() > count_at_boundary);
    }

    #[test]
    fn existing_segment_contents_survive_growth() {
        let mut store = SegmentStore::new(1);
        let p = store.allocate_record().unwrap();
        store.set(p, 999);

        let records_per_segment = store.segment_size() / EDGE_RECORD_LEN as usize;
        for _ in 0..records_per_segment {
            store.allocate_record().unwrap();
        }

        assert_eq!(store.get(p), 999);
    }
}

/// S6: a self-loop edge is visible exactly once from its single endpoint.
#[cfg(test)]
mod s6_self_loop {
    use crate::{DefaultFlags, GeoPoint, GraphConfig, NodeId, RoadGraph};

    #[test]
    fn self_loop_has_single_yield() {
        let mut g = RoadGraph::<DefaultFlags>::in_memory(GraphConfig::default());
        g.set_node(NodeId(3), GeoPoint::new(1.0, 1.0));
        g.edge(NodeId(3), NodeId(3), 0.0, DefaultFlags::BOTH).unwrap();

        let edges: Vec<_> = g.get_edges(NodeId(3)).collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].other, NodeId(3));
    }

    #[test]
    fn self_loop_survives_optimize() {
        let mut g = RoadGraph::<DefaultFlags>::in_memory(GraphConfig::default());
        g.set_node(NodeId(0), GeoPoint::new(0.0, 0.0));
        g.set_node(NodeId(1), GeoPoint::new(1.0, 1.0));
        g.edge(NodeId(1), NodeId(1), 0.0, DefaultFlags::BOTH).unwrap();
        g.mark_deleted(NodeId(0));
        g.optimize().unwrap();

        assert_eq!(g.node_count(), 1);
        let edges: Vec<_> = g.get_edges(NodeId(0)).collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].other, NodeId(0));
    }
}
