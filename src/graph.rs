//! `RoadGraph` facade (C9): the public API wiring every component together.
//!
//! Generic over [`EdgeFlags`] so an embedder can supply its own direction
//! encoding; defaults to [`DefaultFlags`]. Concurrency follows Rust's own
//! aliasing rules: read methods take `&self`, mutating methods take
//! `&mut self` — there is no internal locking (§5).

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use log::info;

use crate::adjacency::{self, AllEdges, EdgeIterator, EdgeView};
use crate::bitset::DenseBitset;
use crate::bounds::BoundingBox;
use crate::compact::{self, NodeMoveObserver};
use crate::error::GraphResult;
use crate::flags::{DefaultFlags, EdgeFlags};
use crate::geo::GeoPoint;
use crate::ids::NodeId;
use crate::node_table::NodeTable;
use crate::persistence;
use crate::segment_store::SegmentStore;

/// Construction-time sizing hints (§10). Both are lower bounds the store
/// uses to pick its first allocation; neither caps later growth.
#[derive(Copy, Clone, Debug)]
pub struct GraphConfig {
    /// Expected node count, used to size the initial node table.
    pub initial_node_capacity: usize,
    /// Expected edge count, feeds `compute_segment_size` (§4.1).
    pub initial_edge_capacity: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { initial_node_capacity: 10, initial_edge_capacity: 8192 / 7 }
    }
}

/// The in-memory, persistable road-network graph (§2).
///
/// `F` is the direction-flag encoding; the core never inspects it beyond
/// the three [`EdgeFlags`] operations.
pub struct RoadGraph<F: EdgeFlags = DefaultFlags> {
    nodes: NodeTable,
    store: SegmentStore,
    deleted: DenseBitset,
    bounds: BoundingBox,
    dir: Option<PathBuf>,
    creation_time_millis: i64,
    _flags: PhantomData<F>,
}

impl<F: EdgeFlags> RoadGraph<F> {
    /// Open a graph backed by `dir`. If `dir` already holds a saved graph
    /// (§6), it is loaded; otherwise a fresh empty graph is created and
    /// `dir` is used on the next [`Self::flush`]/[`Self::close`].
    pub fn open(dir: impl AsRef<Path>, config: GraphConfig, creation_time_millis: i64) -> GraphResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        match persistence::load_existing(&dir)? {
            Some(loaded) => {
                info!("opened existing graph at {}", dir.display());
                Ok(Self {
                    nodes: loaded.nodes,
                    store: loaded.store,
                    deleted: DenseBitset::new(),
                    bounds: loaded.bounds,
                    dir: Some(dir),
                    creation_time_millis: loaded.creation_time_millis,
                    _flags: PhantomData,
                })
            }
            None => {
                info!("creating new graph at {}", dir.display());
                Ok(Self::in_memory_with_time(config, creation_time_millis).with_dir(dir))
            }
        }
    }

    /// Construct a graph with no backing directory; `flush`/`close` will
    /// fail unless [`Self::set_dir`] is called first.
    pub fn in_memory(config: GraphConfig) -> Self {
        Self::in_memory_with_time(config, 0)
    }

    fn in_memory_with_time(config: GraphConfig, creation_time_millis: i64) -> Self {
        let mut nodes = NodeTable::new();
        nodes.ensure_node_index(config.initial_node_capacity.saturating_sub(1).max(0));
        // ensure_node_index bumps node_count; undo that, this only reserves capacity.
        nodes.shrink_to(0);
        Self {
            nodes,
            store: SegmentStore::new(config.initial_edge_capacity),
            deleted: DenseBitset::new(),
            bounds: BoundingBox::inverse(),
            dir: None,
            creation_time_millis,
            _flags: PhantomData,
        }
    }

    fn with_dir(mut self, dir: PathBuf) -> Self {
        self.dir = Some(dir);
        self
    }

    pub fn set_dir(&mut self, dir: impl AsRef<Path>) {
        self.dir = Some(dir.as_ref().to_path_buf());
    }

    /// Persist the current state to the backing directory.
    pub fn flush(&self) -> GraphResult<()> {
        let dir = self.dir.as_deref().expect("RoadGraph::flush called with no backing directory");
        persistence::save(dir, &self.nodes, &self.store, &self.bounds, self.creation_time_millis)
    }

    /// Flush and drop the in-memory state. There is nothing further to
    /// release beyond the flush itself — the backing arrays are freed when
    /// `self` is dropped.
    pub fn close(self) -> GraphResult<()> {
        self.flush()?;
        info!("closed graph at {}", self.dir.as_ref().map(|p| p.display().to_string()).unwrap_or_default());
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.node_count()
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Set (or overwrite) a node's coordinate, growing the table if needed (§4.2).
    pub fn set_node(&mut self, id: NodeId, point: GeoPoint) {
        self.nodes.set_node(id, point);
        self.bounds.widen(point);
    }

    pub fn get_node(&self, id: NodeId) -> GeoPoint {
        self.nodes.get_node(id)
    }

    /// Insert an edge `a <-> b` with the given distance and raw direction
    /// flags (§4.4). Returns the new record's base pointer.
    pub fn edge(&mut self, a: NodeId, b: NodeId, distance_m: f64, raw_flags: i32) -> GraphResult<i32> {
        adjacency::insert_edge::<F>(&mut self.nodes, &mut self.store, a, b, distance_m, raw_flags)
    }

    /// Mark `id` deleted. O(1); takes effect on the next `optimize`.
    pub fn mark_deleted(&mut self, id: NodeId) {
        self.deleted.set(id.index());
    }

    pub fn is_deleted(&self, id: NodeId) -> bool {
        self.deleted.get(id.index())
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.count()
    }

    /// Compact, reclaiming every marked-deleted node id (§4.6).
    pub fn optimize(&mut self) -> GraphResult<()> {
        compact::optimize::<F>(&mut self.nodes, &mut self.store, &mut self.deleted)
    }

    /// Compact, notifying `observer` of every `(old_id, new_id)` relocation
    /// so an embedder can move its own per-node side tables in lockstep.
    pub fn optimize_with<O: NodeMoveObserver>(&mut self, observer: &mut O) -> GraphResult<()> {
        compact::optimize_with::<F, O>(&mut self.nodes, &mut self.store, &mut self.deleted, observer)
    }

    /// All edges touching `id`, both directions.
    pub fn get_edges(&self, id: NodeId) -> impl Iterator<Item = EdgeView> + '_ {
        EdgeIterator::<F>::new(&self.nodes, &self.store, id, true, true)
    }

    /// Edges outgoing from `id` (forward in the stored or swapped direction).
    pub fn get_outgoing(&self, id: NodeId) -> impl Iterator<Item = EdgeView> + '_ {
        EdgeIterator::<F>::new(&self.nodes, &self.store, id, false, true)
    }

    /// Edges incoming to `id`.
    pub fn get_incoming(&self, id: NodeId) -> impl Iterator<Item = EdgeView> + '_ {
        EdgeIterator::<F>::new(&self.nodes, &self.store, id, true, false)
    }

    /// Every edge record in the store, in pointer order. Only meaningful
    /// right after `optimize()` or before any deletion has happened (§9).
    pub fn get_all_edges(&self) -> AllEdges<'_> {
        AllEdges::new(&self.store)
    }

    /// Deep copy: fresh node arrays, fresh edge segments, identical
    /// `nextGlobalPointer`/`nodeCount`/bounds (§4.9). The clone inherits no
    /// backing directory — it must be given one via [`Self::set_dir`]
    /// before it can be flushed.
    pub fn deep_clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            store: self.store.clone(),
            deleted: self.deleted.clone(),
            bounds: self.bounds,
            dir: None,
            creation_time_millis: self.creation_time_millis,
            _flags: PhantomData,
        }
    }
}
