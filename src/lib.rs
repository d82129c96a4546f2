//! In-memory, persistable road-network graph storage engine.
//!
//! | module | role |
//! |---|---|
//! | [`ids`] | typed node identifiers |
//! | [`geo`] | geographic coordinate type |
//! | [`bounds`] | monotonic bounding-box tracker |
//! | [`flags`] | opaque direction-flag trait + default encoding |
//! | [`bitset`] | dense growable bitset (deleted set, compaction working set) |
//! | [`segment_store`] | segmented flat `i32` array |
//! | [`node_table`] | parallel lat/lon/head arrays |
//! | [`edge_codec`] | 7-field edge record layout |
//! | [`adjacency`] | intrusive linked-list insert/unlink/iterate |
//! | [`compact`] | lazy deletion + in-place compaction |
//! | [`persistence`] | directory-based save/load with CRC-64 integrity |
//! | [`graph`] | [`RoadGraph`], the public facade |
//! | [`error`] | [`GraphError`] / [`GraphResult`] |
//!
//! Concurrency is single-writer/many-reader with no internal locking,
//! expressed through Rust's own borrow rules: read-only operations take
//! `&RoadGraph`, mutating ones take `&mut RoadGraph` (§5). There is no
//! retry path for any [`GraphError`] — treat a `RoadGraph` as poisoned
//! after one and discard it.

pub mod adjacency;
pub mod bitset;
pub mod bounds;
pub mod compact;
pub mod edge_codec;
pub mod error;
pub mod flags;
pub mod geo;
pub mod graph;
pub mod ids;
pub mod node_table;
pub mod persistence;
pub mod segment_store;

pub use adjacency::{AllEdges, EdgeIterator, EdgeRecordView, EdgeView};
pub use bitset::DenseBitset;
pub use bounds::BoundingBox;
pub use compact::NodeMoveObserver;
pub use error::{GraphError, GraphResult};
pub use flags::{DefaultFlags, EdgeFlags};
pub use geo::GeoPoint;
pub use graph::{GraphConfig, RoadGraph};
pub use ids::NodeId;

#[cfg(test)]
mod tests;
