//! Segmented integer store (C2).
//!
//! A logical flat array of `i32`, addressed by a single integer pointer
//! (units are array slots, not bytes), backed by an ordered collection of
//! fixed-size segments. Segments are appended as needed and never resized
//! or freed — this is the layout the edge store (C4/C5) is built on top of.

use log::debug;

use crate::error::{GraphError, GraphResult};

/// Pointer `0` means "no next edge" — never a real edge's base pointer.
pub const EMPTY_LINK: i32 = 0;

/// Minimum segment size, also the floor used when `initial_capacity_hint` is small.
const MIN_SEGMENT_SIZE: usize = 8192;

/// Length in `i32` slots of one edge record (§3).
pub const EDGE_RECORD_LEN: i32 = 7;

/// Compute `segmentSize = max(2^ceil(log2(initial_capacity_hint * 7)), 8192)`.
pub fn compute_segment_size(initial_capacity_hint: usize) -> usize {
    let target = initial_capacity_hint.saturating_mul(7).max(1);
    let pow = target.next_power_of_two();
    pow.max(MIN_SEGMENT_SIZE)
}

/// Flat `i32` array backed by fixed-size segments.
#[derive(Clone, Debug)]
pub struct SegmentStore {
    segments: Vec<Vec<i32>>,
    segment_size: usize,
    /// Last allocated edge-record base pointer; `0` before any edge exists.
    next_global_pointer: i32,
}

impl SegmentStore {
    pub fn new(initial_capacity_hint: usize) -> Self {
        let segment_size = compute_segment_size(initial_capacity_hint);
        let mut store =
            Self { segments: Vec::new(), segment_size, next_global_pointer: 0 };
        store.grow_to_fit(0);
        store
    }

    /// Reconstruct from already-sized segments read back from disk (C7).
    pub fn from_segments(segments: Vec<Vec<i32>>, segment_size: usize, next_global_pointer: i32) -> Self {
        Self { segments, segment_size, next_global_pointer }
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn next_global_pointer(&self) -> i32 {
        self.next_global_pointer
    }

    pub fn segments(&self) -> &[Vec<i32>] {
        &self.segments
    }

    /// Append zero-filled segments until pointer `p + EDGE_RECORD_LEN` fits.
    fn grow_to_fit(&mut self, p: i32) {
        let needed_end = p as i64 + EDGE_RECORD_LEN as i64;
        while needed_end >= (self.segments.len() as i64) * (self.segment_size as i64) {
            self.segments.push(vec![0i32; self.segment_size]);
            debug!(
                "segment store grew to {} segments ({} slots each)",
                self.segments.len(),
                self.segment_size
            );
        }
    }

    #[inline]
    fn locate(&self, p: i32) -> (usize, usize) {
        let p = p as usize;
        (p / self.segment_size, p % self.segment_size)
    }

    pub fn get(&self, p: i32) -> i32 {
        let (seg, off) = self.locate(p);
        self.segments[seg][off]
    }

    pub fn set(&mut self, p: i32, value: i32) {
        let (seg, off) = self.locate(p);
        self.segments[seg][off] = value;
    }

    /// Allocate a new edge record's base pointer, growing storage as needed.
    /// Fails if the pointer space (`i32`) overflows.
    pub fn allocate_record(&mut self) -> GraphResult<i32> {
        let new_pointer = self
            .next_global_pointer
            .checked_add(EDGE_RECORD_LEN)
            .ok_or(GraphError::CapacityExhausted { pointer: self.next_global_pointer as i64 + EDGE_RECORD_LEN as i64 })?;
        if new_pointer < 0 {
            return Err(GraphError::CapacityExhausted { pointer: new_pointer as i64 });
        }
        self.grow_to_fit(new_pointer);
        self.next_global_pointer = new_pointer;
        Ok(new_pointer)
    }
}
