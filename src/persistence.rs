//! Persistence (C7): save/load the backing arrays and settings to a
//! directory of flat files.
//!
//! File set, one flat binary file per array (§6):
//! `lats`, `lons`, `refs`, `edges0..edgesN`, `settings`. Every file is
//! little-endian with a CRC-64 trailer, following the same shape as the
//! pack's own `nbg_csr`/`nodes` binary formats: write the payload through a
//! `BufWriter` while feeding an incremental digest, then append the digest.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crc::{Crc, CRC_64_GO_ISO};
use log::info;

use crate::bounds::BoundingBox;
use crate::error::{GraphError, GraphResult};
use crate::node_table::NodeTable;
use crate::segment_store::SegmentStore;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);
const SETTINGS_MAGIC: u32 = 0x4E47524D; // "NGRM"
const SETTINGS_VERSION: u16 = 1;

/// The `settings` file payload (§6): everything needed to reconstruct the
/// node table and segment store shape without re-deriving them.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Settings {
    pub node_count: i32,
    pub creation_time_millis: i64,
    pub next_global_pointer: i32,
    pub current_segment_index: i32,
    pub segment_size: i32,
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Settings {
    fn to_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&SETTINGS_MAGIC.to_le_bytes());
        out.extend_from_slice(&SETTINGS_VERSION.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // reserved
        out.extend_from_slice(&self.node_count.to_le_bytes());
        out.extend_from_slice(&self.creation_time_millis.to_le_bytes());
        out.extend_from_slice(&self.next_global_pointer.to_le_bytes());
        out.extend_from_slice(&self.current_segment_index.to_le_bytes());
        out.extend_from_slice(&self.segment_size.to_le_bytes());
        out.extend_from_slice(&self.min_lon.to_le_bytes());
        out.extend_from_slice(&self.max_lon.to_le_bytes());
        out.extend_from_slice(&self.min_lat.to_le_bytes());
        out.extend_from_slice(&self.max_lat.to_le_bytes());
        out
    }

    fn from_bytes(bytes: &[u8]) -> GraphResult<Self> {
        // 8 (header) + 4*5 (i32 fields) + 8*4 (f64 fields) = 60 bytes; the
        // spec only requires >= 3 logical fields be present, which this
        // fixed layout always satisfies once the magic/version check passes.
        if bytes.len() < 60 {
            return Err(GraphError::FormatMismatch {
                detail: format!("settings file too short: {} bytes", bytes.len()),
            });
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        if magic != SETTINGS_MAGIC {
            return Err(GraphError::FormatMismatch { detail: format!("bad settings magic {magic:#010x}") });
        }
        let version = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        if version != SETTINGS_VERSION {
            return Err(GraphError::FormatMismatch { detail: format!("unsupported settings version {version}") });
        }
        Ok(Self {
            node_count: i32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            creation_time_millis: i64::from_le_bytes(bytes[12..20].try_into().unwrap()),
            next_global_pointer: i32::from_le_bytes(bytes[20..24].try_into().unwrap()),
            current_segment_index: i32::from_le_bytes(bytes[24..28].try_into().unwrap()),
            segment_size: i32::from_le_bytes(bytes[28..32].try_into().unwrap()),
            min_lon: f64::from_le_bytes(bytes[32..40].try_into().unwrap()),
            max_lon: f64::from_le_bytes(bytes[40..48].try_into().unwrap()),
            min_lat: f64::from_le_bytes(bytes[48..56].try_into().unwrap()),
            max_lat: f64::from_le_bytes(bytes[56..64].try_into().unwrap()),
        })
    }
}

fn io_err(path: &Path, source: std::io::Error) -> GraphError {
    GraphError::Io { path: path.to_path_buf(), source }
}

fn write_checked<W: Write>(writer: &mut W, digest: &mut crc::Digest<'_, u64>, bytes: &[u8], path: &Path) -> GraphResult<()> {
    writer.write_all(bytes).map_err(|e| io_err(path, e))?;
    digest.update(bytes);
    Ok(())
}

fn write_f32_array(path: &Path, values: &[f32]) -> GraphResult<()> {
    let file = File::create(path).map_err(|e| io_err(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut digest = CRC64.digest();
    for v in values {
        write_checked(&mut writer, &mut digest, &v.to_le_bytes(), path)?;
    }
    let crc = digest.finalize();
    writer.write_all(&crc.to_le_bytes()).map_err(|e| io_err(path, e))?;
    writer.flush().map_err(|e| io_err(path, e))
}

fn read_f32_array(path: &Path) -> GraphResult<Vec<f32>> {
    let bytes = fs::read(path).map_err(|e| io_err(path, e))?;
    if bytes.len() < 8 {
        return Err(GraphError::FormatMismatch { detail: format!("{} too short", path.display()) });
    }
    let body = &bytes[..bytes.len() - 8];
    let stored_crc = u64::from_le_bytes(bytes[bytes.len() - 8..].try_into().unwrap());
    let computed_crc = CRC64.checksum(body);
    if computed_crc != stored_crc {
        return Err(GraphError::FormatMismatch {
            detail: format!("{} CRC mismatch: expected {stored_crc:016x}, got {computed_crc:016x}", path.display()),
        });
    }
    Ok(body.chunks_exact(4).map(|c| f32::from_le_bytes(c.try_into().unwrap())).collect())
}

fn write_u32_array(path: &Path, values: &[u32]) -> GraphResult<()> {
    let file = File::create(path).map_err(|e| io_err(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut digest = CRC64.digest();
    for v in values {
        write_checked(&mut writer, &mut digest, &v.to_le_bytes(), path)?;
    }
    let crc = digest.finalize();
    writer.write_all(&crc.to_le_bytes()).map_err(|e| io_err(path, e))?;
    writer.flush().map_err(|e| io_err(path, e))
}

fn read_u32_array(path: &Path) -> GraphResult<Vec<u32>> {
    let bytes = fs::read(path).map_err(|e| io_err(path, e))?;
    if bytes.len() < 8 {
        return Err(GraphError::FormatMismatch { detail: format!("{} too short", path.display()) });
    }
    let body = &bytes[..bytes.len() - 8];
    let stored_crc = u64::from_le_bytes(bytes[bytes.len() - 8..].try_into().unwrap());
    let computed_crc = CRC64.checksum(body);
    if computed_crc != stored_crc {
        return Err(GraphError::FormatMismatch {
            detail: format!("{} CRC mismatch: expected {stored_crc:016x}, got {computed_crc:016x}", path.display()),
        });
    }
    Ok(body.chunks_exact(4).map(|c| u32::from_le_bytes(c.try_into().unwrap())).collect())
}

fn write_segment(path: &Path, segment: &[i32]) -> GraphResult<()> {
    let file = File::create(path).map_err(|e| io_err(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut digest = CRC64.digest();
    for v in segment {
        write_checked(&mut writer, &mut digest, &v.to_le_bytes(), path)?;
    }
    let crc = digest.finalize();
    writer.write_all(&crc.to_le_bytes()).map_err(|e| io_err(path, e))?;
    writer.flush().map_err(|e| io_err(path, e))
}

fn read_segment(path: &Path) -> GraphResult<Vec<i32>> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| io_err(path, e))?;
    if bytes.len() < 8 {
        return Err(GraphError::FormatMismatch { detail: format!("{} too short", path.display()) });
    }
    let body = &bytes[..bytes.len() - 8];
    let stored_crc = u64::from_le_bytes(bytes[bytes.len() - 8..].try_into().unwrap());
    let computed_crc = CRC64.checksum(body);
    if computed_crc != stored_crc {
        return Err(GraphError::FormatMismatch {
            detail: format!("{} CRC mismatch: expected {stored_crc:016x}, got {computed_crc:016x}", path.display()),
        });
    }
    Ok(body.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect())
}

/// Save the on-disk file set (§6) into `dir`, creating it if absent. Node
/// arrays are trimmed to `node_count` on write — `load_existing` requires
/// on-disk length to equal `node_count` exactly.
pub fn save(
    dir: &Path,
    nodes: &NodeTable,
    store: &SegmentStore,
    bounds: &BoundingBox,
    creation_time_millis: i64,
) -> GraphResult<()> {
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    // Trim to node_count: the node table's backing arrays are capacity, not
    // length (ensure_node_index over-allocates), and load validates
    // node_count == len(lats).
    let node_count = nodes.node_count();
    write_f32_array(&dir.join("lats"), &nodes.lats()[..node_count])?;
    write_f32_array(&dir.join("lons"), &nodes.lons()[..node_count])?;
    write_u32_array(&dir.join("refs"), &nodes.heads()[..node_count])?;

    for (i, segment) in store.segments().iter().enumerate() {
        write_segment(&dir.join(format!("edges{i}")), segment)?;
    }

    let settings = Settings {
        node_count: nodes.node_count() as i32,
        creation_time_millis,
        next_global_pointer: store.next_global_pointer(),
        current_segment_index: store.segment_count() as i32 - 1,
        segment_size: store.segment_size() as i32,
        min_lon: bounds.min_lon,
        max_lon: bounds.max_lon,
        min_lat: bounds.min_lat,
        max_lat: bounds.max_lat,
    };
    let settings_path = dir.join("settings");
    fs::write(&settings_path, settings.to_bytes()).map_err(|e| io_err(&settings_path, e))?;

    info!(
        "flushed graph to {}: {} nodes, {} edge segments",
        dir.display(),
        nodes.node_count(),
        store.segment_count()
    );
    Ok(())
}

/// Result of [`load_existing`]: `None` if `dir` doesn't exist (caller should
/// then construct fresh empty storage), `Some` with the rebuilt pieces
/// otherwise.
pub struct Loaded {
    pub nodes: NodeTable,
    pub store: SegmentStore,
    pub bounds: BoundingBox,
    pub creation_time_millis: i64,
}

/// Load a previously-`save`d directory. Returns `Ok(None)` if `dir` does
/// not exist (§6: `loadExisting` returns false in that case). Validates
/// `settings` and that `node_count == len(lats)`, failing with
/// [`GraphError::FormatMismatch`] otherwise.
pub fn load_existing(dir: &Path) -> GraphResult<Option<Loaded>> {
    if !dir.exists() {
        return Ok(None);
    }

    let settings_path = dir.join("settings");
    let settings_bytes = fs::read(&settings_path).map_err(|e| io_err(&settings_path, e))?;
    let settings = Settings::from_bytes(&settings_bytes)?;

    let lats = read_f32_array(&dir.join("lats"))?;
    let lons = read_f32_array(&dir.join("lons"))?;
    let heads = read_u32_array(&dir.join("refs"))?;

    if settings.node_count as usize != lats.len() {
        return Err(GraphError::FormatMismatch {
            detail: format!("node_count {} != len(lats) {}", settings.node_count, lats.len()),
        });
    }

    let mut segments = Vec::new();
    for i in 0..=settings.current_segment_index.max(0) {
        segments.push(read_segment(&dir.join(format!("edges{i}")))?);
    }

    let node_count = settings.node_count as usize;
    let store = SegmentStore::from_segments(segments, settings.segment_size as usize, settings.next_global_pointer);
    let nodes = NodeTable::from_parts(lats, lons, heads, node_count);
    let bounds = BoundingBox {
        min_lat: settings.min_lat,
        max_lat: settings.max_lat,
        min_lon: settings.min_lon,
        max_lon: settings.max_lon,
    };

    info!("loaded graph from {}: {} nodes", dir.display(), nodes.node_count());

    Ok(Some(Loaded { nodes, store, bounds, creation_time_millis: settings.creation_time_millis }))
}

#[allow(dead_code)]
pub(crate) fn default_settings_path(dir: &Path) -> PathBuf {
    dir.join("settings")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::DefaultFlags;
    use crate::geo::GeoPoint;
    use crate::ids::NodeId;
    use tempfile::tempdir;

    #[test]
    fn settings_round_trip() {
        let s = Settings {
            node_count: 42,
            creation_time_millis: 1_700_000_000_000,
            next_global_pointer: 700,
            current_segment_index: 0,
            segment_size: 8192,
            min_lon: -1.0,
            max_lon: 2.0,
            min_lat: -3.0,
            max_lat: 4.0,
        };
        let bytes = s.to_bytes();
        let back = Settings::from_bytes(&bytes).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn save_and_load_round_trip() {
        let mut nodes = NodeTable::new();
        let mut store = SegmentStore::new(8);
        let mut bounds = BoundingBox::inverse();

        for i in 0..5u32 {
            let p = GeoPoint::new(i as f64, -i as f64);
            nodes.set_node(NodeId(i), p);
            bounds.widen(p);
        }
        crate::adjacency::insert_edge::<DefaultFlags>(&mut nodes, &mut store, NodeId(0), NodeId(1), 5.0, DefaultFlags::BOTH).unwrap();
        crate::adjacency::insert_edge::<DefaultFlags>(&mut nodes, &mut store, NodeId(1), NodeId(2), 3.0, DefaultFlags::BOTH).unwrap();

        let dir = tempdir().unwrap();
        save(dir.path(), &nodes, &store, &bounds, 123).unwrap();

        let loaded = load_existing(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.nodes.node_count(), nodes.node_count());
        assert_eq!(loaded.store.next_global_pointer(), store.next_global_pointer());
        assert_eq!(loaded.creation_time_millis, 123);
        assert_eq!(loaded.bounds, bounds);
        // `nodes` has capacity beyond node_count (ensure_node_index
        // over-allocates); only the live prefix is persisted.
        assert_eq!(loaded.nodes.lats(), &nodes.lats()[..nodes.node_count()]);
        assert_eq!(loaded.nodes.lons(), &nodes.lons()[..nodes.node_count()]);
    }

    #[test]
    fn load_existing_missing_dir_returns_none() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(load_existing(&missing).unwrap().is_none());
    }

    #[test]
    fn corrupted_file_fails_crc_check() {
        let mut nodes = NodeTable::new();
        nodes.set_node(NodeId(0), GeoPoint::new(1.0, 1.0));
        let store = SegmentStore::new(8);
        let bounds = BoundingBox::inverse();

        let dir = tempdir().unwrap();
        save(dir.path(), &nodes, &store, &bounds, 0).unwrap();

        // Flip the first byte of `lats`'s body to corrupt its checksum.
        let lats_path = dir.path().join("lats");
        let mut bytes = fs::read(&lats_path).unwrap();
        bytes[0] ^= 0xFF;
        fs::write(&lats_path, bytes).unwrap();

        let result = load_existing(dir.path());
        assert!(matches!(result, Err(GraphError::FormatMismatch { .. })));
    }
}
