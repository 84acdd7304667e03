//! Mesh blob serialization and fetching
//!
//! Part meshes are stored as lz4-compressed rkyv archives, one file per
//! (part, detail) pair. Fetches are bounded by a fixed timeout; a missing
//! file is a normal outcome (the level is simply absent).

use rkyv::{Archive, Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::core::error::Error;

/// Timeout applied to every individual mesh fetch
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Triangle mesh payload of one LOD level
#[derive(Archive, Deserialize, Serialize, Clone, Default)]
pub struct MeshData {
    /// Vertex positions, world units
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex normals, same length as positions
    pub normals: Vec<[f32; 3]>,
    /// Triangle indices into positions/normals
    pub indices: Vec<u32>,
}

impl std::fmt::Debug for MeshData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshData")
            .field("vertices", &self.positions.len())
            .field("triangles", &(self.indices.len() / 3))
            .finish()
    }
}

impl MeshData {
    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Serialize a mesh to bytes (uncompressed)
pub fn serialize_mesh(mesh: &MeshData) -> Result<Vec<u8>, io::Error> {
    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(mesh)
        .map_err(|e| io::Error::other(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Deserialize a mesh from bytes (uncompressed)
pub fn deserialize_mesh(data: &[u8]) -> Result<MeshData, io::Error> {
    let archived = rkyv::access::<ArchivedMeshData, rkyv::rancor::Error>(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    rkyv::deserialize::<MeshData, rkyv::rancor::Error>(archived)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

/// Compress a serialized mesh using LZ4
pub fn compress_mesh(mesh: &MeshData) -> Result<Vec<u8>, io::Error> {
    let serialized = serialize_mesh(mesh)?;
    Ok(lz4_flex::compress_prepend_size(&serialized))
}

/// Decompress and deserialize a mesh
pub fn decompress_mesh(data: &[u8]) -> Result<MeshData, io::Error> {
    let decompressed = lz4_flex::decompress_size_prepended(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("LZ4 decompression failed: {}", e)))?;
    deserialize_mesh(&decompressed)
}

/// Fetch a mesh blob from disk, bounded by [`FETCH_TIMEOUT`].
///
/// Returns `Ok(None)` when the file does not exist. Timeouts and decode
/// failures are errors for this one resource only.
pub async fn fetch_mesh(path: &Path) -> Result<Option<MeshData>, Error> {
    if !path.exists() {
        return Ok(None);
    }

    let bytes = tokio::time::timeout(FETCH_TIMEOUT, tokio::fs::read(path))
        .await
        .map_err(|_| Error::Timeout(path.display().to_string()))??;

    let mesh = decompress_mesh(&bytes).map_err(|e| Error::MeshDecode(e.to_string()))?;
    Ok(Some(mesh))
}

/// Save a mesh blob to disk (compressed). Used by asset tooling and tests.
pub async fn save_mesh(path: &Path, mesh: &MeshData) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let compressed = compress_mesh(mesh)?;
    tokio::fs::write(path, compressed).await?;
    Ok(())
}
