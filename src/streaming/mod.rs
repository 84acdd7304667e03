//! LOD streaming: async mesh loading and per-part level management

pub mod loader;
pub mod manager;

pub use loader::{LevelKey, MeshLoader, MeshLoadResult};
pub use manager::LodStreamingManager;
