//! Viewer configuration

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::error::Error;
use crate::core::types::Result;

/// Configuration for a viewer session
///
/// Loaded from an optional JSON file; every field has a default so a bare
/// asset directory is enough to start the viewer.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Directory containing manifest.json, bounds.json, meshes/ and the
    /// volume descriptor
    pub asset_root: PathBuf,
    /// Window title
    pub window_title: String,
    /// Initial window width
    pub window_width: u32,
    /// Initial window height
    pub window_height: u32,
    /// Part acting as the enclosing shell for containment occlusion
    pub enclosure_part: String,
    /// Part exempt from containment occlusion (the front display)
    pub display_part: String,
    /// Orbit camera focus point
    pub camera_focus: [f32; 3],
    /// Initial orbit distance
    pub camera_distance: f32,
    /// Volume descriptor file name under asset_root
    pub volume_descriptor: String,
    /// Unit suffix for isosurface labels
    pub value_unit: String,
    /// Concurrent mesh fetches
    pub max_concurrent_loads: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            window_title: "Thermoscope".to_string(),
            window_width: 1280,
            window_height: 720,
            enclosure_part: "enclosure".to_string(),
            display_part: "display".to_string(),
            camera_focus: [0.0, 0.0, 0.0],
            camera_distance: 1.2,
            volume_descriptor: "volume.json".to_string(),
            value_unit: "\u{b0}C".to_string(),
            max_concurrent_loads: 8,
        }
    }
}

impl ViewerConfig {
    /// Load configuration from a JSON file. A malformed file is fatal at
    /// startup; a missing file is not an error for the caller to decide.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| Error::MalformedConfig {
            path: path.display().to_string(),
            detail: e.to_string(),
        })
    }

    /// Path to the LOD manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.asset_root.join("manifest.json")
    }

    /// Path to the bounding-box table
    pub fn bounds_path(&self) -> PathBuf {
        self.asset_root.join("bounds.json")
    }

    /// Directory containing mesh blobs
    pub fn meshes_dir(&self) -> PathBuf {
        self.asset_root.join("meshes")
    }

    /// Path to the volume descriptor
    pub fn volume_path(&self) -> PathBuf {
        self.asset_root.join(&self.volume_descriptor)
    }
}
