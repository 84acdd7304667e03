//! LOD manifest and bounding-box table
//!
//! The manifest maps part names to available detail levels and their mesh
//! files. Parts absent from the manifest fall back to probing a fixed set
//! of detail buckets by filename convention.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::math::Aabb;

/// Detail buckets probed when a part has no manifest entry, in percent
pub const DETAIL_BUCKETS: [u32; 7] = [100, 50, 20, 10, 5, 2, 1];

/// Part name -> detail percent (as string key) -> mesh file name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LodManifest(pub HashMap<String, HashMap<String, String>>);

impl LodManifest {
    /// Load the manifest from a JSON file.
    ///
    /// A missing file is treated as an empty manifest (every part probes
    /// the fallback buckets); a file that fails to parse is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("LOD manifest {} not found, probing all parts", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&text).map_err(|e| Error::MalformedManifest {
            path: path.display().to_string(),
            detail: e.to_string(),
        })
    }

    /// Resolve the (detail percent, mesh file) pairs for a part, sorted by
    /// descending detail. Returns None when the part has no manifest entry.
    pub fn sources_for(&self, part: &str) -> Option<Vec<(u32, String)>> {
        let entry = self.0.get(part)?;
        let mut sources: Vec<(u32, String)> = entry
            .iter()
            .filter_map(|(detail, file)| match detail.parse::<u32>() {
                Ok(d) => Some((d, file.clone())),
                Err(_) => {
                    log::warn!("manifest entry for '{}' has non-numeric detail key '{}'", part, detail);
                    None
                }
            })
            .collect();
        sources.sort_by(|a, b| b.0.cmp(&a.0));
        Some(sources)
    }

    /// Part names listed in the manifest
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Conventional source list used when a part has no manifest entry:
/// one candidate file per detail bucket, most detailed first.
pub fn probe_sources(part: &str) -> Vec<(u32, String)> {
    DETAIL_BUCKETS
        .iter()
        .map(|&detail| (detail, format!("{}_{}.msh", part, detail)))
        .collect()
}

/// JSON shape of one bounding-box entry
#[derive(Debug, Clone, Deserialize)]
struct BoundsEntry {
    min: [f32; 3],
    max: [f32; 3],
}

/// Part name -> world-space bounding box
#[derive(Debug, Clone, Default)]
pub struct BoundsTable(HashMap<String, Aabb>);

impl BoundsTable {
    /// Load the bounding-box table from a JSON file.
    ///
    /// Missing file means no part has bounds (containment occlusion is
    /// disabled everywhere); a parse failure is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("bounds table {} not found, parts will have no bounding boxes", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let raw: HashMap<String, BoundsEntry> =
            serde_json::from_str(&text).map_err(|e| Error::MalformedManifest {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;

        let table = raw
            .into_iter()
            .map(|(name, entry)| {
                (name, Aabb::new(Vec3::from_array(entry.min), Vec3::from_array(entry.max)))
            })
            .collect();

        Ok(Self(table))
    }

    /// Look up a part's bounding box
    pub fn get(&self, part: &str) -> Option<Aabb> {
        self.0.get(part).copied()
    }

    /// Part names listed in the table
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}
