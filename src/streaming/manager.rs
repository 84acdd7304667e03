//! LOD streaming manager
//!
//! Resolves each part's detail sources (manifest entry or probed fallback
//! buckets), streams the meshes in, splices loaded levels into the part
//! records, and tracks both load progress and per-frame level transitions.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::assets::manifest::{probe_sources, LodManifest};
use crate::core::types::Vec3;
use crate::scene::{PartRecord, SceneEvent};
use crate::streaming::loader::{LevelKey, MeshLoader, MeshLoadResult};

/// Per-part load bookkeeping
struct PartLoadState {
    /// Requests not yet answered
    outstanding: usize,
    /// Levels successfully spliced in
    loaded_levels: usize,
    /// Whether this part had a manifest entry (vs probed buckets)
    probed: bool,
}

/// Streams LOD meshes and tracks per-part load state.
///
/// Progress counts parts attempted, not levels succeeded: a part reaches
/// the resolved state on success, partial success, or not-found alike.
pub struct LodStreamingManager {
    loader: MeshLoader,
    meshes_dir: PathBuf,
    states: HashMap<String, PartLoadState>,
    parts_total: usize,
    parts_resolved: usize,
    last_logged_decile: u32,
}

impl LodStreamingManager {
    pub fn new(meshes_dir: PathBuf, max_concurrent: usize) -> Self {
        Self {
            loader: MeshLoader::new(max_concurrent),
            meshes_dir,
            states: HashMap::new(),
            parts_total: 0,
            parts_resolved: 0,
            last_logged_decile: 0,
        }
    }

    /// Queue every part's level fetches.
    ///
    /// Parts with a manifest entry load exactly the listed sources; parts
    /// without one probe the fixed detail buckets, where misses are
    /// expected. Coarser levels get higher priority so distant parts get
    /// something on screen early.
    pub fn begin(&mut self, parts: &[PartRecord], manifest: &LodManifest) {
        self.parts_total = parts.len();

        for part in parts {
            let (sources, probed) = match manifest.sources_for(&part.name) {
                Some(sources) => (sources, false),
                None => (probe_sources(&part.name), true),
            };

            if sources.is_empty() {
                log::warn!("part '{}' has no level sources, marking not-found", part.name);
                self.parts_resolved += 1;
                continue;
            }

            let outstanding = sources.len();
            for (detail, file) in sources {
                let key = LevelKey::new(part.name.clone(), detail);
                let priority = (100 - detail.min(100)) as f32;
                self.loader.request(key, self.meshes_dir.join(file), priority);
            }

            self.states.insert(
                part.name.clone(),
                PartLoadState { outstanding, loaded_levels: 0, probed },
            );
        }
    }

    /// Drain finished fetches and splice loaded levels into the parts.
    ///
    /// Levels may arrive in any order; `PartRecord::insert_level` keeps
    /// the list sorted. Call once per frame.
    pub fn poll(&mut self, parts: &mut [PartRecord]) {
        for result in self.loader.poll_results() {
            self.apply_result(result, parts);
        }
        self.log_progress();
    }

    /// Apply a single load result. Split out of `poll` so tests can feed
    /// results directly.
    pub fn apply_result(&mut self, result: MeshLoadResult, parts: &mut [PartRecord]) {
        let key = result.key().clone();

        match result {
            MeshLoadResult::Loaded { key, mesh } => {
                if let Some(part) = parts.iter_mut().find(|p| p.name == key.part) {
                    log::debug!(
                        "part '{}' level {}% loaded ({} triangles)",
                        key.part, key.detail, mesh.triangle_count()
                    );
                    part.insert_level(key.detail, mesh);
                    if let Some(state) = self.states.get_mut(&key.part) {
                        state.loaded_levels += 1;
                    }
                } else {
                    log::warn!("loaded mesh for unknown part '{}'", key.part);
                }
            }
            MeshLoadResult::NotFound { key } => {
                let probed = self.states.get(&key.part).map(|s| s.probed).unwrap_or(false);
                if probed {
                    log::debug!("probe miss for '{}' at {}%", key.part, key.detail);
                } else {
                    log::warn!("manifest lists '{}' at {}% but the file is missing", key.part, key.detail);
                }
            }
            MeshLoadResult::Failed { key, error } => {
                log::warn!("failed to load '{}' at {}%: {}", key.part, key.detail, error);
            }
        }

        let resolved = if let Some(state) = self.states.get_mut(&key.part) {
            state.outstanding = state.outstanding.saturating_sub(1);
            state.outstanding == 0
        } else {
            false
        };

        if resolved {
            let state = self.states.remove(&key.part).unwrap();
            self.parts_resolved += 1;
            if state.loaded_levels == 0 {
                log::warn!("part '{}' not found: no level resolved to a mesh", key.part);
            }
        }
    }

    /// Load progress in percent: the share of parts that have resolved
    /// (success, partial success, or not-found).
    pub fn progress_percent(&self) -> f32 {
        if self.parts_total == 0 {
            return 100.0;
        }
        self.parts_resolved as f32 / self.parts_total as f32 * 100.0
    }

    /// True once every part has resolved
    pub fn is_complete(&self) -> bool {
        self.parts_resolved >= self.parts_total
    }

    /// Recompute each part's active level for this camera position and
    /// emit a transition event for every change since last frame.
    ///
    /// The level proxy has no change callback, so the selection is redone
    /// from scratch and diffed against `last_active_level`.
    pub fn update(&self, parts: &mut [PartRecord], camera_pos: Vec3) -> Vec<SceneEvent> {
        let mut events = Vec::new();

        for part in parts.iter_mut() {
            let distance = camera_pos.distance(part.center());
            let selected = part.select_level(distance);
            part.active_level = selected;

            if let Some(to) = selected {
                if part.last_active_level != Some(to) {
                    events.push(SceneEvent::LevelSwitched {
                        part: part.name.clone(),
                        from: part.last_active_level,
                        to,
                    });
                }
            }
            part.last_active_level = selected;
        }

        events
    }

    fn log_progress(&mut self) {
        let decile = (self.progress_percent() / 10.0) as u32;
        if decile > self.last_logged_decile {
            self.last_logged_decile = decile;
            log::info!(
                "load progress: {:.0}% ({}/{} parts)",
                self.progress_percent(), self.parts_resolved, self.parts_total
            );
        }
    }
}
