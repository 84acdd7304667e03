//! Part records and multi-level detail selection

use crate::assets::MeshData;
use crate::core::types::Vec3;
use crate::math::Aabb;
use crate::render::mesh_pipeline::GpuMesh;

/// Minimum part radius used for switch-distance computation
pub const MIN_PART_RADIUS: f32 = 0.05;

/// Distance factor applied to a part's radius to obtain the switch
/// distance for a detail bucket. Unlisted buckets use 6.
pub fn distance_factor(detail_percent: u32) -> f32 {
    match detail_percent {
        100 => 0.0,
        50 => 2.0,
        20 => 4.0,
        5 => 8.0,
        1 => 12.0,
        _ => 6.0,
    }
}

/// One detail level of a part
pub struct LodLevel {
    /// Detail as a percentage of the full-resolution mesh
    pub detail_percent: u32,
    /// Camera distance at which this level becomes active
    pub switch_distance: f32,
    /// CPU-side mesh data
    pub mesh: MeshData,
    /// GPU upload, created lazily on first draw
    pub gpu: Option<GpuMesh>,
}

/// A named assembly part with its detail levels and per-frame visibility
/// bookkeeping.
///
/// Levels are kept sorted by descending detail percent, which is also
/// ascending switch distance. Transition state (`last_active_level`,
/// `last_in_frustum`) is diffed by the frame loop, never pushed by the
/// underlying primitives.
pub struct PartRecord {
    pub name: String,
    pub levels: Vec<LodLevel>,
    pub bounds: Option<Aabb>,
    /// User show/hide toggle
    pub toggle: bool,
    /// Final visibility flag computed by the culler this frame
    pub visible: bool,
    /// Active level selected this frame
    pub active_level: Option<usize>,
    /// Active level recorded last frame
    pub last_active_level: Option<usize>,
    /// Frustum membership recorded last frame
    pub last_in_frustum: bool,
}

impl PartRecord {
    /// Create a record with no levels loaded yet
    pub fn new(name: impl Into<String>, bounds: Option<Aabb>) -> Self {
        Self {
            name: name.into(),
            levels: Vec::new(),
            bounds,
            toggle: true,
            visible: false,
            active_level: None,
            last_active_level: None,
            last_in_frustum: false,
        }
    }

    /// Bounding-sphere radius used for culling and switch distances
    pub fn radius(&self) -> f32 {
        self.bounds
            .map(|b| b.half_diagonal())
            .unwrap_or(0.0)
            .max(MIN_PART_RADIUS)
    }

    /// Center used for camera-distance computation
    pub fn center(&self) -> Vec3 {
        self.bounds.map(|b| b.center()).unwrap_or(Vec3::ZERO)
    }

    /// Insert a loaded level, keeping the list sorted by descending detail
    /// and switch distances non-decreasing.
    ///
    /// A level with the same detail percent replaces the existing one.
    /// Switch distances are recomputed for the whole list on every insert:
    /// the raw value is `distance_factor(detail) * radius`, then each
    /// entry is pinned to at least its more-detailed predecessor so the
    /// list stays monotone even for buckets the factor table leaves at
    /// the default.
    pub fn insert_level(&mut self, detail_percent: u32, mesh: MeshData) {
        if let Some(existing) = self.levels.iter_mut().find(|l| l.detail_percent == detail_percent) {
            existing.mesh = mesh;
            existing.gpu = None;
        } else {
            self.levels.push(LodLevel {
                detail_percent,
                switch_distance: 0.0,
                mesh,
                gpu: None,
            });
        }

        self.levels.sort_by(|a, b| b.detail_percent.cmp(&a.detail_percent));

        let radius = self.radius();
        let mut floor = 0.0_f32;
        for level in &mut self.levels {
            let raw = distance_factor(level.detail_percent) * radius;
            floor = floor.max(raw);
            level.switch_distance = floor;
        }
    }

    /// Select the level the proxy would render at `distance`: the
    /// highest-detail level whose switch distance does not exceed the
    /// distance, falling back to the least-detailed level when none
    /// qualifies. Returns None only when no levels are loaded.
    pub fn select_level(&self, distance: f32) -> Option<usize> {
        if self.levels.is_empty() {
            return None;
        }

        let mut chosen = None;
        for (i, level) in self.levels.iter().enumerate() {
            if level.switch_distance <= distance {
                chosen = Some(i);
            }
        }

        Some(chosen.unwrap_or(self.levels.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part_with_levels(details: &[u32]) -> PartRecord {
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let mut part = PartRecord::new("rotor", Some(bounds));
        for &d in details {
            part.insert_level(d, MeshData::default());
        }
        part
    }

    #[test]
    fn test_distance_factor_table() {
        assert_eq!(distance_factor(100), 0.0);
        assert_eq!(distance_factor(50), 2.0);
        assert_eq!(distance_factor(20), 4.0);
        assert_eq!(distance_factor(5), 8.0);
        assert_eq!(distance_factor(1), 12.0);
        // Unlisted buckets fall back to 6
        assert_eq!(distance_factor(10), 6.0);
        assert_eq!(distance_factor(2), 6.0);
    }

    #[test]
    fn test_radius_floor_without_bounds() {
        let part = PartRecord::new("ghost", None);
        assert_eq!(part.radius(), MIN_PART_RADIUS);
    }

    #[test]
    fn test_switch_distances_non_decreasing() {
        // Includes buckets 10 and 2, whose default factor (6) would
        // otherwise break monotonicity next to 5 (factor 8)
        let part = part_with_levels(&[100, 50, 20, 10, 5, 2, 1]);

        let mut prev = f32::NEG_INFINITY;
        for level in &part.levels {
            assert!(
                level.switch_distance >= prev,
                "switch distance decreased at detail {}",
                level.detail_percent
            );
            prev = level.switch_distance;
        }
    }

    #[test]
    fn test_insert_order_does_not_matter() {
        let a = part_with_levels(&[100, 20, 1]);
        let b = part_with_levels(&[1, 100, 20]);

        let da: Vec<(u32, f32)> = a.levels.iter().map(|l| (l.detail_percent, l.switch_distance)).collect();
        let db: Vec<(u32, f32)> = b.levels.iter().map(|l| (l.detail_percent, l.switch_distance)).collect();
        assert_eq!(da, db);
    }

    #[test]
    fn test_select_level_by_distance() {
        let part = part_with_levels(&[100, 50, 20]);
        let r = part.radius();

        // Close: full detail
        assert_eq!(part.select_level(0.0), Some(0));
        assert_eq!(part.select_level(1.9 * r), Some(0));
        // Middle band
        assert_eq!(part.select_level(2.5 * r), Some(1));
        // Beyond the largest switch distance: least detailed
        assert_eq!(part.select_level(100.0 * r), Some(2));
    }

    #[test]
    fn test_select_level_far_camera_picks_least_detailed() {
        let part = part_with_levels(&[100, 50, 20, 5, 1]);
        let farthest = part.levels.last().unwrap().switch_distance;
        assert_eq!(part.select_level(farthest + 1.0), Some(part.levels.len() - 1));
    }

    #[test]
    fn test_select_level_fallback_when_none_qualify() {
        // Only coarse levels present: their switch distances are positive,
        // so a near camera qualifies none and falls back to least detailed
        let part = part_with_levels(&[5, 1]);
        assert!(part.levels[0].switch_distance > 0.0);
        assert_eq!(part.select_level(0.0), Some(part.levels.len() - 1));
    }

    #[test]
    fn test_select_level_empty() {
        let part = PartRecord::new("empty", None);
        assert_eq!(part.select_level(5.0), None);
    }

    #[test]
    fn test_insert_replaces_same_detail() {
        let mut part = part_with_levels(&[100]);
        part.insert_level(100, MeshData::default());
        assert_eq!(part.levels.len(), 1);
    }
}
