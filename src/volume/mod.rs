//! Volumetric field store: the full-resolution field plus lazily built,
//! session-cached downsampled tiers

pub mod decimate;
pub mod field;

pub use decimate::decimate;
pub use field::{VolumeDescriptor, VolumeField};

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

/// Resolution tier of the volume texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeTier {
    Full,
    Half,
    Quarter,
}

impl VolumeTier {
    /// Decimation stride relative to the full-resolution field
    pub fn stride(self) -> u32 {
        match self {
            VolumeTier::Full => 1,
            VolumeTier::Half => 2,
            VolumeTier::Quarter => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VolumeTier::Full => "Full",
            VolumeTier::Half => "Half",
            VolumeTier::Quarter => "Quarter",
        }
    }
}

/// Tier thresholds in model world units, measured from the camera to the
/// field cuboid's anchor
pub fn tier_for_distance(distance: f32) -> VolumeTier {
    if distance > 0.7 {
        VolumeTier::Quarter
    } else if distance > 0.45 {
        VolumeTier::Half
    } else {
        VolumeTier::Full
    }
}

/// One tier's voxel data, ready for 3D-texture upload
#[derive(Clone)]
pub struct TierData {
    pub dims: [u32; 3],
    pub voxels: Arc<Vec<u8>>,
}

/// Selects the tier for the current camera distance and builds missing
/// tiers off the frame loop.
///
/// Only a tier-label change triggers a rebuild; the previously active
/// tier keeps rendering until the new one is ready. Builds are serialized
/// by an in-flight flag, and a label change observed mid-build is simply
/// re-evaluated once the build completes (the per-frame call re-checks
/// the desired tier). Derived tiers are cached write-once for the
/// session and never evicted.
pub struct TierStreamer {
    field: Arc<VolumeField>,
    half: Option<TierData>,
    quarter: Option<TierData>,
    active: VolumeTier,
    in_flight: Option<VolumeTier>,
    result_tx: mpsc::Sender<(VolumeTier, TierData)>,
    result_rx: mpsc::Receiver<(VolumeTier, TierData)>,
}

impl TierStreamer {
    pub fn new(field: Arc<VolumeField>) -> Self {
        let (result_tx, result_rx) = mpsc::channel();
        Self {
            field,
            half: None,
            quarter: None,
            active: VolumeTier::Full,
            in_flight: None,
            result_tx,
            result_rx,
        }
    }

    /// Tier currently rendering
    pub fn active(&self) -> VolumeTier {
        self.active
    }

    /// The full-resolution tier, for the initial upload at startup
    pub fn full_tier(&self) -> TierData {
        TierData {
            dims: self.field.dims,
            voxels: self.field.voxels.clone(),
        }
    }

    /// Advance the streamer one frame.
    ///
    /// Returns the tier to upload when the desired tier changed and its
    /// data is available, otherwise None while the previous tier keeps
    /// rendering.
    pub fn update(&mut self, camera_distance: f32) -> Option<(VolumeTier, TierData)> {
        // Collect finished builds; each tier is written exactly once
        while let Ok((tier, data)) = self.result_rx.try_recv() {
            log::debug!("volume tier {} built ({:?})", tier.label(), data.dims);
            match tier {
                VolumeTier::Half => {
                    if self.half.is_none() {
                        self.half = Some(data);
                    }
                }
                VolumeTier::Quarter => {
                    if self.quarter.is_none() {
                        self.quarter = Some(data);
                    }
                }
                VolumeTier::Full => {}
            }
            self.in_flight = None;
        }

        let desired = tier_for_distance(camera_distance);
        if desired == self.active {
            return None;
        }

        if let Some(data) = self.tier_data(desired) {
            log::info!("volume tier {} -> {}", self.active.label(), desired.label());
            self.active = desired;
            return Some((desired, data));
        }

        if self.in_flight.is_none() {
            self.spawn_build(desired);
        }

        None
    }

    fn tier_data(&self, tier: VolumeTier) -> Option<TierData> {
        match tier {
            VolumeTier::Full => Some(self.full_tier()),
            VolumeTier::Half => self.half.clone(),
            VolumeTier::Quarter => self.quarter.clone(),
        }
    }

    fn spawn_build(&mut self, tier: VolumeTier) {
        self.in_flight = Some(tier);

        let field = self.field.clone();
        let tx = self.result_tx.clone();
        thread::spawn(move || {
            let (dims, voxels) = decimate(field.dims, &field.voxels, tier.stride());
            let data = TierData { dims, voxels: Arc::new(voxels) };
            // Receiver gone means the viewer is shutting down
            let _ = tx.send((tier, data));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::field::VolumeDescriptor;
    use std::time::Duration;

    fn test_field(n: u32) -> Arc<VolumeField> {
        let desc = VolumeDescriptor {
            dimensions: [n, n, n],
            spacing: [0.01; 3],
            origin: [0.0; 3],
            value_range: [0.0, 100.0],
        };
        let voxels = vec![128u8; (n * n * n) as usize];
        Arc::new(VolumeField::from_parts(desc, voxels).unwrap())
    }

    #[test]
    fn test_tier_for_distance_thresholds() {
        assert_eq!(tier_for_distance(0.0), VolumeTier::Full);
        assert_eq!(tier_for_distance(0.45), VolumeTier::Full);
        assert_eq!(tier_for_distance(0.46), VolumeTier::Half);
        assert_eq!(tier_for_distance(0.7), VolumeTier::Half);
        assert_eq!(tier_for_distance(0.71), VolumeTier::Quarter);
    }

    #[test]
    fn test_tier_strides() {
        assert_eq!(VolumeTier::Full.stride(), 1);
        assert_eq!(VolumeTier::Half.stride(), 2);
        assert_eq!(VolumeTier::Quarter.stride(), 4);
    }

    #[test]
    fn test_no_rebuild_without_label_change() {
        let mut streamer = TierStreamer::new(test_field(8));
        // Full is already active; near distances never trigger an upload
        assert!(streamer.update(0.1).is_none());
        assert!(streamer.update(0.2).is_none());
        assert_eq!(streamer.active(), VolumeTier::Full);
    }

    #[test]
    fn test_tier_builds_and_caches() {
        let mut streamer = TierStreamer::new(test_field(8));

        // Crossing the half threshold spawns a build; the full tier keeps
        // rendering until it completes
        assert!(streamer.update(0.5).is_none());
        assert_eq!(streamer.active(), VolumeTier::Full);

        let upload = wait_for_upload(&mut streamer, 0.5);
        assert_eq!(upload.0, VolumeTier::Half);
        assert_eq!(upload.1.dims, [4, 4, 4]);
        assert_eq!(streamer.active(), VolumeTier::Half);

        // Back to full: available immediately, no build needed
        let upload = streamer.update(0.1).expect("full tier is always available");
        assert_eq!(upload.0, VolumeTier::Full);

        // Half again: served from the session cache without a rebuild
        let upload = streamer.update(0.5).expect("cached tier should be immediate");
        assert_eq!(upload.0, VolumeTier::Half);
    }

    fn wait_for_upload(streamer: &mut TierStreamer, distance: f32) -> (VolumeTier, TierData) {
        for _ in 0..500 {
            if let Some(upload) = streamer.update(distance) {
                return upload;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("tier build did not complete");
    }
}
