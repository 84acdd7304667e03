//! Volumetric scalar field storage and loading
//!
//! A field is described by a JSON descriptor (dimensions, spacing, origin,
//! value range) paired with a raw sibling file of one unsigned byte per
//! voxel, row-major with x fastest.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::math::Aabb;

/// JSON descriptor of a volume field
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDescriptor {
    pub dimensions: [u32; 3],
    pub spacing: [f32; 3],
    pub origin: [f32; 3],
    pub value_range: [f32; 2],
}

/// The full-resolution scalar temperature field
#[derive(Clone)]
pub struct VolumeField {
    /// Voxel counts per axis
    pub dims: [u32; 3],
    /// Physical size of one voxel per axis
    pub spacing: [f32; 3],
    /// World offset of the field's minimum corner
    pub origin: [f32; 3],
    /// Physical values encoded by bytes 0 and 255
    pub value_range: [f32; 2],
    /// One byte per voxel, row-major, x fastest
    pub voxels: Arc<Vec<u8>>,
}

impl std::fmt::Debug for VolumeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeField")
            .field("dims", &self.dims)
            .field("value_range", &self.value_range)
            .finish()
    }
}

impl VolumeField {
    /// Load a field from its descriptor path; the raw bytes live in a
    /// sibling file with the `.bin` extension.
    ///
    /// A malformed descriptor or a byte count that disagrees with the
    /// dimensions is fatal for the volume subsystem.
    pub fn load(descriptor_path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(descriptor_path)?;
        let desc: VolumeDescriptor =
            serde_json::from_str(&text).map_err(|e| Error::MalformedVolumeDescriptor {
                path: descriptor_path.display().to_string(),
                detail: e.to_string(),
            })?;

        let bin_path = descriptor_path.with_extension("bin");
        let voxels = std::fs::read(&bin_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ResourceNotFound(bin_path.display().to_string())
            } else {
                e.into()
            }
        })?;

        Self::from_parts(desc, voxels).map_err(|detail| Error::MalformedVolumeDescriptor {
            path: descriptor_path.display().to_string(),
            detail,
        })
    }

    /// Build a field from an already-parsed descriptor and raw bytes
    pub fn from_parts(desc: VolumeDescriptor, voxels: Vec<u8>) -> std::result::Result<Self, String> {
        let [nx, ny, nz] = desc.dimensions;
        let expected = nx as usize * ny as usize * nz as usize;
        if expected == 0 {
            return Err("zero-sized dimensions".to_string());
        }
        if voxels.len() != expected {
            return Err(format!(
                "raw file holds {} bytes, dimensions {:?} require {}",
                voxels.len(), desc.dimensions, expected
            ));
        }
        if desc.spacing.iter().any(|&s| s <= 0.0) {
            return Err(format!("non-positive spacing {:?}", desc.spacing));
        }

        Ok(Self {
            dims: desc.dimensions,
            spacing: desc.spacing,
            origin: desc.origin,
            value_range: desc.value_range,
            voxels: Arc::new(voxels),
        })
    }

    /// World-space cuboid the field occupies
    pub fn world_bounds(&self) -> Aabb {
        let origin = Vec3::from_array(self.origin);
        let size = Vec3::new(
            self.dims[0] as f32 * self.spacing[0],
            self.dims[1] as f32 * self.spacing[1],
            self.dims[2] as f32 * self.spacing[2],
        );
        Aabb::new(origin, origin + size)
    }

    /// World anchor used for camera-distance tier selection
    pub fn world_anchor(&self) -> Vec3 {
        self.world_bounds().center()
    }

    /// Map a raw byte to its physical value
    pub fn byte_to_value(&self, byte: u8) -> f32 {
        let [lo, hi] = self.value_range;
        lo + byte as f32 / 255.0 * (hi - lo)
    }

    /// Map a physical value to the byte encoding, clamped to [0, 255]
    pub fn value_to_byte(&self, value: f32) -> u8 {
        let [lo, hi] = self.value_range;
        if hi <= lo {
            return 0;
        }
        (((value - lo) / (hi - lo)) * 255.0).round().clamp(0.0, 255.0) as u8
    }

    /// Physical values at the requested percentiles, computed from a byte
    /// histogram. `fractions` entries are in [0, 1].
    pub fn percentiles(&self, fractions: &[f64]) -> Vec<f32> {
        let mut histogram = [0u64; 256];
        for &b in self.voxels.iter() {
            histogram[b as usize] += 1;
        }
        let total = self.voxels.len() as f64;

        fractions
            .iter()
            .map(|&f| {
                let target = f.clamp(0.0, 1.0) * total;
                let mut cumulative = 0.0;
                let mut byte = 255u8;
                for (b, &count) in histogram.iter().enumerate() {
                    cumulative += count as f64;
                    if cumulative >= target {
                        byte = b as u8;
                        break;
                    }
                }
                self.byte_to_value(byte)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(dims: [u32; 3]) -> VolumeDescriptor {
        VolumeDescriptor {
            dimensions: dims,
            spacing: [1.0, 1.0, 1.0],
            origin: [0.0, 0.0, 0.0],
            value_range: [0.0, 100.0],
        }
    }

    #[test]
    fn test_from_parts_validates_byte_count() {
        let err = VolumeField::from_parts(desc([2, 2, 2]), vec![0u8; 7]).unwrap_err();
        assert!(err.contains("7 bytes"));

        assert!(VolumeField::from_parts(desc([2, 2, 2]), vec![0u8; 8]).is_ok());
    }

    #[test]
    fn test_world_bounds() {
        let field = VolumeField::from_parts(
            VolumeDescriptor {
                dimensions: [4, 2, 1],
                spacing: [0.5, 1.0, 2.0],
                origin: [1.0, 0.0, -1.0],
                value_range: [0.0, 1.0],
            },
            vec![0u8; 8],
        )
        .unwrap();

        let bounds = field.world_bounds();
        assert_eq!(bounds.min, Vec3::new(1.0, 0.0, -1.0));
        assert_eq!(bounds.max, Vec3::new(3.0, 2.0, 1.0));
        assert_eq!(field.world_anchor(), Vec3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn test_byte_value_mapping() {
        let field = VolumeField::from_parts(desc([1, 1, 1]), vec![0u8]).unwrap();
        assert_eq!(field.byte_to_value(0), 0.0);
        assert_eq!(field.byte_to_value(255), 100.0);
        assert_eq!(field.value_to_byte(0.0), 0);
        assert_eq!(field.value_to_byte(100.0), 255);
        assert_eq!(field.value_to_byte(50.0), 128);
        // Out-of-range values clamp
        assert_eq!(field.value_to_byte(-10.0), 0);
        assert_eq!(field.value_to_byte(500.0), 255);
    }

    #[test]
    fn test_percentiles_uniform_field() {
        let field = VolumeField::from_parts(desc([4, 4, 4]), vec![100u8; 64]).unwrap();
        let p = field.percentiles(&[0.10, 0.75, 0.975]);
        for v in p {
            assert!((v - field.byte_to_value(100)).abs() < 1e-5);
        }
    }

    #[test]
    fn test_percentiles_are_monotone() {
        let bytes: Vec<u8> = (0..=255).collect();
        let field = VolumeField::from_parts(
            VolumeDescriptor {
                dimensions: [16, 16, 1],
                spacing: [1.0; 3],
                origin: [0.0; 3],
                value_range: [0.0, 255.0],
            },
            bytes,
        )
        .unwrap();

        let p = field.percentiles(&[0.10, 0.75, 0.975]);
        assert!(p[0] < p[1] && p[1] < p[2]);
    }

    #[test]
    fn test_load_missing_descriptor_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VolumeField::load(&dir.path().join("volume.json")).is_err());
    }

    #[test]
    fn test_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("volume.json");
        std::fs::write(
            &json_path,
            r#"{ "dimensions": [2, 2, 2], "spacing": [1, 1, 1], "origin": [0, 0, 0], "valueRange": [0, 100] }"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("volume.bin"), [0u8, 255, 0, 255, 0, 255, 0, 255]).unwrap();

        let field = VolumeField::load(&json_path).unwrap();
        assert_eq!(field.dims, [2, 2, 2]);
        assert_eq!(field.value_range, [0.0, 100.0]);
    }

    #[test]
    fn test_load_malformed_descriptor_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("volume.json");
        std::fs::write(&json_path, "{ oops").unwrap();

        let err = VolumeField::load(&json_path).unwrap_err();
        assert!(matches!(err, Error::MalformedVolumeDescriptor { .. }));
    }

    #[test]
    fn test_load_wrong_byte_count_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("volume.json");
        std::fs::write(
            &json_path,
            r#"{ "dimensions": [2, 2, 2], "spacing": [1, 1, 1], "origin": [0, 0, 0], "valueRange": [0, 100] }"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("volume.bin"), [0u8; 3]).unwrap();

        let err = VolumeField::load(&json_path).unwrap_err();
        assert!(matches!(err, Error::MalformedVolumeDescriptor { .. }));
    }
}
