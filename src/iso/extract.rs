//! Isosurface extraction task
//!
//! Runs in an isolated worker with no shared mutable state: the request
//! carries its own copy of the field buffer, the response comes back as
//! one message. The triangulation itself is delegated to the
//! `fast-surface-nets` crate over a stride-sampled lattice.

use std::sync::Arc;

use fast_surface_nets::ndshape::RuntimeShape;
use fast_surface_nets::{surface_nets, SurfaceNetsBuffer};

/// Extraction request transferred to the task
#[derive(Clone)]
pub struct ExtractRequest {
    pub dims: [u32; 3],
    pub spacing: [f32; 3],
    pub origin: [f32; 3],
    /// Isovalue quantized into the field's byte encoding
    pub threshold: u8,
    /// Sampling stride: 1 = every voxel, 3 = every third voxel
    pub stride: u32,
    pub voxels: Arc<Vec<u8>>,
}

/// Extraction result: a triangle soup with optional per-vertex attributes
#[derive(Debug, Default)]
pub struct ExtractResponse {
    /// Flat vertex positions in world units, three vertices per triangle
    pub positions: Vec<[f32; 3]>,
    /// Unit normals, one per vertex
    pub normals: Option<Vec<[f32; 3]>>,
    /// Field value sampled at each vertex, in the byte encoding
    pub scalars: Option<Vec<f32>>,
}

impl ExtractResponse {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Run one extraction. Zero output vertices is a normal outcome meaning
/// no surface crosses the threshold anywhere in the field.
pub fn run_extraction(req: &ExtractRequest) -> Result<ExtractResponse, String> {
    if req.stride == 0 {
        return Err("stride must be at least 1".to_string());
    }
    let expected = req.dims[0] as usize * req.dims[1] as usize * req.dims[2] as usize;
    if req.voxels.len() != expected {
        return Err(format!(
            "buffer holds {} bytes, dims {:?} require {}",
            req.voxels.len(), req.dims, expected
        ));
    }

    let sd = [
        req.dims[0].div_ceil(req.stride),
        req.dims[1].div_ceil(req.stride),
        req.dims[2].div_ceil(req.stride),
    ];
    // Too few samples along some axis to bracket a crossing
    if sd.iter().any(|&n| n < 2) {
        return Ok(ExtractResponse::default());
    }

    // Signed distance proxy: negative inside the hot region, so normals
    // come out pointing toward colder values
    let threshold = req.threshold as f32;
    let mut sdf = Vec::with_capacity(sd[0] as usize * sd[1] as usize * sd[2] as usize);
    for z in 0..sd[2] {
        for y in 0..sd[1] {
            for x in 0..sd[0] {
                let src = voxel_index(req.dims, x * req.stride, y * req.stride, z * req.stride);
                sdf.push(threshold - req.voxels[src] as f32);
            }
        }
    }

    let shape = RuntimeShape::<u32, 3>::new(sd);
    let mut buffer = SurfaceNetsBuffer::default();
    surface_nets(&sdf, &shape, [0; 3], [sd[0] - 1, sd[1] - 1, sd[2] - 1], &mut buffer);

    if buffer.positions.is_empty() || buffer.indices.is_empty() {
        return Ok(ExtractResponse::default());
    }

    // Flatten the indexed mesh into the triangle-soup wire shape
    let n = buffer.indices.len();
    let mut positions = Vec::with_capacity(n);
    let mut normals = Vec::with_capacity(n);
    let mut scalars = Vec::with_capacity(n);

    let stride = req.stride as f32;
    for &i in &buffer.indices {
        let p = buffer.positions[i as usize];
        positions.push([
            req.origin[0] + p[0] * stride * req.spacing[0],
            req.origin[1] + p[1] * stride * req.spacing[1],
            req.origin[2] + p[2] * stride * req.spacing[2],
        ]);
        normals.push(normalize_or_up(buffer.normals[i as usize]));
        scalars.push(sample_trilinear(
            req.dims,
            &req.voxels,
            [p[0] * stride, p[1] * stride, p[2] * stride],
        ));
    }

    Ok(ExtractResponse {
        positions,
        normals: Some(normals),
        scalars: Some(scalars),
    })
}

fn voxel_index(dims: [u32; 3], x: u32, y: u32, z: u32) -> usize {
    (z as usize * dims[1] as usize + y as usize) * dims[0] as usize + x as usize
}

fn normalize_or_up(n: [f32; 3]) -> [f32; 3] {
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > 1e-8 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}

/// Trilinear interpolation of the byte field at a fractional voxel
/// coordinate, clamped to the field extent
pub fn sample_trilinear(dims: [u32; 3], voxels: &[u8], pos: [f32; 3]) -> f32 {
    let clamp_axis = |p: f32, n: u32| p.clamp(0.0, (n - 1) as f32);
    let px = clamp_axis(pos[0], dims[0]);
    let py = clamp_axis(pos[1], dims[1]);
    let pz = clamp_axis(pos[2], dims[2]);

    let x0 = px.floor() as u32;
    let y0 = py.floor() as u32;
    let z0 = pz.floor() as u32;
    let x1 = (x0 + 1).min(dims[0] - 1);
    let y1 = (y0 + 1).min(dims[1] - 1);
    let z1 = (z0 + 1).min(dims[2] - 1);

    let fx = px - x0 as f32;
    let fy = py - y0 as f32;
    let fz = pz - z0 as f32;

    let at = |x: u32, y: u32, z: u32| voxels[voxel_index(dims, x, y, z)] as f32;

    let c00 = at(x0, y0, z0) * (1.0 - fx) + at(x1, y0, z0) * fx;
    let c10 = at(x0, y1, z0) * (1.0 - fx) + at(x1, y1, z0) * fx;
    let c01 = at(x0, y0, z1) * (1.0 - fx) + at(x1, y0, z1) * fx;
    let c11 = at(x0, y1, z1) * (1.0 - fx) + at(x1, y1, z1) * fx;

    let c0 = c00 * (1.0 - fy) + c10 * fy;
    let c1 = c01 * (1.0 - fy) + c11 * fy;

    c0 * (1.0 - fz) + c1 * fz
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Byte field with a hot sphere in the middle of an n-cubed grid
    fn sphere_field(n: u32, radius: f32) -> Arc<Vec<u8>> {
        let c = (n - 1) as f32 / 2.0;
        let mut voxels = Vec::with_capacity((n * n * n) as usize);
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    let dx = x as f32 - c;
                    let dy = y as f32 - c;
                    let dz = z as f32 - c;
                    let d = (dx * dx + dy * dy + dz * dz).sqrt();
                    voxels.push(if d < radius { 255 } else { 0 });
                }
            }
        }
        Arc::new(voxels)
    }

    fn request(dims: [u32; 3], voxels: Arc<Vec<u8>>, threshold: u8, stride: u32) -> ExtractRequest {
        ExtractRequest {
            dims,
            spacing: [0.1; 3],
            origin: [0.0; 3],
            threshold,
            stride,
            voxels,
        }
    }

    #[test]
    fn test_all_zero_field_yields_no_surface() {
        let req = request([8, 8, 8], Arc::new(vec![0u8; 512]), 0, 1);
        let resp = run_extraction(&req).unwrap();
        assert_eq!(resp.vertex_count(), 0);
    }

    #[test]
    fn test_sphere_produces_triangles() {
        let req = request([16, 16, 16], sphere_field(16, 5.0), 128, 1);
        let resp = run_extraction(&req).unwrap();

        assert!(resp.vertex_count() > 0);
        assert_eq!(resp.vertex_count() % 3, 0, "triangle soup length");

        let normals = resp.normals.unwrap();
        let scalars = resp.scalars.unwrap();
        assert_eq!(normals.len(), resp.positions.len());
        assert_eq!(scalars.len(), resp.positions.len());

        for n in &normals {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_positions_respect_origin_and_spacing() {
        let mut req = request([16, 16, 16], sphere_field(16, 5.0), 128, 1);
        req.origin = [10.0, 20.0, 30.0];
        let resp = run_extraction(&req).unwrap();

        // 16 voxels at 0.1 spacing: everything stays within the cuboid
        for p in &resp.positions {
            assert!(p[0] >= 10.0 && p[0] <= 11.6);
            assert!(p[1] >= 20.0 && p[1] <= 21.6);
            assert!(p[2] >= 30.0 && p[2] <= 31.6);
        }
    }

    #[test]
    fn test_stride_reduces_vertex_count() {
        let voxels = sphere_field(32, 12.0);
        let full = run_extraction(&request([32, 32, 32], voxels.clone(), 128, 1)).unwrap();
        let fast = run_extraction(&request([32, 32, 32], voxels, 128, 3)).unwrap();

        assert!(full.vertex_count() > 0);
        assert!(fast.vertex_count() > 0);
        assert!(fast.vertex_count() < full.vertex_count());
    }

    #[test]
    fn test_zero_stride_is_error() {
        let req = request([4, 4, 4], Arc::new(vec![0u8; 64]), 10, 0);
        assert!(run_extraction(&req).is_err());
    }

    #[test]
    fn test_mismatched_buffer_is_error() {
        let req = request([4, 4, 4], Arc::new(vec![0u8; 63]), 10, 1);
        assert!(run_extraction(&req).is_err());
    }

    #[test]
    fn test_sample_trilinear_exact_and_midpoint() {
        let dims = [2, 1, 1];
        let voxels = vec![0u8, 100];

        assert_eq!(sample_trilinear(dims, &voxels, [0.0, 0.0, 0.0]), 0.0);
        assert_eq!(sample_trilinear(dims, &voxels, [1.0, 0.0, 0.0]), 100.0);
        assert_eq!(sample_trilinear(dims, &voxels, [0.5, 0.0, 0.0]), 50.0);
        // Out-of-range positions clamp to the border
        assert_eq!(sample_trilinear(dims, &voxels, [5.0, 0.0, 0.0]), 100.0);
    }
}
