//! Box-filter decimation for volume tiers
//!
//! Downsamples a byte field by averaging non-overlapping k-cubed blocks.
//! Output dimensions are `ceil(input / k)` per axis so partial blocks at
//! the far edge still contribute. The rounding rule is pinned to
//! round-half-up: a block mean of 127.5 becomes 128.

use rayon::prelude::*;

/// Decimate a row-major (x fastest) byte field by integer stride `k`.
///
/// `k = 1` is the identity transform. Returns the output dimensions and
/// the decimated buffer.
pub fn decimate(dims: [u32; 3], voxels: &[u8], k: u32) -> ([u32; 3], Vec<u8>) {
    assert!(k >= 1, "stride must be at least 1");
    let [nx, ny, nz] = dims;
    assert_eq!(voxels.len(), nx as usize * ny as usize * nz as usize);

    if k == 1 {
        return (dims, voxels.to_vec());
    }

    let ox = nx.div_ceil(k);
    let oy = ny.div_ceil(k);
    let oz = nz.div_ceil(k);
    let out_dims = [ox, oy, oz];

    let slice_len = (ox * oy) as usize;
    let mut out = vec![0u8; slice_len * oz as usize];

    out.par_chunks_mut(slice_len).enumerate().for_each(|(zi, slice)| {
        let z0 = zi as u32 * k;
        let z1 = (z0 + k).min(nz);

        for yi in 0..oy {
            let y0 = yi * k;
            let y1 = (y0 + k).min(ny);

            for xi in 0..ox {
                let x0 = xi * k;
                let x1 = (x0 + k).min(nx);

                let mut sum = 0u64;
                let mut count = 0u64;
                for z in z0..z1 {
                    for y in y0..y1 {
                        let row = (z as usize * ny as usize + y as usize) * nx as usize;
                        for x in x0..x1 {
                            sum += voxels[row + x as usize] as u64;
                            count += 1;
                        }
                    }
                }

                let mean = sum as f64 / count as f64;
                slice[(yi * ox + xi) as usize] = (mean + 0.5).floor() as u8;
            }
        }
    });

    (out_dims, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_one_is_identity() {
        let dims = [3, 2, 2];
        let voxels: Vec<u8> = (0u8..12).collect();
        let (out_dims, out) = decimate(dims, &voxels, 1);
        assert_eq!(out_dims, dims);
        assert_eq!(out, voxels);
    }

    #[test]
    fn test_output_dims_are_ceiling() {
        let voxels = vec![0u8; 5 * 4 * 3];
        let (out_dims, out) = decimate([5, 4, 3], &voxels, 2);
        assert_eq!(out_dims, [3, 2, 2]);
        assert_eq!(out.len(), 3 * 2 * 2);

        let voxels = vec![0u8; 9 * 9 * 9];
        let (out_dims, _) = decimate([9, 9, 9], &voxels, 4);
        assert_eq!(out_dims, [3, 3, 3]);
    }

    #[test]
    fn test_round_half_up_scenario() {
        // Alternating 0/255 over a 2x2x2 block: mean 127.5 rounds up to 128
        let voxels = vec![0u8, 255, 0, 255, 0, 255, 0, 255];
        let (out_dims, out) = decimate([2, 2, 2], &voxels, 2);
        assert_eq!(out_dims, [1, 1, 1]);
        assert_eq!(out, vec![128]);
    }

    #[test]
    fn test_partial_blocks_average_their_own_voxels() {
        // 3 wide with k=2: second output column averages only the single
        // trailing input column
        let voxels = vec![10u8, 20, 90];
        let (out_dims, out) = decimate([3, 1, 1], &voxels, 2);
        assert_eq!(out_dims, [2, 1, 1]);
        assert_eq!(out[0], 15); // mean(10, 20)
        assert_eq!(out[1], 90); // mean(90)
    }

    #[test]
    fn test_uniform_field_stays_uniform() {
        let voxels = vec![77u8; 8 * 8 * 8];
        let (_, out) = decimate([8, 8, 8], &voxels, 4);
        assert!(out.iter().all(|&b| b == 77));
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let voxels = vec![255u8; 4 * 4 * 4];
        let (_, out) = decimate([4, 4, 4], &voxels, 4);
        assert_eq!(out, vec![255]);
    }
}
