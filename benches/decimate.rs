use criterion::{black_box, criterion_group, criterion_main, Criterion};

use thermoscope::volume::decimate;

/// Synthetic field with a smooth radial gradient
fn test_field(size: u32) -> Vec<u8> {
    let c = (size - 1) as f32 / 2.0;
    let mut voxels = Vec::with_capacity((size * size * size) as usize);
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2) + (z as f32 - c).powi(2)).sqrt();
                voxels.push((255.0 * (1.0 - d / (c * 1.8)).clamp(0.0, 1.0)) as u8);
            }
        }
    }
    voxels
}

fn bench_decimate_half_64(c: &mut Criterion) {
    let size = 64u32;
    let voxels = test_field(size);

    c.bench_function("decimate_half_64", |b| {
        b.iter(|| decimate([size; 3], black_box(&voxels), 2));
    });
}

fn bench_decimate_quarter_64(c: &mut Criterion) {
    let size = 64u32;
    let voxels = test_field(size);

    c.bench_function("decimate_quarter_64", |b| {
        b.iter(|| decimate([size; 3], black_box(&voxels), 4));
    });
}

fn bench_decimate_half_128(c: &mut Criterion) {
    let size = 128u32;
    let voxels = test_field(size);

    c.bench_function("decimate_half_128", |b| {
        b.iter(|| decimate([size; 3], black_box(&voxels), 2));
    });
}

criterion_group!(
    benches,
    bench_decimate_half_64,
    bench_decimate_quarter_64,
    bench_decimate_half_128
);
criterion_main!(benches);
