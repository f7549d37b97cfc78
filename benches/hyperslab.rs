use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use minc_volume::{
    BrickBackend, BrickSize, CompressionLevel, CompressionMethod, DataType, Dimension, Minc2Writer,
    Slab, Volume, VolumeHandle, VolumeLayout, VolumeWriter, VoxelBuffer,
};
use std::path::Path;

const SIZE: usize = 96;

fn layout() -> VolumeLayout {
    VolumeLayout::new(
        DataType::U16,
        vec![
            Dimension::new("zspace", SIZE, 1.0, 0.0),
            Dimension::new("yspace", SIZE, 1.0, 0.0),
            Dimension::new("xspace", SIZE, 1.0, 0.0),
        ],
    )
    .unwrap()
    .with_brick_size(BrickSize::uniform(3, 32))
    .unwrap()
}

fn bench_volume<H: VolumeHandle>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    name: &str,
    volume: &Volume<H>,
) {
    let slice = Slab::new(vec![SIZE / 2, 0, 0], vec![1, SIZE, SIZE]).unwrap();

    group.throughput(Throughput::Elements((SIZE * SIZE * SIZE) as u64));
    group.bench_function(BenchmarkId::new("volume", name), |b| {
        b.iter(|| {
            let values: VoxelBuffer<f64> = volume.read_volume().unwrap();
            values
        });
    });

    group.throughput(Throughput::Elements((SIZE * SIZE) as u64));
    group.bench_function(BenchmarkId::new("axial_slice", name), |b| {
        b.iter(|| {
            let values: VoxelBuffer<f64> = volume.read_slab(&slice).unwrap();
            values
        });
    });
}

fn hyperslab_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("hyperslab_read");
    let temp_dir = tempfile::tempdir().unwrap();
    let dir: &Path = temp_dir.path();
    let data: Vec<u16> = (0..SIZE * SIZE * SIZE).map(|v| (v % 4096) as u16).collect();

    for level in [0, 6] {
        let path = dir.join(format!("deflate{level}.mnc"));
        Minc2Writer::new(layout())
            .with_compression_level(CompressionLevel::new(level))
            .write(&path, &data)
            .unwrap();
        let volume = Volume::open(&path).unwrap();
        bench_volume(&mut group, &format!("minc2_deflate{level}"), &volume);
    }

    for method in [CompressionMethod::None, CompressionMethod::Deflate, CompressionMethod::Zstd] {
        let path = dir.join(format!("{method:?}.brick"));
        VolumeWriter::new(layout())
            .with_compression(method)
            .write(&path, &data)
            .unwrap();
        let volume = Volume::open_with(&BrickBackend, &path).unwrap();
        bench_volume(&mut group, &format!("brick_{method:?}"), &volume);
    }

    group.finish();
}

criterion_group!(benches, hyperslab_read);
criterion_main!(benches);
