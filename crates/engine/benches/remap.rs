//! Benchmarks for block remapping

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geoclass_core::raster::{PixelBlock, PixelType, Window};
use geoclass_core::Matrix;
use geoclass_engine::{LookupTable, ValueHistogram};

fn land_cover_matrix() -> Matrix {
    let mut matrix = Matrix::with_default(0);
    for value in 0..200i64 {
        matrix.add(1 + value % 12, value * 7);
    }
    matrix
}

fn create_block<T: Copy>(rows: usize, cols: usize, f: impl Fn(usize) -> T) -> Vec<T> {
    (0..rows * cols).map(f).collect()
}

fn bench_remap_u16(c: &mut Criterion) {
    let matrix = land_cover_matrix();
    let lut = LookupTable::for_raster(matrix.invert(), PixelType::U16).unwrap();
    let mut group = c.benchmark_group("remap/u16_dense");
    for rows in [64, 256, 1024] {
        let window = Window::rows(0, rows, 1024);
        let data = create_block(rows, 1024, |i| ((i * 13) % 1500) as u16);
        let block = PixelBlock::from_vec(data, &window).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| lut.remap(black_box(&block)))
        });
    }
    group.finish();
}

fn bench_remap_i32(c: &mut Criterion) {
    let matrix = land_cover_matrix();
    let lut = LookupTable::for_raster(matrix.invert(), PixelType::I32).unwrap();
    let mut group = c.benchmark_group("remap/i32_sparse");
    for rows in [64, 256, 1024] {
        let window = Window::rows(0, rows, 1024);
        let data = create_block(rows, 1024, |i| ((i * 13) % 1500) as i32);
        let block = PixelBlock::from_vec(data, &window).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| lut.remap(black_box(&block)))
        });
    }
    group.finish();
}

fn bench_histogram(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerate/block_histogram");
    for rows in [64, 256] {
        let window = Window::rows(0, rows, 1024);
        let data = create_block(rows, 1024, |i| (i % 40) as u8);
        let block = PixelBlock::from_vec(data, &window).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| ValueHistogram::of_block(black_box(&block)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_remap_u16, bench_remap_i32, bench_histogram);
criterion_main!(benches);
