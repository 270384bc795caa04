//! ABR codec benchmarks

use std::io::Cursor;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{Rgba, RgbaImage};
use sutu_abr::abr::rle::{packbits_decode, packbits_encode};
use sutu_abr::abr::{self, AbrFileVersion, BrushDocument, BrushLayer, SaveOptions};

/// Soft round brush mask, typical of sampled brushes
fn generate_mask(size: u32) -> RgbaImage {
    let center = size as f32 / 2.0;
    RgbaImage::from_fn(size, size, |x, y| {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        let falloff = 1.0 - (dx * dx + dy * dy).sqrt() / center;
        Rgba([0, 0, 0, (falloff.clamp(0.0, 1.0) * 255.0) as u8])
    })
}

fn generate_document(size: u32, layers: usize) -> BrushDocument {
    let mut document = BrushDocument::new(size, size);
    for i in 0..layers {
        let mut layer = BrushLayer::new(format!("Brush {}", i), generate_mask(size));
        layer.set_spacing(25);
        document.layers.push(layer);
    }
    document
}

fn benchmark_rle(c: &mut Criterion) {
    let mut group = c.benchmark_group("PackBits");

    for size in [64u32, 256, 1024].iter() {
        let mask = generate_mask(*size);
        let row: Vec<u8> = mask
            .rows()
            .nth(*size as usize / 2)
            .map(|r| r.map(|p| p.0[3]).collect())
            .unwrap_or_default();
        let encoded = packbits_encode(&row);

        group.throughput(Throughput::Bytes(row.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode_row", size), &row, |b, row| {
            b.iter(|| packbits_encode(row))
        });
        group.bench_with_input(BenchmarkId::new("decode_row", size), &encoded, |b, encoded| {
            b.iter(|| packbits_decode(encoded, row.len()))
        });
    }

    group.finish();
}

fn benchmark_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("ABR File");

    for rle in [true, false] {
        let document = generate_document(256, 8);
        let options = SaveOptions {
            version: AbrFileVersion::Version2,
            rle,
        };
        let label = if rle { "rle" } else { "raw" };

        let mut sink = Cursor::new(Vec::new());
        let _ = abr::save(&document, &mut sink, options, |_| {});
        let bytes = sink.into_inner();

        group.bench_function(BenchmarkId::new("encode", label), |b| {
            b.iter(|| {
                let mut sink = Cursor::new(Vec::with_capacity(bytes.len()));
                abr::save(&document, &mut sink, options, |_| {})
            })
        });
        group.bench_function(BenchmarkId::new("decode", label), |b| {
            b.iter(|| abr::decode(Cursor::new(bytes.as_slice())))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_rle, benchmark_file);
criterion_main!(benches);
