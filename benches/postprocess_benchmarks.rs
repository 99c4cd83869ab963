use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use garment_cutout::{
    backends::DefaultFallback, clean_mask, cutout_rgba, fill_holes, tight_bbox, BgrImage,
    SegmentationEngine, SegmentationMask,
};

/// Garment-like mask: filled ellipse with a hole and scattered noise
fn garment_mask(size: u32) -> SegmentationMask {
    let mut mask = SegmentationMask::zeros(size, size);
    let (cx, cy) = (f64::from(size) / 2.0, f64::from(size) / 2.0);
    let (rx, ry) = (f64::from(size) * 0.35, f64::from(size) * 0.42);
    for y in 0..size {
        for x in 0..size {
            let dx = (f64::from(x) - cx) / rx;
            let dy = (f64::from(y) - cy) / ry;
            if dx * dx + dy * dy <= 1.0 {
                mask.set(x, y, 255);
            }
        }
    }
    mask.fill_rect(size / 2 - 8, size / 2 - 8, 16, 16, 0);
    for i in (0..size).step_by(37) {
        mask.set(i, (i * 7) % size, 255);
    }
    mask
}

fn product_photo(size: u32) -> BgrImage {
    let mut data = Vec::with_capacity((size * size * 3) as usize);
    for y in 0..size {
        for x in 0..size {
            let inside = x > size / 4 && x < size * 3 / 4 && y > size / 5 && y < size * 4 / 5;
            if inside {
                data.extend_from_slice(&[40, 40, 180]);
            } else {
                data.extend_from_slice(&[235, 235, 235]);
            }
        }
    }
    BgrImage::from_raw(size, size, data).expect("buffer matches dimensions")
}

fn bench_postprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocess");
    for size in [256u32, 512, 768] {
        let mask = garment_mask(size);
        group.bench_with_input(BenchmarkId::new("clean_mask", size), &mask, |b, mask| {
            b.iter(|| clean_mask(black_box(mask), 3, 5));
        });
        group.bench_with_input(BenchmarkId::new("fill_holes", size), &mask, |b, mask| {
            b.iter(|| fill_holes(black_box(mask)));
        });
        group.bench_with_input(BenchmarkId::new("tight_bbox", size), &mask, |b, mask| {
            b.iter(|| tight_bbox(black_box(mask)));
        });
    }
    group.finish();
}

fn bench_compositor(c: &mut Criterion) {
    let image = product_photo(768);
    let mask = garment_mask(768);
    c.bench_function("cutout_rgba_768", |b| {
        b.iter(|| cutout_rgba(black_box(&image), black_box(&mask)));
    });
}

fn bench_fallback_engine(c: &mut Criterion) {
    let engine = DefaultFallback::new();
    let mut group = c.benchmark_group("fallback_engine");
    group.sample_size(10);
    for size in [256u32, 512] {
        let image = product_photo(size);
        group.bench_with_input(BenchmarkId::new("segment", size), &image, |b, image| {
            b.iter(|| engine.segment(black_box(image)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_postprocess, bench_compositor, bench_fallback_engine);
criterion_main!(benches);
