use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use rust_omr::config::{ExtractConfig, LayoutConfig};
use rust_omr::extract::extract;
use rust_omr::layout::learn_layout;
use rust_omr::utils::binarization::sheet_binarize;

const QUESTIONS: u32 = 18;

fn key_sheet() -> RgbImage {
    let mut img = RgbImage::from_pixel(1000, 1400, Rgb([255, 255, 255]));
    for q in 0..QUESTIONS {
        for option in 0..5u32 {
            let center = (200 + 60 * option as i32, 100 + 70 * q as i32);
            draw_filled_circle_mut(&mut img, center, 20, Rgb([0, 0, 0]));
            if option != q % 5 {
                draw_filled_circle_mut(&mut img, center, 16, Rgb([255, 255, 255]));
            }
        }
    }
    img
}

fn bench_learn_layout(c: &mut Criterion) {
    let key = key_sheet();
    let config = LayoutConfig::default();
    c.bench_function("learn_layout_1000x1400", |b| {
        b.iter(|| learn_layout(black_box(&key), black_box(&config)))
    });
}

fn bench_extract(c: &mut Criterion) {
    let key = key_sheet();
    let layout_config = LayoutConfig::default();
    let Ok((layout, _)) = learn_layout(&key, &layout_config) else {
        return;
    };
    let binary = sheet_binarize(&key, &layout_config.binarize);
    let config = ExtractConfig::default();

    c.bench_function("extract_with_map", |b| {
        b.iter(|| extract(black_box(&key), black_box(&layout), Some(&binary), &config))
    });
    c.bench_function("extract_without_map", |b| {
        b.iter(|| extract(black_box(&key), black_box(&layout), None, &config))
    });
}

criterion_group!(benches, bench_learn_layout, bench_extract);
criterion_main!(benches);
