//! Banner rasterization benchmarks: layout alone, then full CPU rasterization.
//! Run: cargo bench

use std::sync::Arc;

use bannerly::catalog::TechCatalog;
use bannerly::images::LocalImageSource;
use bannerly::layout::resolve_layout;
use bannerly::profile::{BannerProfile, StackSelection};
use bannerly::raster::{Rasterize, SkiaRasterizer};
use bannerly::text::discover_font;
use bannerly::theme::{LayoutChoice, Theme};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn profile() -> BannerProfile {
    BannerProfile {
        name: "Ada Lovelace".to_owned(),
        field: "Systems Engineer".to_owned(),
        twitter: "ada".to_owned(),
        github: "adalovelace".to_owned(),
        ..BannerProfile::default()
    }
}

fn bench_rasterize(c: &mut Criterion) {
    let catalog = TechCatalog::builtin();
    let stack = StackSelection::from_ids(["python", "rust", "go", "docker", "postgresql"]);
    let choice = LayoutChoice {
        theme: Theme::Neon,
        ..LayoutChoice::default()
    };
    let banner = resolve_layout(&profile(), &stack, &catalog, choice);

    let mut group = c.benchmark_group("banner");
    group.sample_size(30);

    group.bench_function("resolve_layout_desktop", |b| {
        b.iter(|| black_box(resolve_layout(&profile(), &stack, &catalog, choice)));
    });

    let images = Arc::new(LocalImageSource::default());
    let shapes_only = SkiaRasterizer::new(None, images.clone());
    group.bench_function("rasterize_1500x500_no_text", |b| {
        b.iter(|| black_box(shapes_only.rasterize(&banner).expect("rasterize")));
    });

    // Text is benchmarked only when a system font is available.
    if let Ok(Some(font)) = discover_font(None) {
        let with_text = SkiaRasterizer::new(Some(font), images);
        group.bench_function("rasterize_1500x500_with_text", |b| {
            b.iter(|| black_box(with_text.rasterize(&banner).expect("rasterize")));
        });
    }

    group.bench_function("rasterize_3000x1000_scaled", |b| {
        let scaled = banner.scaled_to(3000, 1000);
        b.iter(|| black_box(shapes_only.rasterize(&scaled).expect("rasterize")));
    });

    group.finish();
}

criterion_group!(benches, bench_rasterize);
criterion_main!(benches);
