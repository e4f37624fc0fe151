use std::fs;
use std::sync::Arc;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use tempfile::tempdir;

use bannerly::background::BackgroundSpec;
use bannerly::capture::{PixelSize, SurfaceStyle, BANNER_TARGET_ID};
use bannerly::catalog::TechCatalog;
use bannerly::export::{DirectorySink, ExportConfig, ExportState, SnapshotExporter};
use bannerly::images::{AssetRoot, LocalImageSource};
use bannerly::profile::{parse_profile, BannerProfile, StackSelection};
use bannerly::raster::SkiaRasterizer;
use bannerly::session::BannerSession;
use bannerly::share::{ShareContentMode, ShareTarget, SiteMetadata};

const ADA: &str = r#"
name: Ada Lovelace
field: Systems Engineer
twitter: ada
github: adalovelace
stack: [python, rust]
"#;

fn session_in(dir: &std::path::Path, size: PixelSize) -> BannerSession {
    let icons = dir.join("icons");
    fs::create_dir_all(&icons).expect("icon dir should create");
    RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255]))
        .save(icons.join("python.png"))
        .expect("icon should write");

    let images = LocalImageSource::new(Some(AssetRoot::new(&icons).expect("asset root")));
    let rasterizer = SkiaRasterizer::new(None, Arc::new(images));
    let exporter = SnapshotExporter::new(
        Arc::new(rasterizer),
        Arc::new(DirectorySink::new(dir.join("out"))),
        ExportConfig {
            pacing: Duration::ZERO,
            timeout: Duration::from_secs(30),
            size,
        },
    );
    BannerSession::new(
        TechCatalog::builtin(),
        exporter,
        SiteMetadata::default(),
        ShareContentMode::PromoteSite,
    )
}

#[test]
fn profile_document_renders_to_named_png() {
    let dir = tempdir().expect("tempdir should create");
    let mut session = session_in(dir.path(), PixelSize::new(1500, 500));

    let loaded = parse_profile(ADA).expect("profile should parse");
    assert_eq!(loaded.profile.background, None);
    session.set_profile(loaded.profile);
    session.set_stack(loaded.stack);
    session.set_choice(loaded.choice);

    let banner = session.submit().expect("submit should pass validation");
    assert_eq!(banner.stack_icons(), vec!["python", "rust"]);
    assert_eq!(banner.background, BackgroundSpec::DefaultGradient);

    let image = session.export().expect("export should succeed").clone();
    assert_eq!(image.file_name, "ada-lovelace-banner.png");
    let path = dir.path().join("out").join("ada-lovelace-banner.png");
    assert_eq!(image.saved_to, path);

    let decoded = image::open(&path).expect("png should decode").to_rgba8();
    assert_eq!(decoded.dimensions(), (1500, 500));
    // The two-tone default background is opaque everywhere.
    assert_eq!(decoded.get_pixel(0, 0)[3], 255);
    assert_eq!(decoded.get_pixel(1499, 499)[3], 255);

    let twitter = session
        .share_url(ShareTarget::Twitter)
        .expect("share link after export");
    assert_eq!(twitter.host_str(), Some("x.com"));
}

#[test]
fn capture_at_a_different_size_scales_the_banner() {
    let dir = tempdir().expect("tempdir should create");
    let mut session = session_in(dir.path(), PixelSize::new(750, 250));
    session.set_profile(BannerProfile {
        name: "Grace Hopper".to_owned(),
        field: "Compilers".to_owned(),
        ..BannerProfile::default()
    });
    session.set_stack(StackSelection::from_ids(["python"]));
    session.submit().expect("submit");

    let image = session.export().expect("export");
    assert_eq!((image.width, image.height), (750, 250));
    assert!(image.data_url().starts_with("data:image/png;base64,"));
}

#[test]
fn failed_save_leaves_no_image_and_allows_retry() {
    let dir = tempdir().expect("tempdir should create");
    let blocker = dir.path().join("out");
    fs::write(&blocker, b"not a directory").expect("blocker should write");

    let mut session = session_in(dir.path(), PixelSize::new(150, 50));
    session.set_profile(BannerProfile {
        name: "Ada".to_owned(),
        field: "Engineer".to_owned(),
        ..BannerProfile::default()
    });
    session.submit().expect("submit");

    let error = session.export().expect_err("save into a file path must fail");
    assert_eq!(error.code(), "SAVE_FAILED");
    assert!(session.exported().is_none());
    assert!(session.share_url(ShareTarget::Facebook).is_none());
    assert!(session.export_enabled());

    fs::remove_file(&blocker).expect("blocker should remove");
    let image = session.export().expect("retry should succeed");
    assert_eq!(image.file_name, "ada-banner.png");
}

#[test]
fn exporter_state_machine_through_a_full_cycle() {
    let dir = tempdir().expect("tempdir should create");
    let rasterizer = SkiaRasterizer::new(None, Arc::new(LocalImageSource::default()));
    let mut exporter = SnapshotExporter::new(
        Arc::new(rasterizer),
        Arc::new(DirectorySink::new(dir.path())),
        ExportConfig {
            pacing: Duration::from_millis(5),
            timeout: Duration::from_secs(30),
            size: PixelSize::new(300, 100),
        },
    );
    assert_eq!(exporter.state(), ExportState::Idle);

    let mut tree = bannerly::capture::RenderTree::new();
    let profile = BannerProfile {
        name: "Ada".to_owned(),
        field: "Engineer".to_owned(),
        ..BannerProfile::default()
    };
    tree.mount(
        BANNER_TARGET_ID,
        bannerly::layout::resolve_layout(
            &profile,
            &StackSelection::new(),
            &TechCatalog::builtin(),
            Default::default(),
        ),
    );

    exporter
        .export_banner(&mut tree, BANNER_TARGET_ID, PixelSize::new(300, 100), "")
        .expect("export");
    assert_eq!(exporter.state(), ExportState::Ready);
    assert_eq!(
        exporter.image().map(|image| image.file_name.as_str()),
        Some("custom.png")
    );
    assert!(dir.path().join("custom.png").is_file());
    assert_eq!(tree.style(BANNER_TARGET_ID), Some(SurfaceStyle::HIDDEN));
}
