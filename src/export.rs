//! Snapshot export: capture a mounted banner at a fixed size, encode it as
//! PNG and hand it to a download sink.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use base64::Engine as _;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::capture::{CaptureSurface, PixelSize, RenderTree};
use crate::error::BannerError;
use crate::raster::Rasterize;

pub const DEFAULT_CAPTURE_WIDTH: u32 = 1500;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 500;
pub const DEFAULT_PACING_MS: u64 = 500;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const FALLBACK_FILE_NAME: &str = "custom.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Idle,
    Generating,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportConfig {
    /// Slept after entering `Generating` and before the capture starts.
    pub pacing: Duration,
    /// Upper bound on rasterization.
    pub timeout: Duration,
    pub size: PixelSize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(DEFAULT_PACING_MS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            size: PixelSize::new(DEFAULT_CAPTURE_WIDTH, DEFAULT_CAPTURE_HEIGHT),
        }
    }
}

/// A finished export. Lives until the next export starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedImage {
    pub file_name: String,
    #[serde(skip)]
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sha256: String,
    pub saved_to: PathBuf,
    pub hosted_url: Option<Url>,
}

impl ExportedImage {
    /// Re-reads a PNG written by an earlier export.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let png = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let decoded = image::load_from_memory(&png)
            .with_context(|| format!("{} is not a readable image", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
        Ok(Self {
            file_name,
            width: decoded.width(),
            height: decoded.height(),
            sha256: sha256_hex(&png),
            png,
            saved_to: path.to_path_buf(),
            hosted_url: None,
        })
    }

    /// `data:image/png;base64,...` form of the encoded image.
    pub fn data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }
}

/// Trimmed, whitespace runs collapsed to `-`, lowercased. Path separators
/// and characters that are not portable in file names also become `-`, and
/// leading or trailing `-`/`.` are dropped, so the slug is always a single
/// path component.
pub fn slugify(name: &str) -> String {
    let slug: String = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
        .chars()
        .map(|ch| if is_file_name_safe(ch) { ch } else { '-' })
        .collect();
    slug.trim_matches(|ch| ch == '-' || ch == '.').to_owned()
}

fn is_file_name_safe(ch: char) -> bool {
    !ch.is_control() && !matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

pub fn banner_file_name(name: &str) -> String {
    let slug = slugify(name);
    if slug.is_empty() {
        FALLBACK_FILE_NAME.to_owned()
    } else {
        format!("{slug}-banner.png")
    }
}

/// Where finished PNGs go.
pub trait DownloadSink: Send + Sync {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, BannerError>;
}

/// Writes into an output directory, creating it on demand.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DownloadSink for DirectorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, BannerError> {
        fs::create_dir_all(&self.dir).map_err(|source| BannerError::Save {
            path: self.dir.clone(),
            source,
        })?;
        let mut components = Path::new(file_name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(BannerError::Save {
                path: self.dir.join(file_name),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("'{file_name}' is not a plain file name"),
                ),
            });
        }
        let path = self.dir.join(file_name);
        fs::write(&path, bytes).map_err(|source| BannerError::Save {
            path: path.clone(),
            source,
        })?;
        log::info!("saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// Keeps saved files in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files
            .lock()
            .map(|files| files.clone())
            .unwrap_or_default()
    }
}

impl DownloadSink for MemorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, BannerError> {
        let mut files = self.files.lock().map_err(|_| BannerError::Save {
            path: PathBuf::from(file_name),
            source: std::io::Error::other("memory sink poisoned"),
        })?;
        files.push((file_name.to_owned(), bytes.to_vec()));
        Ok(PathBuf::from(file_name))
    }
}

pub struct SnapshotExporter {
    rasterizer: Arc<dyn Rasterize>,
    sink: Arc<dyn DownloadSink>,
    config: ExportConfig,
    state: ExportState,
    image: Option<ExportedImage>,
}

impl SnapshotExporter {
    pub fn new(
        rasterizer: Arc<dyn Rasterize>,
        sink: Arc<dyn DownloadSink>,
        config: ExportConfig,
    ) -> Self {
        Self {
            rasterizer,
            sink,
            config,
            state: ExportState::Idle,
            image: None,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn trigger_enabled(&self) -> bool {
        self.state != ExportState::Generating
    }

    pub fn image(&self) -> Option<&ExportedImage> {
        self.image.as_ref()
    }

    /// Enters `Generating` and drops the previous image.
    pub fn begin(&mut self) -> Result<(), BannerError> {
        if self.state == ExportState::Generating {
            return Err(BannerError::ExportInFlight);
        }
        self.state = ExportState::Generating;
        self.image = None;
        Ok(())
    }

    /// Records where the current image was uploaded.
    pub fn attach_hosted_url(&mut self, url: Url) -> Option<&ExportedImage> {
        let image = self.image.as_mut()?;
        image.hosted_url = Some(url);
        Some(image)
    }

    pub fn export_banner(
        &mut self,
        tree: &mut RenderTree,
        target_id: &str,
        size: PixelSize,
        file_stem_source: &str,
    ) -> Result<&ExportedImage, BannerError> {
        self.begin()?;
        if !self.config.pacing.is_zero() {
            thread::sleep(self.config.pacing);
        }

        match self.capture_and_save(tree, target_id, size, file_stem_source) {
            Ok(image) => {
                self.state = ExportState::Ready;
                Ok(self.image.insert(image))
            }
            Err(error) => {
                log::error!("export of '{target_id}' failed: {error}");
                self.state = ExportState::Failed;
                Err(error)
            }
        }
    }

    fn capture_and_save(
        &self,
        tree: &mut RenderTree,
        target_id: &str,
        size: PixelSize,
        file_stem_source: &str,
    ) -> Result<ExportedImage, BannerError> {
        let started = Instant::now();
        let pixels = {
            let surface = CaptureSurface::acquire(tree, target_id, size)?;
            rasterize_with_timeout(
                Arc::clone(&self.rasterizer),
                surface.banner().clone(),
                self.config.timeout,
            )?
        };
        log::debug!(
            "rasterized {}x{} in {:?}",
            pixels.width(),
            pixels.height(),
            started.elapsed()
        );

        let png = encode_png(&pixels)?;
        let file_name = banner_file_name(file_stem_source);
        let saved_to = self.sink.save(&file_name, &png)?;

        Ok(ExportedImage {
            file_name,
            width: pixels.width(),
            height: pixels.height(),
            sha256: sha256_hex(&png),
            png,
            saved_to,
            hosted_url: None,
        })
    }
}

fn rasterize_with_timeout(
    rasterizer: Arc<dyn Rasterize>,
    banner: crate::layout::RenderedBanner,
    timeout: Duration,
) -> Result<RgbaImage, BannerError> {
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("bannerly-rasterize".to_owned())
        .spawn(move || {
            let _ = sender.send(rasterizer.rasterize(&banner));
        })
        .map_err(|error| BannerError::Capture(format!("failed to spawn rasterizer: {error}")))?;

    match receiver.recv_timeout(timeout) {
        Ok(Ok(pixels)) => Ok(pixels),
        Ok(Err(error)) => Err(BannerError::Capture(format!("{error:#}"))),
        Err(RecvTimeoutError::Timeout) => Err(BannerError::CaptureTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(BannerError::Capture(
            "rasterizer thread exited without a result".to_owned(),
        )),
    }
}

pub fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>, BannerError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(
            pixels.as_raw(),
            pixels.width(),
            pixels.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|error| BannerError::Capture(format!("failed to encode png: {error}")))?;
    Ok(png)
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
