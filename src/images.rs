//! Image lookup for backgrounds, tech icons and avatars.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use image::RgbaImage;

/// Resolves an image reference (relative path or https URL) to pixels.
pub trait ImageSource: Send + Sync {
    fn load(&self, reference: &str) -> Result<RgbaImage>;
}

pub fn decode_image(bytes: &[u8], reference: &str) -> Result<RgbaImage> {
    let decoded = image::load_from_memory(bytes)
        .with_context(|| format!("failed to decode image '{reference}'"))?;
    Ok(decoded.to_rgba8())
}

/// Directory that local image references are confined to. Lookups that
/// escape it, directly or through a symlink, are refused.
#[derive(Debug, Clone)]
pub struct AssetRoot {
    root: PathBuf,
}

impl AssetRoot {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = fs::canonicalize(root.as_ref()).with_context(|| {
            format!(
                "failed to canonicalize asset directory {}",
                root.as_ref().display()
            )
        })?;
        Ok(Self { root })
    }

    pub fn resolve<P: AsRef<Path>>(&self, target: P) -> Result<PathBuf> {
        let combined = self.root.join(target.as_ref());
        let canonical = fs::canonicalize(&combined)
            .with_context(|| format!("image not found: {}", combined.display()))?;

        if !canonical.starts_with(&self.root) {
            bail!(
                "image path escapes asset directory: {}",
                canonical.display()
            );
        }
        Ok(canonical)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Reads images from an [`AssetRoot`]. Has no network access.
#[derive(Debug, Clone, Default)]
pub struct LocalImageSource {
    root: Option<AssetRoot>,
}

impl LocalImageSource {
    pub fn new(root: Option<AssetRoot>) -> Self {
        Self { root }
    }
}

impl ImageSource for LocalImageSource {
    fn load(&self, reference: &str) -> Result<RgbaImage> {
        if is_remote(reference) {
            bail!("remote image '{reference}' needs the `remote` feature");
        }
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| anyhow!("no asset directory configured for '{reference}'"))?;
        let path = root.resolve(reference.trim_start_matches("file://"))?;
        let bytes =
            fs::read(&path).with_context(|| format!("failed to read image {}", path.display()))?;
        decode_image(&bytes, reference)
    }
}

pub fn is_remote(reference: &str) -> bool {
    reference.trim().to_ascii_lowercase().starts_with("https://")
}

#[cfg(feature = "remote")]
pub use remote::HttpImageSource;

#[cfg(feature = "remote")]
mod remote {
    use std::time::Duration;

    use anyhow::{anyhow, Context, Result};
    use image::RgbaImage;
    use reqwest::Client;
    use tokio::runtime::Runtime;

    use super::{decode_image, is_remote, ImageSource, LocalImageSource};

    /// https references go over the network, everything else to the local
    /// source.
    pub struct HttpImageSource {
        http: Client,
        runtime: Runtime,
        local: LocalImageSource,
    }

    impl HttpImageSource {
        pub fn new(local: LocalImageSource, timeout: Duration) -> Result<Self> {
            let http = Client::builder()
                .timeout(timeout)
                .build()
                .context("failed to build http client")?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start image fetch runtime")?;
            Ok(Self {
                http,
                runtime,
                local,
            })
        }

        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .with_context(|| format!("failed to fetch {url}"))?
                .error_for_status()
                .with_context(|| format!("{url} returned an error status"))?;
            let bytes = response
                .bytes()
                .await
                .with_context(|| format!("failed to read body of {url}"))?;
            Ok(bytes.to_vec())
        }
    }

    impl ImageSource for HttpImageSource {
        fn load(&self, reference: &str) -> Result<RgbaImage> {
            if !is_remote(reference) {
                return self.local.load(reference);
            }
            let url = reference.trim();
            let bytes = self
                .runtime
                .block_on(self.fetch(url))
                .map_err(|error| anyhow!("{error:#}"))?;
            log::debug!("fetched {} bytes from {url}", bytes.len());
            decode_image(&bytes, url)
        }
    }
}
