//! `bannerly.yaml`: site metadata, capture settings and tool paths.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::capture::PixelSize;
use crate::error_codes::CodedError;
use crate::export::{ExportConfig, DEFAULT_PACING_MS, DEFAULT_TIMEOUT_MS};
use crate::share::{default_promo_text, ShareContentMode, SiteMetadata, DEFAULT_SITE_URL};
use crate::text::FONT_ENV;

pub const DEFAULT_CONFIG_FILE: &str = "bannerly.yaml";
pub const UPLOAD_URL_ENV: &str = "BANNERLY_UPLOAD_URL";
pub const UPLOAD_PRESET_ENV: &str = "BANNERLY_UPLOAD_PRESET";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    #[serde(default)]
    site_url: Option<String>,
    #[serde(default)]
    share_mode: Option<ShareContentMode>,
    #[serde(default)]
    promo_text: Option<String>,
    #[serde(default)]
    hashtags: Option<Vec<String>>,
    #[serde(default)]
    capture: Option<CaptureDocument>,
    #[serde(default)]
    pacing_ms: Option<u64>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default)]
    font_path: Option<PathBuf>,
    #[serde(default)]
    icon_dir: Option<PathBuf>,
    #[serde(default)]
    catalog_path: Option<PathBuf>,
    #[serde(default)]
    upload: Option<UploadDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaptureDocument {
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct UploadDocument {
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    preset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub endpoint: Url,
    pub preset: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BannerConfig {
    pub site: SiteMetadata,
    pub share_mode: ShareContentMode,
    pub export: ExportConfig,
    pub output_dir: PathBuf,
    pub font_path: Option<PathBuf>,
    pub icon_dir: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub upload: Option<UploadConfig>,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            site: SiteMetadata::default(),
            share_mode: ShareContentMode::default(),
            export: ExportConfig::default(),
            output_dir: PathBuf::from("."),
            font_path: None,
            icon_dir: None,
            catalog_path: None,
            upload: None,
        }
    }
}

impl BannerConfig {
    /// An explicit path must exist; otherwise `bannerly.yaml` in the working
    /// directory is used when present. Environment overrides apply last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|path| path.is_file()),
        };

        let mut config = match path {
            Some(path) => {
                let contents = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                let base = path.parent().unwrap_or_else(|| Path::new(""));
                let config = Self::parse(&contents, base)
                    .map_err(|error| anyhow!("{}: {error:#}", path.display()))?;
                log::debug!("loaded config from {}", path.display());
                config
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Relative paths in `contents` are taken relative to `base`.
    pub fn parse(contents: &str, base: &Path) -> Result<Self> {
        let document: ConfigDocument = if contents.trim().is_empty() {
            ConfigDocument::default()
        } else {
            serde_yaml::from_str(contents).map_err(|error| {
                let location = error
                    .location()
                    .map(|location| {
                        format!("line {}, column {}", location.line(), location.column())
                    })
                    .unwrap_or_else(|| "unknown location".to_owned());
                anyhow!("failed to parse config yaml at {}: {}", location, error)
            })?
        };

        let site_url = match document.site_url.as_deref() {
            Some(raw) => parse_site_url(raw)?,
            None => Url::parse(DEFAULT_SITE_URL).context("default site url")?,
        };
        let mut site = SiteMetadata::new(site_url);
        if let Some(promo) = document.promo_text {
            site.promo_text = promo;
        }
        if let Some(hashtags) = document.hashtags {
            site.hashtags = hashtags
                .into_iter()
                .map(|tag| tag.trim().trim_start_matches('#').to_owned())
                .filter(|tag| !tag.is_empty())
                .collect();
        }

        let mut export = ExportConfig {
            pacing: Duration::from_millis(document.pacing_ms.unwrap_or(DEFAULT_PACING_MS)),
            timeout: Duration::from_millis(document.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
            ..ExportConfig::default()
        };
        if let Some(capture) = document.capture {
            export.size = PixelSize::new(capture.width, capture.height);
        }

        let upload = match document.upload {
            Some(upload) => upload_config(upload.endpoint, upload.preset)?,
            None => None,
        };

        let config = Self {
            site,
            share_mode: document.share_mode.unwrap_or_default(),
            export,
            output_dir: document
                .output_dir
                .map(|dir| base.join(dir))
                .unwrap_or_else(|| PathBuf::from(".")),
            font_path: document.font_path.map(|path| base.join(path)),
            icon_dir: document.icon_dir.map(|path| base.join(path)),
            catalog_path: document.catalog_path.map(|path| base.join(path)),
            upload,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(font) = lookup(FONT_ENV) {
            self.font_path = Some(PathBuf::from(font));
        }

        let endpoint = lookup(UPLOAD_URL_ENV);
        let preset = lookup(UPLOAD_PRESET_ENV);
        if endpoint.is_some() || preset.is_some() {
            let current = self.upload.take();
            self.upload = upload_config(
                endpoint.or_else(|| current.as_ref().map(|upload| upload.endpoint.to_string())),
                preset.or_else(|| current.map(|upload| upload.preset)),
            )?;
        }
        Ok(())
    }

    /// Overrides the site URL, regenerating the promo text if it still
    /// mentions the old one.
    pub fn set_site_url(&mut self, raw: &str) -> Result<()> {
        let url = parse_site_url(raw)?;
        if self.site.promo_text == default_promo_text(&self.site.site_url) {
            self.site.promo_text = default_promo_text(&url);
        }
        self.site.site_url = url;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let size = self.export.size;
        if size.width == 0 || size.height == 0 {
            return Err(invalid_config(
                "capture",
                format!("capture size must be positive, got {}x{}", size.width, size.height),
            ));
        }
        if self.export.timeout.is_zero() {
            return Err(invalid_config("timeout_ms", "timeout_ms must be greater than 0"));
        }
        Ok(())
    }
}

fn parse_site_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|error| invalid_config("site_url", format!("invalid site_url '{raw}': {error}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid_config(
            "site_url",
            format!("site_url must be an absolute http(s) url, got '{raw}'"),
        ));
    }
    Ok(url)
}

fn upload_config(endpoint: Option<String>, preset: Option<String>) -> Result<Option<UploadConfig>> {
    match (endpoint, preset) {
        (None, None) => Ok(None),
        (Some(endpoint), Some(preset)) => {
            let endpoint = Url::parse(endpoint.trim()).map_err(|error| {
                invalid_config("upload", format!("invalid upload endpoint '{endpoint}': {error}"))
            })?;
            Ok(Some(UploadConfig { endpoint, preset }))
        }
        _ => Err(invalid_config(
            "upload",
            "upload needs both an endpoint and a preset",
        )),
    }
}

fn invalid_config(field: &str, message: impl Into<String>) -> anyhow::Error {
    anyhow!(CodedError::usage("INVALID_CONFIG", message).with_details(json!({ "field": field })))
}
