//! Font discovery and glyph painting onto tiny-skia pixmaps.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use tiny_skia::{Pixmap, PremultipliedColorU8};

use crate::color::Rgba;

pub const FONT_ENV: &str = "BANNERLY_FONT";
const LINE_BOX: f32 = 1.3;

const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn load_font(path: &Path) -> Result<Arc<Font>> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read font file {}", path.display()))?;
    let font = Font::from_bytes(bytes, FontSettings::default())
        .map_err(|error| anyhow!("failed to parse font {}: {error}", path.display()))?;
    Ok(Arc::new(font))
}

/// Finds a face to set banner text in: an explicit path (which must load),
/// then `BANNERLY_FONT`, then common system locations. `Ok(None)` means text
/// will be skipped.
pub fn discover_font(explicit: Option<&Path>) -> Result<Option<Arc<Font>>> {
    if let Some(path) = explicit {
        return load_font(path).map(Some);
    }

    if let Some(path) = env::var_os(FONT_ENV).filter(|value| !value.is_empty()) {
        let path = PathBuf::from(path);
        return load_font(&path)
            .with_context(|| format!("{FONT_ENV} points at an unusable font"))
            .map(Some);
    }

    for candidate in SYSTEM_FONT_CANDIDATES {
        let path = Path::new(candidate);
        if !path.is_file() {
            continue;
        }
        match load_font(path) {
            Ok(font) => {
                log::debug!("using system font {}", path.display());
                return Ok(Some(font));
            }
            Err(error) => log::debug!("skipping system font: {error:#}"),
        }
    }

    Ok(None)
}

pub fn missing_codepoints(font: &Font, text: &str) -> Vec<char> {
    text.chars()
        .filter(|ch| !ch.is_whitespace() && font.lookup_glyph_index(*ch) == 0)
        .collect()
}

#[derive(Debug, Clone)]
struct GlyphBitmap {
    width: usize,
    height: usize,
    bitmap: Vec<u8>,
}

/// Rasterizes lines of text into standalone pixmaps. One painter serves one
/// capture; its glyph cache is not shared.
pub struct TextPainter {
    font: Arc<Font>,
    glyph_cache: HashMap<fontdue::layout::GlyphRasterConfig, GlyphBitmap>,
}

impl TextPainter {
    pub fn new(font: Arc<Font>) -> Self {
        Self {
            font,
            glyph_cache: HashMap::new(),
        }
    }

    pub fn measure(&self, text: &str, font_size: f32) -> f32 {
        text.chars()
            .map(|ch| self.font.metrics(ch, font_size).advance_width)
            .sum()
    }

    pub fn line_box(&self, font_size: f32) -> f32 {
        (font_size * LINE_BOX).ceil().max(1.0)
    }

    /// A tight pixmap holding `text` in `color`, or `None` for empty text.
    pub fn render_line(&mut self, text: &str, font_size: f32, color: Rgba) -> Option<Pixmap> {
        if text.is_empty() || font_size <= 0.0 {
            return None;
        }
        let missing = missing_codepoints(&self.font, text);
        if !missing.is_empty() {
            log::warn!("font has no glyph for {:?} in '{}'", missing, text);
        }

        let width = self.measure(text, font_size).ceil().max(1.0) as u32 + 2;
        let height = self.line_box(font_size) as u32;
        let mut pixmap = Pixmap::new(width, height)?;

        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: 0.0,
            y: 0.0,
            max_width: None,
            max_height: None,
            horizontal_align: fontdue::layout::HorizontalAlign::Left,
            vertical_align: fontdue::layout::VerticalAlign::Top,
            line_height: 1.0,
            wrap_style: fontdue::layout::WrapStyle::Letter,
            wrap_hard_breaks: false,
        });
        layout.append(&[self.font.as_ref()], &TextStyle::new(text, font_size, 0));

        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let font = &self.font;
            let glyph_bitmap = self.glyph_cache.entry(glyph.key).or_insert_with(|| {
                let (_, bitmap) = font.rasterize_config(glyph.key);
                GlyphBitmap {
                    width: glyph.width,
                    height: glyph.height,
                    bitmap,
                }
            });
            blend_glyph(
                &mut pixmap,
                glyph.x.round() as i32,
                glyph.y.round() as i32,
                glyph_bitmap,
                color,
            );
        }

        Some(pixmap)
    }
}

fn blend_glyph(pixmap: &mut Pixmap, x: i32, y: i32, glyph: &GlyphBitmap, color: Rgba) {
    let width = pixmap.width() as i32;
    let height = pixmap.height() as i32;
    let pixels = pixmap.pixels_mut();

    for gy in 0..glyph.height {
        let py = y + gy as i32;
        if py < 0 || py >= height {
            continue;
        }
        for gx in 0..glyph.width {
            let px = x + gx as i32;
            if px < 0 || px >= width {
                continue;
            }
            let coverage = u32::from(glyph.bitmap[gy * glyph.width + gx]);
            if coverage == 0 {
                continue;
            }
            let idx = (py * width + px) as usize;
            pixels[idx] = source_over(pixels[idx], color, coverage);
        }
    }
}

/// Straight-alpha colour scaled by `coverage` (0..=255) over a premultiplied
/// destination pixel.
pub fn source_over(dst: PremultipliedColorU8, color: Rgba, coverage: u32) -> PremultipliedColorU8 {
    let alpha = u32::from(color.a) * coverage / 255;
    let inv = 255 - alpha;
    let channel = |src: u8, dst: u8| -> u8 {
        (u32::from(src) * alpha / 255 + u32::from(dst) * inv / 255).min(255) as u8
    };
    let out_a = (alpha + u32::from(dst.alpha()) * inv / 255).min(255) as u8;
    PremultipliedColorU8::from_rgba(
        channel(color.r, dst.red()),
        channel(color.g, dst.green()),
        channel(color.b, dst.blue()),
        out_a,
    )
    .unwrap_or(PremultipliedColorU8::TRANSPARENT)
}

#[cfg(test)]
mod tests {
    use tiny_skia::PremultipliedColorU8;

    use super::{discover_font, source_over};
    use crate::color::Rgba;

    #[test]
    fn full_coverage_replaces_destination() {
        let out = source_over(PremultipliedColorU8::TRANSPARENT, Rgba::rgb(255, 0, 0), 255);
        assert_eq!((out.red(), out.green(), out.blue(), out.alpha()), (255, 0, 0, 255));
    }

    #[test]
    fn zero_coverage_keeps_destination() {
        let dst = PremultipliedColorU8::from_rgba(10, 20, 30, 255).unwrap();
        let out = source_over(dst, Rgba::WHITE, 0);
        assert_eq!(out, dst);
    }

    #[test]
    fn explicit_missing_font_is_an_error() {
        let error = discover_font(Some(std::path::Path::new("/definitely/not/a/font.ttf")))
            .err()
            .expect("missing explicit font should fail");
        assert!(error.to_string().contains("failed to read font file"));
    }
}
