//! CPU rasterization of a [`RenderedBanner`] with tiny-skia.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use fontdue::Font;
use image::RgbaImage;
use tiny_skia::{
    ColorU8, FillRule, FilterQuality, GradientStop, LineCap, LinearGradient, Mask, Paint,
    PathBuilder, Pixmap, PixmapPaint, Point, RadialGradient, Shader, SpreadMode, Stroke,
    Transform,
};

use crate::background::{BackgroundSpec, GradientDescriptor, GradientKind};
use crate::color::Rgba;
use crate::images::ImageSource;
use crate::layout::{
    AvatarNode, BannerNode, DividerNode, GlyphNode, Rect, RenderedBanner, SocialGlyph, SwatchNode,
    TextAlign, TextNode,
};
use crate::text::TextPainter;

/// Turns a resolved visual tree into straight-alpha RGBA pixels.
pub trait Rasterize: Send + Sync {
    fn rasterize(&self, banner: &RenderedBanner) -> Result<RgbaImage>;
}

#[derive(Clone)]
pub struct SkiaRasterizer {
    font: Option<Arc<Font>>,
    images: Arc<dyn ImageSource>,
}

impl SkiaRasterizer {
    pub fn new(font: Option<Arc<Font>>, images: Arc<dyn ImageSource>) -> Self {
        Self { font, images }
    }
}

impl Rasterize for SkiaRasterizer {
    fn rasterize(&self, banner: &RenderedBanner) -> Result<RgbaImage> {
        let mut pixmap = Pixmap::new(banner.width, banner.height).ok_or_else(|| {
            anyhow!(
                "cannot allocate a {}x{} surface",
                banner.width,
                banner.height
            )
        })?;

        paint_background(&mut pixmap, &banner.background, self.images.as_ref())?;

        let mut painter = self.font.clone().map(TextPainter::new);
        if painter.is_none() {
            log::warn!("no font available; banner text is not drawn");
        }
        let mut canvas = Canvas {
            pixmap: &mut pixmap,
            painter: painter.as_mut(),
            images: self.images.as_ref(),
        };

        for node in &banner.nodes {
            match node {
                BannerNode::Text(text) => canvas.text(text),
                BannerNode::Glyph(glyph) => canvas.glyph(glyph),
                BannerNode::Divider(divider) => canvas.divider(divider),
                BannerNode::Swatch(swatch) => canvas.swatch(swatch),
                BannerNode::Avatar(avatar) => canvas.avatar(avatar),
            }
        }

        Ok(pixmap_to_rgba(&pixmap))
    }
}

pub fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut data = Vec::with_capacity(pixmap.pixels().len() * 4);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
        .unwrap_or_else(|| RgbaImage::new(pixmap.width(), pixmap.height()))
}

fn rgba_to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Some(pixmap)
}

fn paint_background(
    pixmap: &mut Pixmap,
    background: &BackgroundSpec,
    images: &dyn ImageSource,
) -> Result<()> {
    match background {
        BackgroundSpec::DefaultGradient => {
            paint_gradient(pixmap, &GradientDescriptor::default_two_tone());
            Ok(())
        }
        BackgroundSpec::CssGradient { gradient } => {
            paint_gradient(pixmap, gradient);
            Ok(())
        }
        BackgroundSpec::RemoteImage { url } => {
            let image = images
                .load(url.as_str())
                .with_context(|| format!("background image {url} is not usable"))?;
            let source = rgba_to_pixmap(&image)
                .ok_or_else(|| anyhow!("background image {url} is empty"))?;
            let (width, height) = (pixmap.width() as f32, pixmap.height() as f32);
            let scale = (width / source.width() as f32).max(height / source.height() as f32);
            let tx = (width - source.width() as f32 * scale) / 2.0;
            let ty = (height - source.height() as f32 * scale) / 2.0;
            pixmap.draw_pixmap(
                0,
                0,
                source.as_ref(),
                &PixmapPaint {
                    quality: FilterQuality::Bicubic,
                    ..PixmapPaint::default()
                },
                Transform::from_row(scale, 0.0, 0.0, scale, tx, ty),
                None,
            );
            Ok(())
        }
    }
}

pub fn paint_gradient(pixmap: &mut Pixmap, gradient: &GradientDescriptor) {
    let width = pixmap.width() as f32;
    let height = pixmap.height() as f32;
    let offsets = gradient.resolved_offsets();
    let stops = gradient
        .stops
        .iter()
        .zip(offsets)
        .map(|(stop, offset)| GradientStop::new(offset, stop.color.to_skia()))
        .collect::<Vec<_>>();
    let fallback = gradient
        .stops
        .first()
        .map(|stop| stop.color)
        .unwrap_or(Rgba::BLACK);

    let shader = match gradient.kind {
        GradientKind::Linear { angle_deg } => {
            // CSS gradient line: through the centre, long enough that the
            // corners land exactly on 0% and 100%.
            let radians = angle_deg.to_radians();
            let (dx, dy) = (radians.sin(), -radians.cos());
            let half = (width * dx.abs() + height * dy.abs()) / 2.0;
            let (cx, cy) = (width / 2.0, height / 2.0);
            LinearGradient::new(
                Point::from_xy(cx - dx * half, cy - dy * half),
                Point::from_xy(cx + dx * half, cy + dy * half),
                stops,
                SpreadMode::Pad,
                Transform::identity(),
            )
        }
        GradientKind::Radial { center_x, center_y } => {
            let cx = width * center_x;
            let cy = height * center_y;
            let far_x = cx.max(width - cx);
            let far_y = cy.max(height - cy);
            let radius = (far_x * far_x + far_y * far_y).sqrt().max(1.0);
            let center = Point::from_xy(cx, cy);
            RadialGradient::new(
                center,
                center,
                radius,
                stops,
                SpreadMode::Pad,
                Transform::identity(),
            )
        }
    };

    match shader {
        Some(shader) => fill_whole(pixmap, shader),
        None => pixmap.fill(fallback.to_skia()),
    }
}

fn fill_whole(pixmap: &mut Pixmap, shader: Shader<'_>) {
    let Some(rect) = tiny_skia::Rect::from_xywh(0.0, 0.0, pixmap.width() as f32, pixmap.height() as f32)
    else {
        return;
    };
    let paint = Paint {
        shader,
        anti_alias: false,
        ..Paint::default()
    };
    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
}

fn solid(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

fn rounded_rect(rect: Rect, radius: f32) -> Option<tiny_skia::Path> {
    let r = radius.min(rect.w / 2.0).min(rect.h / 2.0).max(0.0);
    let (x, y, right, bottom) = (rect.x, rect.y, rect.right(), rect.bottom());
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(right - r, y);
    pb.quad_to(right, y, right, y + r);
    pb.line_to(right, bottom - r);
    pb.quad_to(right, bottom, right - r, bottom);
    pb.line_to(x + r, bottom);
    pb.quad_to(x, bottom, x, bottom - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

struct Canvas<'a> {
    pixmap: &'a mut Pixmap,
    painter: Option<&'a mut TextPainter>,
    images: &'a dyn ImageSource,
}

impl Canvas<'_> {
    fn text(&mut self, node: &TextNode) {
        let Some(painter) = self.painter.as_deref_mut() else {
            return;
        };
        let Some(line) = painter.render_line(&node.content, node.font_size, node.color) else {
            return;
        };

        let line_width = line.width() as f32;
        let x = match node.align {
            TextAlign::Left => node.rect.x,
            TextAlign::Center => node.rect.x + (node.rect.w - line_width) / 2.0,
            TextAlign::Right => node.rect.right() - line_width,
        };

        let line = if node.mirrored {
            match reflect(&line, node.rect.h.max(1.0) as u32) {
                Some(reflected) => reflected,
                None => return,
            }
        } else {
            line
        };

        self.pixmap.draw_pixmap(
            x.round() as i32,
            node.rect.y.round() as i32,
            line.as_ref(),
            &PixmapPaint {
                opacity: node.opacity.clamp(0.0, 1.0),
                ..PixmapPaint::default()
            },
            Transform::identity(),
            None,
        );
    }

    /// Text centred on a point, used for monograms.
    fn centered_label(&mut self, label: &str, font_size: f32, color: Rgba, cx: f32, cy: f32) {
        let Some(painter) = self.painter.as_deref_mut() else {
            return;
        };
        let Some(line) = painter.render_line(label, font_size, color) else {
            return;
        };
        let x = cx - line.width() as f32 / 2.0;
        let y = cy - line.height() as f32 / 2.0;
        self.pixmap.draw_pixmap(
            x.round() as i32,
            y.round() as i32,
            line.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    fn glyph(&mut self, node: &GlyphNode) {
        let Rect { x, y, w, h } = node.rect;
        let paint = solid(node.color);
        match node.glyph {
            SocialGlyph::X => {
                let inset = w * 0.12;
                let mut heavy = PathBuilder::new();
                heavy.move_to(x + inset, y + inset);
                heavy.line_to(x + w - inset, y + h - inset);
                let mut light = PathBuilder::new();
                light.move_to(x + w - inset, y + inset);
                light.line_to(x + inset, y + h - inset);

                // never hairline: tiny-skia's anti-aliased hairline scanner
                // asserts on some fractional endpoints
                for (builder, width) in [(heavy, (w * 0.16).max(1.5)), (light, (w * 0.07).max(1.5))] {
                    if let Some(path) = builder.finish() {
                        let stroke = Stroke {
                            width,
                            line_cap: LineCap::Round,
                            ..Stroke::default()
                        };
                        self.pixmap
                            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
                    }
                }
            }
            SocialGlyph::GitHub => {
                let (cx, cy) = (x + w / 2.0, y + h / 2.0);
                let radius = w.min(h) / 2.0;
                if let Some(ring) = PathBuilder::from_circle(cx, cy, radius * 0.9) {
                    let stroke = Stroke {
                        width: (radius * 0.16).max(1.5),
                        ..Stroke::default()
                    };
                    self.pixmap
                        .stroke_path(&ring, &paint, &stroke, Transform::identity(), None);
                }
                // head with two ears
                let mut head = PathBuilder::new();
                head.move_to(cx - radius * 0.42, cy - radius * 0.42);
                head.line_to(cx - radius * 0.22, cy - radius * 0.12);
                head.line_to(cx + radius * 0.22, cy - radius * 0.12);
                head.line_to(cx + radius * 0.42, cy - radius * 0.42);
                head.line_to(cx + radius * 0.42, cy + radius * 0.18);
                head.quad_to(cx, cy + radius * 0.5, cx - radius * 0.42, cy + radius * 0.18);
                head.close();
                if let Some(path) = head.finish() {
                    self.pixmap
                        .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                }
            }
        }
    }

    /// Snapped to whole pixels and painted without anti-aliasing.
    fn divider(&mut self, node: &DividerNode) {
        let x = node.rect.x.round();
        let y = node.rect.y.round();
        let w = node.rect.w.round().max(1.0);
        let h = node.rect.h.round().max(1.0);
        if let Some(rect) = tiny_skia::Rect::from_xywh(x, y, w, h) {
            let mut paint = solid(node.color);
            paint.anti_alias = false;
            self.pixmap
                .fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    fn swatch(&mut self, node: &SwatchNode) {
        if let Some(path) = rounded_rect(node.rect, node.radius) {
            self.pixmap.fill_path(
                &path,
                &solid(node.fill),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }

        let inner = Rect::new(
            node.rect.x + node.padding,
            node.rect.y + node.padding,
            (node.rect.w - node.padding * 2.0).max(1.0),
            (node.rect.h - node.padding * 2.0).max(1.0),
        );

        match self.images.load(&node.icon).ok().and_then(|icon| rgba_to_pixmap(&icon)) {
            Some(icon) => {
                let scale = (inner.w / icon.width() as f32).min(inner.h / icon.height() as f32);
                let tx = inner.x + (inner.w - icon.width() as f32 * scale) / 2.0;
                let ty = inner.y + (inner.h - icon.height() as f32 * scale) / 2.0;
                self.pixmap.draw_pixmap(
                    0,
                    0,
                    icon.as_ref(),
                    &PixmapPaint {
                        quality: FilterQuality::Bicubic,
                        ..PixmapPaint::default()
                    },
                    Transform::from_row(scale, 0.0, 0.0, scale, tx, ty),
                    None,
                );
            }
            None => {
                log::warn!("icon '{}' for {} unavailable, drawing monogram", node.icon, node.id);
                if let Some(path) = rounded_rect(inner, node.radius * 0.6) {
                    self.pixmap.fill_path(
                        &path,
                        &solid(node.accent),
                        FillRule::Winding,
                        Transform::identity(),
                        None,
                    );
                }
                let initial = node.name.chars().next().map(String::from).unwrap_or_default();
                self.centered_label(
                    &initial,
                    inner.h * 0.7,
                    Rgba::WHITE,
                    inner.x + inner.w / 2.0,
                    inner.y + inner.h / 2.0,
                );
            }
        }
    }

    fn avatar(&mut self, node: &AvatarNode) {
        let Some(circle) = PathBuilder::from_circle(node.center_x, node.center_y, node.radius)
        else {
            return;
        };

        let picture = node.image.as_deref().and_then(|reference| {
            match self.images.load(reference) {
                Ok(image) => rgba_to_pixmap(&image),
                Err(error) => {
                    log::warn!("profile picture unavailable, using initial: {error:#}");
                    None
                }
            }
        });

        if let Some(picture) = picture {
            if let Some(mut mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) {
                mask.fill_path(&circle, FillRule::Winding, true, Transform::identity());
                let diameter = node.radius * 2.0;
                let scale =
                    (diameter / picture.width() as f32).max(diameter / picture.height() as f32);
                let tx = node.center_x - picture.width() as f32 * scale / 2.0;
                let ty = node.center_y - picture.height() as f32 * scale / 2.0;
                self.pixmap.draw_pixmap(
                    0,
                    0,
                    picture.as_ref(),
                    &PixmapPaint {
                        quality: FilterQuality::Bicubic,
                        ..PixmapPaint::default()
                    },
                    Transform::from_row(scale, 0.0, 0.0, scale, tx, ty),
                    Some(&mask),
                );
                return;
            }
        }

        self.pixmap.fill_path(
            &circle,
            &solid(node.fill),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
        self.centered_label(
            &node.initial,
            node.radius,
            node.text_color,
            node.center_x,
            node.center_y,
        );
    }
}

/// Upside-down copy of `line`, cropped to `height` rows and fading out
/// towards the bottom.
fn reflect(line: &Pixmap, height: u32) -> Option<Pixmap> {
    let height = height.min(line.height()).max(1);
    let width = line.width();
    let mut out = Pixmap::new(width, height)?;
    let src = line.pixels();
    let dst = out.pixels_mut();

    for row in 0..height {
        let src_row = line.height() - 1 - row;
        let fade = 1.0 - row as f32 / height as f32;
        for col in 0..width {
            let pixel = src[(src_row * width + col) as usize];
            let scale = |channel: u8| (f32::from(channel) * fade).round() as u8;
            dst[(row * width + col) as usize] = tiny_skia::PremultipliedColorU8::from_rgba(
                scale(pixel.red()),
                scale(pixel.green()),
                scale(pixel.blue()),
                scale(pixel.alpha()),
            )
            .unwrap_or(tiny_skia::PremultipliedColorU8::TRANSPARENT);
        }
    }
    Some(out)
}
