//! Layout resolver: profile + stack + visual choice → banner visual tree.
//!
//! Resolution is a pure function of its inputs. Geometry is expressed in
//! design pixels of the variant's canvas; the capture surface later re-flows
//! the tree to the export size with [`RenderedBanner::scaled_to`].

use serde::Serialize;

use crate::background::BackgroundSpec;
use crate::catalog::TechCatalog;
use crate::color::Rgba;
use crate::profile::{BannerProfile, StackSelection};
use crate::theme::{LayoutChoice, LayoutKind, Palette, Theme, Variant, VariantMetrics};

pub const STACK_LABEL: &str = "Stack:";
pub const CURSOR_GLYPH: char = '_';
pub const TITLE_ECHO_OPACITY: f32 = 0.18;
/// Rough advance of a proportional sans face, as a fraction of the font size.
const AVERAGE_ADVANCE: f32 = 0.56;
const LINE_HEIGHT: f32 = 1.25;
const SWATCH_RADIUS: f32 = 6.0;
const SOCIAL_GAP: f32 = 8.0;
const STACK_LABEL_GAP: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    fn transformed(&self, scale: f32, offset_x: f32, offset_y: f32) -> Self {
        Self {
            x: self.x * scale + offset_x,
            y: self.y * scale + offset_y,
            w: self.w * scale,
            h: self.h * scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRole {
    Title,
    TitleEcho,
    Subtitle,
    Handle,
    StackLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextNode {
    pub role: TextRole,
    pub content: String,
    pub rect: Rect,
    pub font_size: f32,
    pub color: Rgba,
    pub opacity: f32,
    pub align: TextAlign,
    /// Drawn upside down and clipped to `rect`, as a reflection of the line
    /// directly above it.
    pub mirrored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialGlyph {
    X,
    GitHub,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlyphNode {
    pub glyph: SocialGlyph,
    pub rect: Rect,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DividerNode {
    pub rect: Rect,
    pub color: Rgba,
}

/// A technology icon inside its rounded swatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwatchNode {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub accent: Rgba,
    pub rect: Rect,
    pub radius: f32,
    pub padding: f32,
    pub fill: Rgba,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvatarNode {
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub initial: String,
    pub fill: Rgba,
    pub text_color: Rgba,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum BannerNode {
    Text(TextNode),
    Glyph(GlyphNode),
    Divider(DividerNode),
    Swatch(SwatchNode),
    Avatar(AvatarNode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedBanner {
    pub variant: Variant,
    pub layout: LayoutKind,
    pub theme: Theme,
    pub width: u32,
    pub height: u32,
    pub background: BackgroundSpec,
    pub nodes: Vec<BannerNode>,
}

impl RenderedBanner {
    pub fn text(&self, role: TextRole) -> Option<&str> {
        self.nodes.iter().find_map(|node| match node {
            BannerNode::Text(text) if text.role == role => Some(text.content.as_str()),
            _ => None,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.text(TextRole::Title)
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.text(TextRole::Subtitle)
    }

    /// Catalog ids of the rendered swatches, left to right.
    pub fn stack_icons(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                BannerNode::Swatch(swatch) => Some(swatch.id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn avatar(&self) -> Option<&AvatarNode> {
        self.nodes.iter().find_map(|node| match node {
            BannerNode::Avatar(avatar) => Some(avatar),
            _ => None,
        })
    }

    /// Re-flows the tree onto a `width`×`height` canvas. Content keeps its
    /// aspect ratio and is centred; an odd remainder pixel goes right/bottom.
    /// The background always covers the full canvas.
    pub fn scaled_to(&self, width: u32, height: u32) -> Self {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let scale_x = width as f32 / self.width.max(1) as f32;
        let scale_y = height as f32 / self.height.max(1) as f32;
        let scale = scale_x.min(scale_y);
        let rem_x = width as f32 - self.width as f32 * scale;
        let rem_y = height as f32 - self.height as f32 * scale;
        let offset_x = (rem_x / 2.0).floor();
        let offset_y = (rem_y / 2.0).floor();

        let nodes = self
            .nodes
            .iter()
            .map(|node| node.transformed(scale, offset_x, offset_y))
            .collect();

        Self {
            width,
            height,
            nodes,
            ..self.clone()
        }
    }
}

impl BannerNode {
    fn transformed(&self, scale: f32, offset_x: f32, offset_y: f32) -> Self {
        match self {
            Self::Text(text) => Self::Text(TextNode {
                rect: text.rect.transformed(scale, offset_x, offset_y),
                font_size: text.font_size * scale,
                ..text.clone()
            }),
            Self::Glyph(glyph) => Self::Glyph(GlyphNode {
                rect: glyph.rect.transformed(scale, offset_x, offset_y),
                ..glyph.clone()
            }),
            Self::Divider(divider) => Self::Divider(DividerNode {
                rect: divider.rect.transformed(scale, offset_x, offset_y),
                ..divider.clone()
            }),
            Self::Swatch(swatch) => Self::Swatch(SwatchNode {
                rect: swatch.rect.transformed(scale, offset_x, offset_y),
                radius: swatch.radius * scale,
                padding: swatch.padding * scale,
                ..swatch.clone()
            }),
            Self::Avatar(avatar) => Self::Avatar(AvatarNode {
                center_x: avatar.center_x * scale + offset_x,
                center_y: avatar.center_y * scale + offset_y,
                radius: avatar.radius * scale,
                ..avatar.clone()
            }),
        }
    }
}

/// Background precedence: an explicit profile background always wins, then
/// the theme's default, then the built-in two-tone gradient.
pub fn resolve_background(profile: &BannerProfile, theme: Theme) -> BackgroundSpec {
    profile
        .background
        .clone()
        .or_else(|| theme.default_background())
        .unwrap_or(BackgroundSpec::DefaultGradient)
}

pub fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * AVERAGE_ADVANCE
}

pub fn resolve_layout(
    profile: &BannerProfile,
    stack: &StackSelection,
    catalog: &TechCatalog,
    choice: LayoutChoice,
) -> RenderedBanner {
    let (width, height) = choice.variant.canvas_px();
    let metrics = choice.variant.metrics();
    let palette = choice.theme.palette();
    let mut builder = Builder {
        nodes: Vec::new(),
        metrics,
        palette,
        width: width as f32,
        height: height as f32,
    };

    let show_avatar = choice.variant == Variant::Desktop
        && profile.show_profile_picture != Some(false)
        && metrics.avatar_radius > 0.0;
    let echo = choice.variant == Variant::Desktop && choice.layout != LayoutKind::SideBySide;

    match choice.layout {
        LayoutKind::Standard => {
            if show_avatar {
                let r = metrics.avatar_radius;
                builder.avatar(profile, builder.width - metrics.padding_x - r, metrics.padding_y + r);
            }
            let column = Rect::new(
                metrics.padding_x,
                metrics.padding_y,
                builder.width - metrics.padding_x * 2.0,
                0.0,
            );
            builder.text_block(profile, column, TextAlign::Left, echo);
            builder.stack_row(stack, catalog, StackPlacement::BottomRight);
        }
        LayoutKind::Centered => {
            if show_avatar {
                let r = metrics.avatar_radius;
                builder.avatar(profile, builder.width - metrics.padding_x - r, metrics.padding_y + r);
            }
            let column = Rect::new(
                metrics.padding_x,
                metrics.padding_y,
                builder.width - metrics.padding_x * 2.0,
                0.0,
            );
            builder.text_block(profile, column, TextAlign::Center, echo);
            builder.stack_row(stack, catalog, StackPlacement::BottomCenter);
        }
        LayoutKind::SideBySide => {
            let mut left = metrics.padding_x;
            if show_avatar {
                let r = metrics.avatar_radius;
                builder.avatar(profile, left + r, builder.height / 2.0);
                left += r * 2.0 + 40.0;
            }
            let text_height = builder.text_block_height(echo);
            let column = Rect::new(
                left,
                ((builder.height - text_height) / 2.0).max(metrics.padding_y / 2.0),
                builder.width * 0.62 - left,
                0.0,
            );
            builder.text_block(profile, column, TextAlign::Left, echo);
            builder.stack_row(stack, catalog, StackPlacement::RightColumn);
        }
    }

    RenderedBanner {
        variant: choice.variant,
        layout: choice.layout,
        theme: choice.theme,
        width,
        height,
        background: resolve_background(profile, choice.theme),
        nodes: builder.nodes,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackPlacement {
    BottomRight,
    BottomCenter,
    RightColumn,
}

struct Builder {
    nodes: Vec<BannerNode>,
    metrics: VariantMetrics,
    palette: Palette,
    width: f32,
    height: f32,
}

impl Builder {
    fn text_block_height(&self, echo: bool) -> f32 {
        let m = &self.metrics;
        let mut height = m.title_size * LINE_HEIGHT + m.subtitle_size * LINE_HEIGHT;
        if echo {
            height += m.title_size * 0.4;
        }
        height + m.row_gap + m.glyph_size.max(m.social_size * LINE_HEIGHT)
    }

    fn text(&mut self, role: TextRole, content: String, rect: Rect, font_size: f32, align: TextAlign) {
        let color = if role == TextRole::StackLabel {
            self.palette.accent
        } else {
            self.palette.text
        };
        self.nodes.push(BannerNode::Text(TextNode {
            role,
            content,
            rect,
            font_size,
            color,
            opacity: 1.0,
            align,
            mirrored: false,
        }));
    }

    /// Title, optional reflected title, subtitle with cursor, social row.
    fn text_block(&mut self, profile: &BannerProfile, column: Rect, align: TextAlign, echo: bool) {
        let m = self.metrics;
        let mut y = column.y;

        let title_rect = Rect::new(column.x, y, column.w, m.title_size * LINE_HEIGHT);
        self.text(TextRole::Title, profile.name.clone(), title_rect, m.title_size, align);
        y = title_rect.bottom();

        if echo {
            let echo_rect = Rect::new(column.x, y - m.title_size * 0.2, column.w, m.title_size * 0.6);
            self.nodes.push(BannerNode::Text(TextNode {
                role: TextRole::TitleEcho,
                content: profile.name.clone(),
                rect: echo_rect,
                font_size: m.title_size,
                color: self.palette.text,
                opacity: TITLE_ECHO_OPACITY,
                align,
                mirrored: true,
            }));
            y = echo_rect.bottom();
        }

        let subtitle_rect = Rect::new(column.x, y, column.w, m.subtitle_size * LINE_HEIGHT);
        self.text(
            TextRole::Subtitle,
            format!("{}{}", profile.field, CURSOR_GLYPH),
            subtitle_rect,
            m.subtitle_size,
            align,
        );
        y = subtitle_rect.bottom() + m.row_gap;

        self.social_row(profile, column, y, align);
    }

    fn social_row(&mut self, profile: &BannerProfile, column: Rect, y: f32, align: TextAlign) {
        let m = self.metrics;
        let row_height = m.glyph_size.max(m.social_size * LINE_HEIGHT);
        let twitter_width = estimate_text_width(&profile.twitter, m.social_size);
        let github_width = estimate_text_width(&profile.github, m.social_size);
        let total = m.glyph_size * 2.0 + twitter_width + github_width + SOCIAL_GAP * 5.0 + 1.0;

        let mut x = match align {
            TextAlign::Left => column.x,
            TextAlign::Center => column.x + ((column.w - total) / 2.0).max(0.0),
            TextAlign::Right => (column.right() - total).max(column.x),
        };
        let glyph_y = y + (row_height - m.glyph_size) / 2.0;
        let text_y = y + (row_height - m.social_size * LINE_HEIGHT) / 2.0;

        self.nodes.push(BannerNode::Glyph(GlyphNode {
            glyph: SocialGlyph::X,
            rect: Rect::new(x, glyph_y, m.glyph_size, m.glyph_size),
            color: self.palette.text,
        }));
        x += m.glyph_size + SOCIAL_GAP;
        self.text(
            TextRole::Handle,
            profile.twitter.clone(),
            Rect::new(x, text_y, twitter_width, m.social_size * LINE_HEIGHT),
            m.social_size,
            TextAlign::Left,
        );
        x += twitter_width + SOCIAL_GAP;

        let divider_height = m.social_size;
        self.nodes.push(BannerNode::Divider(DividerNode {
            rect: Rect::new(x, y + (row_height - divider_height) / 2.0, 1.0, divider_height),
            color: self.palette.divider,
        }));
        x += 1.0 + SOCIAL_GAP * 2.0;

        self.nodes.push(BannerNode::Glyph(GlyphNode {
            glyph: SocialGlyph::GitHub,
            rect: Rect::new(x, glyph_y, m.glyph_size, m.glyph_size),
            color: self.palette.text,
        }));
        x += m.glyph_size + SOCIAL_GAP;
        self.text(
            TextRole::Handle,
            profile.github.clone(),
            Rect::new(x, text_y, github_width, m.social_size * LINE_HEIGHT),
            m.social_size,
            TextAlign::Left,
        );
    }

    fn stack_row(&mut self, stack: &StackSelection, catalog: &TechCatalog, placement: StackPlacement) {
        let m = self.metrics;
        let entries = catalog.resolve_icons(stack);
        let count = entries.len() as f32;
        let swatches_width = if entries.is_empty() {
            0.0
        } else {
            count * m.swatch_size + (count - 1.0) * m.swatch_gap
        };
        let label_width = estimate_text_width(STACK_LABEL, m.stack_label_size);
        let label_height = m.stack_label_size * LINE_HEIGHT;

        let (label_rect, mut x, swatch_y) = match placement {
            StackPlacement::BottomRight | StackPlacement::BottomCenter => {
                let swatch_y = self.height - m.padding_y - m.swatch_size;
                let total = label_width + STACK_LABEL_GAP + swatches_width;
                let start = if placement == StackPlacement::BottomRight {
                    self.width - m.padding_x - total
                } else {
                    (self.width - total) / 2.0
                };
                let label_y = swatch_y + m.swatch_size - label_height;
                (
                    Rect::new(start, label_y, label_width, label_height),
                    start + label_width + STACK_LABEL_GAP,
                    swatch_y,
                )
            }
            StackPlacement::RightColumn => {
                let block_height = label_height + m.row_gap + m.swatch_size;
                let top = (self.height - block_height) / 2.0;
                let right = self.width - m.padding_x;
                let start = right - swatches_width.max(label_width);
                (
                    Rect::new(right - label_width, top, label_width, label_height),
                    start.max(right - swatches_width),
                    top + label_height + m.row_gap,
                )
            }
        };

        self.text(
            TextRole::StackLabel,
            STACK_LABEL.to_owned(),
            label_rect,
            m.stack_label_size,
            TextAlign::Left,
        );

        for entry in entries {
            self.nodes.push(BannerNode::Swatch(SwatchNode {
                id: entry.id.clone(),
                name: entry.name.clone(),
                icon: entry.icon.clone(),
                accent: entry.accent,
                rect: Rect::new(x, swatch_y, m.swatch_size, m.swatch_size),
                radius: SWATCH_RADIUS,
                padding: m.swatch_padding,
                fill: self.palette.swatch,
            }));
            x += m.swatch_size + m.swatch_gap;
        }
    }

    fn avatar(&mut self, profile: &BannerProfile, center_x: f32, center_y: f32) {
        self.nodes.push(BannerNode::Avatar(AvatarNode {
            center_x,
            center_y,
            radius: self.metrics.avatar_radius,
            image: profile.picture().map(str::to_owned),
            initial: profile.initial(),
            fill: self.palette.avatar_fill,
            text_color: Rgba::WHITE,
        }));
    }
}
