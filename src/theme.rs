use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::background::{BackgroundSpec, GradientDescriptor};
use crate::color::Rgba;
use crate::error_codes::CodedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    Desktop,
    Mobile,
}

impl Variant {
    pub const ALL: [&'static str; 2] = ["desktop", "mobile"];

    pub fn from_keyword(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "mobile" => Ok(Self::Mobile),
            _ => Err(invalid_keyword("INVALID_VARIANT", "variant", value, &Self::ALL)),
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }

    /// Design canvas the layout is resolved against; capture re-flows it to
    /// the requested export size.
    pub fn canvas_px(self) -> (u32, u32) {
        match self {
            Self::Desktop => (1500, 500),
            Self::Mobile => (600, 270),
        }
    }

    pub fn metrics(self) -> VariantMetrics {
        match self {
            Self::Desktop => VariantMetrics {
                padding_x: 120.0,
                padding_y: 60.0,
                title_size: 80.0,
                subtitle_size: 35.0,
                social_size: 25.0,
                glyph_size: 34.0,
                stack_label_size: 25.0,
                swatch_size: 50.0,
                swatch_padding: 8.0,
                swatch_gap: 8.0,
                avatar_radius: 70.0,
                row_gap: 20.0,
            },
            Self::Mobile => VariantMetrics {
                padding_x: 35.0,
                padding_y: 30.0,
                title_size: 35.0,
                subtitle_size: 20.0,
                social_size: 15.0,
                glyph_size: 18.0,
                stack_label_size: 20.0,
                swatch_size: 30.0,
                swatch_padding: 5.0,
                swatch_gap: 8.0,
                avatar_radius: 0.0,
                row_gap: 12.0,
            },
        }
    }
}

/// Spacing and type scale of one variant, in design pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantMetrics {
    pub padding_x: f32,
    pub padding_y: f32,
    pub title_size: f32,
    pub subtitle_size: f32,
    pub social_size: f32,
    pub glyph_size: f32,
    pub stack_label_size: f32,
    pub swatch_size: f32,
    pub swatch_padding: f32,
    pub swatch_gap: f32,
    pub avatar_radius: f32,
    pub row_gap: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    #[default]
    Standard,
    Centered,
    SideBySide,
}

impl LayoutKind {
    pub const ALL: [&'static str; 3] = ["standard", "centered", "side_by_side"];

    pub fn from_keyword(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "standard" => Ok(Self::Standard),
            "centered" => Ok(Self::Centered),
            "side_by_side" => Ok(Self::SideBySide),
            _ => Err(invalid_keyword("INVALID_LAYOUT", "layout", value, &Self::ALL)),
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Centered => "centered",
            Self::SideBySide => "side_by_side",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Classic,
    Neon,
    Minimal,
    Gradient,
    Dark,
}

impl Theme {
    pub const ALL: [&'static str; 5] = ["classic", "neon", "minimal", "gradient", "dark"];

    pub fn from_keyword(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "neon" => Ok(Self::Neon),
            "minimal" => Ok(Self::Minimal),
            "gradient" => Ok(Self::Gradient),
            "dark" => Ok(Self::Dark),
            _ => Err(invalid_keyword("INVALID_THEME", "theme", value, &Self::ALL)),
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Neon => "neon",
            Self::Minimal => "minimal",
            Self::Gradient => "gradient",
            Self::Dark => "dark",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Self::Classic => Palette {
                text: Rgba::WHITE,
                accent: Rgba::WHITE,
                divider: Rgba::WHITE,
                swatch: Rgba::WHITE,
                avatar_fill: Rgba::rgb(147, 51, 234),
            },
            Self::Neon => Palette {
                text: Rgba::rgb(224, 255, 255),
                accent: Rgba::rgb(0, 255, 213),
                divider: Rgba::rgb(255, 0, 170),
                swatch: Rgba::rgb(245, 245, 255),
                avatar_fill: Rgba::rgb(255, 0, 170),
            },
            Self::Minimal => Palette {
                text: Rgba::rgb(24, 24, 27),
                accent: Rgba::rgb(82, 82, 91),
                divider: Rgba::rgb(161, 161, 170),
                swatch: Rgba::WHITE,
                avatar_fill: Rgba::rgb(228, 228, 231),
            },
            Self::Gradient => Palette {
                text: Rgba::WHITE,
                accent: Rgba::rgb(233, 213, 255),
                divider: Rgba::rgb(233, 213, 255),
                swatch: Rgba::WHITE,
                avatar_fill: Rgba::rgb(126, 34, 206),
            },
            Self::Dark => Palette {
                text: Rgba::rgb(229, 229, 229),
                accent: Rgba::rgb(163, 163, 163),
                divider: Rgba::rgb(82, 82, 82),
                swatch: Rgba::rgb(250, 250, 250),
                avatar_fill: Rgba::rgb(38, 38, 38),
            },
        }
    }

    /// Background the theme supplies when the profile sets none. Classic has
    /// no opinion and leaves the built-in default in place.
    pub fn default_background(self) -> Option<BackgroundSpec> {
        let gradient = match self {
            Self::Classic => return None,
            Self::Neon => GradientDescriptor::linear(
                135.0,
                &[Rgba::rgb(12, 4, 38), Rgba::rgb(45, 10, 90), Rgba::rgb(0, 92, 110)],
            ),
            Self::Minimal => {
                GradientDescriptor::linear(180.0, &[Rgba::rgb(250, 250, 250), Rgba::rgb(228, 228, 231)])
            }
            Self::Gradient => {
                GradientDescriptor::linear(90.0, &[Rgba::rgb(147, 51, 234), Rgba::rgb(37, 99, 235)])
            }
            Self::Dark => {
                GradientDescriptor::radial(&[Rgba::rgb(23, 23, 23), Rgba::rgb(5, 5, 5)])
            }
        };
        Some(BackgroundSpec::CssGradient { gradient })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub text: Rgba,
    pub accent: Rgba,
    pub divider: Rgba,
    pub swatch: Rgba,
    pub avatar_fill: Rgba,
}

/// Everything besides the profile that selects a visual tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LayoutChoice {
    pub variant: Variant,
    pub layout: LayoutKind,
    pub theme: Theme,
}

fn invalid_keyword(
    code: &'static str,
    what: &str,
    value: &str,
    allowed: &[&str],
) -> anyhow::Error {
    anyhow!(CodedError::usage(code, format!("invalid {what} '{value}'")).with_details(json!({
        "provided": value,
        "allowed": allowed
    })))
}

#[cfg(test)]
mod tests {
    use super::{LayoutKind, Theme, Variant};
    use crate::error_codes::find_coded_error;

    #[test]
    fn keywords_round_trip() {
        for keyword in Theme::ALL {
            assert_eq!(Theme::from_keyword(keyword).unwrap().keyword(), keyword);
        }
        for keyword in LayoutKind::ALL {
            assert_eq!(LayoutKind::from_keyword(keyword).unwrap().keyword(), keyword);
        }
        assert_eq!(
            LayoutKind::from_keyword("Side-By-Side").unwrap(),
            LayoutKind::SideBySide
        );
        assert_eq!(Variant::from_keyword(" MOBILE ").unwrap(), Variant::Mobile);
    }

    #[test]
    fn unknown_theme_is_a_coded_usage_error() {
        let error = Theme::from_keyword("vaporwave").unwrap_err();
        let coded = find_coded_error(&error).expect("coded");
        assert_eq!(coded.code, "INVALID_THEME");
        let details = coded.details.expect("details");
        assert_eq!(details["allowed"].as_array().map(Vec::len), Some(5));
    }

    #[test]
    fn only_classic_defers_to_builtin_background() {
        assert!(Theme::Classic.default_background().is_none());
        for theme in [Theme::Neon, Theme::Minimal, Theme::Gradient, Theme::Dark] {
            assert!(theme.default_background().is_some(), "{theme:?}");
        }
    }
}
