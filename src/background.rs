//! Background paint instructions and the raw-string classifier used by the
//! profile loader.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::color::Rgba;

/// The built-in two-tone default: `rgb(41,41,41)` held to 70%, then `#494949`.
pub const DEFAULT_GRADIENT_FROM: Rgba = Rgba::rgb(41, 41, 41);
pub const DEFAULT_GRADIENT_TO: Rgba = Rgba::rgb(73, 73, 73);
pub const DEFAULT_GRADIENT_SPLIT: f32 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackgroundSpec {
    RemoteImage { url: Url },
    CssGradient { gradient: GradientDescriptor },
    DefaultGradient,
}

impl BackgroundSpec {
    /// Total, deterministic classification: https URL, then gradient
    /// expression, then the default.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.starts_with("https://") {
            if let Ok(url) = Url::parse(trimmed) {
                return Self::RemoteImage { url };
            }
        }

        if lower.starts_with("linear") || lower.starts_with("radial") {
            return Self::CssGradient {
                gradient: GradientDescriptor::parse_lenient(trimmed),
            };
        }

        Self::DefaultGradient
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::RemoteImage { .. } => "remote_image",
            Self::CssGradient { .. } => "css_gradient",
            Self::DefaultGradient => "default_gradient",
        }
    }
}

impl fmt::Display for BackgroundSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteImage { url } => write!(f, "url({url})"),
            Self::CssGradient { gradient } => f.write_str(&gradient.to_css()),
            Self::DefaultGradient => f.write_str(&GradientDescriptor::default_two_tone().to_css()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GradientKind {
    /// CSS angle: 0deg points up, 90deg points right.
    Linear { angle_deg: f32 },
    /// Circle centred at a fraction of the box.
    Radial { center_x: f32, center_y: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorStop {
    pub color: Rgba,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradientDescriptor {
    pub kind: GradientKind,
    pub stops: Vec<ColorStop>,
}

impl GradientDescriptor {
    pub fn linear(angle_deg: f32, colors: &[Rgba]) -> Self {
        Self {
            kind: GradientKind::Linear { angle_deg },
            stops: colors
                .iter()
                .map(|&color| ColorStop {
                    color,
                    position: None,
                })
                .collect(),
        }
    }

    pub fn radial(colors: &[Rgba]) -> Self {
        Self {
            kind: GradientKind::Radial {
                center_x: 0.5,
                center_y: 0.5,
            },
            ..Self::linear(0.0, colors)
        }
    }

    pub fn default_two_tone() -> Self {
        Self {
            kind: GradientKind::Linear { angle_deg: 90.0 },
            stops: vec![
                ColorStop {
                    color: DEFAULT_GRADIENT_FROM,
                    position: Some(DEFAULT_GRADIENT_SPLIT),
                },
                ColorStop {
                    color: DEFAULT_GRADIENT_TO,
                    position: Some(1.0),
                },
            ],
        }
    }

    /// Parses `linear-gradient(...)` / `radial-gradient(...)`. Never fails:
    /// unreadable stops are dropped and a gradient left with fewer than two
    /// stops takes the default two-tone stops.
    pub fn parse_lenient(raw: &str) -> Self {
        let mut descriptor = parse_expression(raw).unwrap_or_else(|| {
            log::warn!("unreadable gradient expression '{raw}', using default stops");
            let kind = if raw.trim().to_ascii_lowercase().starts_with("radial") {
                GradientKind::Radial {
                    center_x: 0.5,
                    center_y: 0.5,
                }
            } else {
                GradientKind::Linear { angle_deg: 90.0 }
            };
            Self {
                kind,
                stops: Vec::new(),
            }
        });

        if descriptor.stops.len() < 2 {
            descriptor.stops = Self::default_two_tone().stops;
        }
        descriptor
    }

    /// Stop offsets in 0..=1 with CSS auto-placement for unpositioned stops.
    pub fn resolved_offsets(&self) -> Vec<f32> {
        let count = self.stops.len();
        let mut offsets = self
            .stops
            .iter()
            .map(|stop| stop.position.map(|p| p.clamp(0.0, 1.0)))
            .collect::<Vec<_>>();
        if count == 0 {
            return Vec::new();
        }
        if offsets[0].is_none() {
            offsets[0] = Some(0.0);
        }
        if offsets[count - 1].is_none() {
            offsets[count - 1] = Some(1.0);
        }

        let mut index = 0;
        while index < count {
            if offsets[index].is_some() {
                index += 1;
                continue;
            }
            let start = index - 1;
            let mut end = index;
            while offsets[end].is_none() {
                end += 1;
            }
            let from = offsets[start].unwrap_or(0.0);
            let to = offsets[end].unwrap_or(1.0);
            let span = (end - start) as f32;
            for (step, slot) in offsets[index..end].iter_mut().enumerate() {
                *slot = Some(from + (to - from) * (step + 1) as f32 / span);
            }
            index = end;
        }

        let mut previous = 0.0_f32;
        offsets
            .into_iter()
            .map(|offset| {
                let value = offset.unwrap_or(previous).max(previous);
                previous = value;
                value
            })
            .collect()
    }

    pub fn to_css(&self) -> String {
        let stops = self
            .stops
            .iter()
            .map(|stop| match stop.position {
                Some(position) => format!("{} {}%", stop.color, format_number(position * 100.0)),
                None => stop.color.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        match self.kind {
            GradientKind::Linear { angle_deg } => {
                format!("linear-gradient({}deg, {stops})", format_number(angle_deg))
            }
            GradientKind::Radial { center_x, center_y }
                if (center_x - 0.5).abs() < f32::EPSILON && (center_y - 0.5).abs() < f32::EPSILON =>
            {
                format!("radial-gradient(circle, {stops})")
            }
            GradientKind::Radial { center_x, center_y } => format!(
                "radial-gradient(circle at {}% {}%, {stops})",
                format_number(center_x * 100.0),
                format_number(center_y * 100.0)
            ),
        }
    }
}

fn format_number(value: f32) -> String {
    if (value - value.round()).abs() < 0.001 {
        format!("{}", value.round() as i64)
    } else {
        format!("{value:.2}")
    }
}

fn parse_expression(raw: &str) -> Option<GradientDescriptor> {
    static GRADIENT_RE: OnceLock<Regex> = OnceLock::new();
    let pattern = GRADIENT_RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*(?:repeating-)?(linear|radial)-gradient\s*\((.*)\)\s*;?\s*$")
            .expect("gradient regex should compile")
    });
    let captures = pattern.captures(raw)?;
    let is_linear = captures[1].eq_ignore_ascii_case("linear");
    let args = split_top_level(&captures[2]);
    let mut args = args.iter().map(|arg| arg.trim()).filter(|arg| !arg.is_empty());

    let mut kind = if is_linear {
        GradientKind::Linear { angle_deg: 180.0 }
    } else {
        GradientKind::Radial {
            center_x: 0.5,
            center_y: 0.5,
        }
    };

    let mut pending_first = None;
    if let Some(first) = args.next() {
        let parsed = if is_linear {
            parse_linear_direction(first).map(|angle_deg| GradientKind::Linear { angle_deg })
        } else {
            parse_radial_shape(first)
        };
        match parsed {
            Some(parsed) => kind = parsed,
            None => pending_first = Some(first),
        }
    }

    let stops = pending_first
        .into_iter()
        .chain(args)
        .filter_map(|arg| {
            let stop = parse_stop(arg);
            if stop.is_none() {
                log::warn!("dropping unreadable gradient stop '{arg}'");
            }
            stop
        })
        .collect();

    Some(GradientDescriptor { kind, stops })
}

fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut start = 0;
    for (index, ch) in body.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&body[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn parse_linear_direction(arg: &str) -> Option<f32> {
    let lower = arg.to_ascii_lowercase();
    if let Some(side) = lower.strip_prefix("to ") {
        let mut words = side.split_whitespace().collect::<Vec<_>>();
        words.sort_unstable();
        let angle = match words.as_slice() {
            ["top"] => 0.0,
            ["right"] => 90.0,
            ["bottom"] => 180.0,
            ["left"] => 270.0,
            ["right", "top"] => 45.0,
            ["bottom", "right"] => 135.0,
            ["bottom", "left"] => 225.0,
            ["left", "top"] => 315.0,
            _ => return None,
        };
        return Some(angle);
    }

    let units: [(&str, f32); 4] = [
        ("deg", 1.0),
        ("grad", 0.9),
        ("rad", 180.0 / std::f32::consts::PI),
        ("turn", 360.0),
    ];
    for (suffix, factor) in units {
        if let Some(number) = lower.strip_suffix(suffix) {
            return number.trim().parse::<f32>().ok().map(|value| value * factor);
        }
    }
    None
}

fn parse_radial_shape(arg: &str) -> Option<GradientKind> {
    let lower = arg.to_ascii_lowercase();
    let mut words = lower.split_whitespace().peekable();
    let mut matched = false;
    let mut center = (0.5, 0.5);

    while let Some(word) = words.next() {
        match word {
            "circle" | "ellipse" | "closest-side" | "closest-corner" | "farthest-side"
            | "farthest-corner" => matched = true,
            "at" => {
                matched = true;
                let x = words.next().and_then(parse_position)?;
                let y = words.next().and_then(parse_position).unwrap_or(0.5);
                center = (x, y);
            }
            _ => return None,
        }
    }

    matched.then_some(GradientKind::Radial {
        center_x: center.0,
        center_y: center.1,
    })
}

fn parse_position(word: &str) -> Option<f32> {
    match word {
        "left" | "top" => Some(0.0),
        "center" => Some(0.5),
        "right" | "bottom" => Some(1.0),
        _ => word
            .strip_suffix('%')
            .and_then(|pct| pct.parse::<f32>().ok())
            .map(|pct| pct / 100.0),
    }
}

fn parse_stop(arg: &str) -> Option<ColorStop> {
    // The colour may itself contain spaces (`rgb(1 2 3)`), so the position is
    // only ever the trailing token after the closing parenthesis.
    let (color_part, position_part) = match arg.rfind(')') {
        Some(close) => (&arg[..=close], arg[close + 1..].trim()),
        None => match arg.split_once(char::is_whitespace) {
            Some((color, rest)) => (color, rest.trim()),
            None => (arg, ""),
        },
    };

    let color = Rgba::parse(color_part)?;
    let position = if position_part.is_empty() {
        None
    } else {
        let first = position_part.split_whitespace().next().unwrap_or_default();
        Some(first.strip_suffix('%')?.parse::<f32>().ok()? / 100.0)
    };
    Some(ColorStop { color, position })
}

#[cfg(test)]
mod tests {
    use super::{BackgroundSpec, GradientDescriptor, GradientKind};
    use crate::color::Rgba;

    #[test]
    fn classification_is_total_and_ordered() {
        let remote = BackgroundSpec::classify("https://res.cloudinary.com/demo/image/upload/bg.png");
        assert!(matches!(remote, BackgroundSpec::RemoteImage { .. }));

        let linear = BackgroundSpec::classify("linear-gradient(90deg, #ff0000, #0000ff)");
        assert!(matches!(linear, BackgroundSpec::CssGradient { .. }));

        let radial = BackgroundSpec::classify("radial-gradient(circle, #ff0000, #0000ff)");
        assert!(matches!(radial, BackgroundSpec::CssGradient { .. }));

        for raw in ["", "   ", "http://insecure.example/bg.png", "#ff0000", "blue"] {
            assert_eq!(
                BackgroundSpec::classify(raw),
                BackgroundSpec::DefaultGradient,
                "raw={raw:?}"
            );
        }
    }

    #[test]
    fn anything_starting_with_a_gradient_keyword_is_a_gradient() {
        for raw in ["linear", "radial-nonsense", "linear-gradient(", "LINEAR-GRADIENT(red, blue)"] {
            let spec = BackgroundSpec::classify(raw);
            let BackgroundSpec::CssGradient { gradient } = spec else {
                panic!("expected gradient for {raw:?}");
            };
            assert!(gradient.stops.len() >= 2, "raw={raw:?}");
        }
    }

    #[test]
    fn parses_picker_linear_output() {
        let gradient = GradientDescriptor::parse_lenient("linear-gradient(45deg, #ff0000, #0000ff)");
        assert_eq!(gradient.kind, GradientKind::Linear { angle_deg: 45.0 });
        assert_eq!(gradient.stops.len(), 2);
        assert_eq!(gradient.stops[0].color, Rgba::rgb(255, 0, 0));
        assert_eq!(gradient.stops[1].color, Rgba::rgb(0, 0, 255));
        assert_eq!(gradient.to_css(), "linear-gradient(45deg, #ff0000, #0000ff)");
    }

    #[test]
    fn parses_directions_and_positions() {
        let gradient = GradientDescriptor::parse_lenient(
            "linear-gradient(to right, rgb(41, 41, 41) 70%, #494949)",
        );
        assert_eq!(gradient.kind, GradientKind::Linear { angle_deg: 90.0 });
        assert_eq!(gradient.stops[0].position, Some(0.7));
        assert_eq!(gradient.stops[1].position, None);

        let turn = GradientDescriptor::parse_lenient("linear-gradient(0.5turn, red, blue)");
        assert_eq!(turn.kind, GradientKind::Linear { angle_deg: 180.0 });
    }

    #[test]
    fn parsing_is_consistent_across_threads() {
        let raw = "linear-gradient(45deg, #ff0000, #0000ff)";
        let expected = GradientDescriptor::parse_lenient(raw);
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(move || GradientDescriptor::parse_lenient(raw)))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
        assert_eq!(
            GradientDescriptor::parse_lenient("radial-gradient(circle, red, blue)").kind,
            GradientKind::Radial {
                center_x: 0.5,
                center_y: 0.5
            }
        );
    }

    #[test]
    fn radial_prefix_and_center() {
        let gradient =
            GradientDescriptor::parse_lenient("radial-gradient(circle at 25% 75%, red, blue)");
        assert_eq!(
            gradient.kind,
            GradientKind::Radial {
                center_x: 0.25,
                center_y: 0.75
            }
        );
        assert_eq!(
            gradient.to_css(),
            "radial-gradient(circle at 25% 75%, #ff0000, #0000ff)"
        );
    }

    #[test]
    fn first_argument_may_be_a_stop() {
        let gradient = GradientDescriptor::parse_lenient("linear-gradient(red, white, blue)");
        assert_eq!(gradient.kind, GradientKind::Linear { angle_deg: 180.0 });
        assert_eq!(gradient.stops.len(), 3);
        assert_eq!(gradient.resolved_offsets(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn unreadable_stops_fall_back_to_default() {
        let gradient = GradientDescriptor::parse_lenient("linear-gradient(90deg, nope, #zzz)");
        assert_eq!(gradient.stops, GradientDescriptor::default_two_tone().stops);
    }

    #[test]
    fn offsets_are_monotonic() {
        let gradient = GradientDescriptor::parse_lenient(
            "linear-gradient(90deg, red 60%, white, blue 20%)",
        );
        let offsets = gradient.resolved_offsets();
        assert!(offsets.windows(2).all(|pair| pair[0] <= pair[1]), "{offsets:?}");
    }
}
