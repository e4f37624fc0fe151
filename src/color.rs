use std::fmt;

use serde::{Serialize, Serializer};

/// Straight (non-premultiplied) 8-bit RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        let a = (f32::from(self.a) * alpha.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Parses the colour forms a CSS gradient picker emits: `#rgb`, `#rgba`,
    /// `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`, `rgba(r, g, b, a)` and a few
    /// named colours.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex);
        }

        let lower = value.to_ascii_lowercase();
        if let Some(body) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_rgb_function(body);
        }

        named(&lower)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |index: usize| u8::from_str_radix(&hex[index..index + 1], 16).ok();
    let byte = |index: usize| u8::from_str_radix(&hex[index..index + 2], 16).ok();

    match hex.len() {
        3 | 4 => {
            let r = nibble(0)? * 17;
            let g = nibble(1)? * 17;
            let b = nibble(2)? * 17;
            let a = if hex.len() == 4 { nibble(3)? * 17 } else { 255 };
            Some(Rgba::rgba(r, g, b, a))
        }
        6 | 8 => {
            let a = if hex.len() == 8 { byte(6)? } else { 255 };
            Some(Rgba::rgba(byte(0)?, byte(2)?, byte(4)?, a))
        }
        _ => None,
    }
}

fn parse_rgb_function(body: &str) -> Option<Rgba> {
    let parts = body
        .split(|ch: char| ch == ',' || ch == '/' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let channel = |raw: &str| -> Option<u8> {
        if let Some(pct) = raw.strip_suffix('%') {
            let value = pct.parse::<f32>().ok()?;
            Some((value.clamp(0.0, 100.0) * 2.55).round() as u8)
        } else {
            let value = raw.parse::<f32>().ok()?;
            Some(value.clamp(0.0, 255.0).round() as u8)
        }
    };

    let alpha = match parts.get(3) {
        None => 255,
        Some(raw) => {
            let value = match raw.strip_suffix('%') {
                Some(pct) => pct.parse::<f32>().ok()? / 100.0,
                None => raw.parse::<f32>().ok()?,
            };
            (value.clamp(0.0, 1.0) * 255.0).round() as u8
        }
    };

    Some(Rgba::rgba(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ))
}

fn named(name: &str) -> Option<Rgba> {
    let color = match name {
        "white" => Rgba::WHITE,
        "black" => Rgba::BLACK,
        "transparent" => Rgba::TRANSPARENT,
        "red" => Rgba::rgb(255, 0, 0),
        "green" => Rgba::rgb(0, 128, 0),
        "blue" => Rgba::rgb(0, 0, 255),
        "purple" => Rgba::rgb(128, 0, 128),
        "orange" => Rgba::rgb(255, 165, 0),
        "yellow" => Rgba::rgb(255, 255, 0),
        "gray" | "grey" => Rgba::rgb(128, 128, 128),
        "pink" => Rgba::rgb(255, 192, 203),
        "cyan" => Rgba::rgb(0, 255, 255),
        "magenta" => Rgba::rgb(255, 0, 255),
        _ => return None,
    };
    Some(color)
}

#[cfg(test)]
mod tests {
    use super::Rgba;

    #[test]
    fn parses_picker_output_forms() {
        let cases = [
            ("#ff0000", Rgba::rgb(255, 0, 0)),
            ("#0000FF", Rgba::rgb(0, 0, 255)),
            ("#fff", Rgba::WHITE),
            ("#00000080", Rgba::rgba(0, 0, 0, 128)),
            ("rgb(41, 41, 41)", Rgba::rgb(41, 41, 41)),
            ("rgba(255,255,255,0.5)", Rgba::rgba(255, 255, 255, 128)),
            ("rgb(100% 0% 0%)", Rgba::rgb(255, 0, 0)),
            ("White", Rgba::WHITE),
        ];
        for (raw, expected) in cases {
            assert_eq!(Rgba::parse(raw), Some(expected), "raw={raw}");
        }
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "#12", "#ggg", "rgb(1,2)", "chartreuse-ish"] {
            assert_eq!(Rgba::parse(raw), None, "raw={raw}");
        }
    }

    #[test]
    fn displays_as_hex() {
        assert_eq!(Rgba::rgb(73, 73, 73).to_string(), "#494949");
        assert_eq!(Rgba::rgba(0, 0, 0, 128).to_string(), "#00000080");
    }
}
