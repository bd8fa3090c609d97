//! RGB colours as painted on the canvas
//!
//! Colours travel as `#RRGGBB` strings at the edges (sketch files, REPL input)
//! and as packed 8-bit channels everywhere else.

#[cfg(feature = "colored")]
use colored::{ColoredString, Colorize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a string is not a `#RRGGBB` hex colour
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid colour '{0}', expected #RRGGBB")]
pub struct ColorParseError(pub String);

/// A 24-bit RGB colour
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Squared Euclidean distance in RGB space.
    ///
    /// Kept in integers so that equal distances compare equal exactly.
    pub fn distance_squared(&self, other: &Color) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }

    /// Euclidean distance in RGB space
    pub fn distance(&self, other: &Color) -> f64 {
        (self.distance_squared(other) as f64).sqrt()
    }

    /// A two-character block painted in this colour, for terminal previews
    #[cfg(feature = "colored")]
    pub fn swatch(&self) -> ColoredString {
        "  ".on_truecolor(self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError(s.to_string()));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ColorParseError(s.to_string()))
        };

        Ok(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_hash() {
        assert_eq!("#D26064".parse::<Color>(), Ok(Color::rgb(0xD2, 0x60, 0x64)));
        assert_eq!("d26064".parse::<Color>(), Ok(Color::rgb(0xD2, 0x60, 0x64)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("#12345".parse::<Color>().is_err());
        assert!("#GGGGGG".parse::<Color>().is_err());
        assert!("".parse::<Color>().is_err());
        assert!("#1234567".parse::<Color>().is_err());
    }

    #[test]
    fn test_display_is_uppercase_hex() {
        assert_eq!(Color::rgb(0xab, 0x0c, 0xff).to_string(), "#AB0CFF");
    }

    #[test]
    fn test_distance() {
        let black = Color::rgb(0, 0, 0);
        let c = Color::rgb(3, 4, 0);
        assert_eq!(black.distance_squared(&c), 25);
        assert!((black.distance(&c) - 5.0).abs() < f64::EPSILON);
        assert_eq!(c.distance_squared(&c), 0);
    }
}
