//! Caption colors.
//!
//! Colors are given as a CSS-like name or a hex string. The original spelling
//! is kept for reports; renderers use the resolved RGB triple.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use subburn_common::error::{SubburnError, SubburnResult};

/// An opaque RGB color with its source spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    spec: String,
    rgb: [u8; 3],
}

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("white", [255, 255, 255]),
    ("black", [0, 0, 0]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
    ("gold", [255, 215, 0]),
    ("navy", [0, 0, 128]),
];

impl Color {
    /// Parse a color name, `#RGB`, `#RRGGBB`, or `0xRRGGBB`.
    pub fn parse(raw: &str) -> SubburnResult<Self> {
        let spec = raw.trim();
        let lowered = spec.to_ascii_lowercase();

        if let Some((_, rgb)) = NAMED_COLORS.iter().find(|(name, _)| *name == lowered) {
            return Ok(Self {
                spec: spec.to_string(),
                rgb: *rgb,
            });
        }

        let hex = lowered
            .strip_prefix('#')
            .or_else(|| lowered.strip_prefix("0x"))
            .filter(|h| h.is_ascii())
            .ok_or_else(|| invalid_color(spec))?;

        let rgb = match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (slot, ch) in out.iter_mut().zip(hex.chars()) {
                    let v = ch.to_digit(16).ok_or_else(|| invalid_color(spec))? as u8;
                    *slot = v * 17;
                }
                out
            }
            6 => {
                let mut out = [0u8; 3];
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                        .map_err(|_| invalid_color(spec))?;
                }
                out
            }
            _ => return Err(invalid_color(spec)),
        };

        Ok(Self {
            spec: spec.to_string(),
            rgb,
        })
    }

    pub fn white() -> Self {
        Self {
            spec: "white".to_string(),
            rgb: [255, 255, 255],
        }
    }

    pub fn black() -> Self {
        Self {
            spec: "black".to_string(),
            rgb: [0, 0, 0],
        }
    }

    pub fn rgb(&self) -> [u8; 3] {
        self.rgb
    }

    /// The color as the caller wrote it.
    pub fn as_str(&self) -> &str {
        &self.spec
    }

    /// Unambiguous `0xRRGGBB` form accepted by ffmpeg color options.
    pub fn ffmpeg_value(&self) -> String {
        let [r, g, b] = self.rgb;
        format!("0x{r:02X}{g:02X}{b:02X}")
    }
}

fn invalid_color(spec: &str) -> SubburnError {
    SubburnError::invalid_input(format!(
        "Unknown color '{spec}'. Use a color name or #RRGGBB"
    ))
}

impl FromStr for Color {
    type Err = SubburnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s)
    }
}

impl TryFrom<String> for Color {
    type Error = SubburnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.spec
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}
