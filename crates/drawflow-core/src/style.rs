//! Colors and visual style for diagram elements.

use peniko::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a color string is not `#rgb`, `#rrggbb`, `#rrggbbaa` or `transparent`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color: {0:?}")]
pub struct ColorParseError(pub String);

/// Serializable color representation (RGBA8).
///
/// Persists as a CSS-style hex string so saved diagrams stay readable
/// by web hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa` or the keyword `transparent`.
    pub fn from_hex(value: &str) -> Result<Self, ColorParseError> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("transparent") {
            return Ok(Self::transparent());
        }
        let err = || ColorParseError(value.to_string());
        let hex = trimmed.strip_prefix('#').ok_or_else(err)?;
        if !hex.is_ascii() {
            return Err(err());
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| err());

        match hex.len() {
            3 => {
                let mut rgb = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16).ok_or_else(err)? as u8;
                    rgb[i] = v * 17;
                }
                Ok(Self::rgb(rgb[0], rgb[1], rgb[2]))
            }
            6 => Ok(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            8 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => Err(err()),
        }
    }

    /// Format as `#rrggbb`, `#rrggbbaa`, or `transparent` for fully clear black.
    pub fn to_hex(&self) -> String {
        if *self == Self::transparent() {
            return "transparent".to_string();
        }
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for SerializableColor {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<SerializableColor> for String {
    fn from(color: SerializableColor) -> Self {
        color.to_hex()
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Default fill for newly drawn shapes (light blue).
pub const SHAPE_FILL: SerializableColor = SerializableColor::rgb(0xe3, 0xf2, 0xfd);
/// Default stroke for newly drawn shapes.
pub const SHAPE_STROKE: SerializableColor = SerializableColor::rgb(0x19, 0x76, 0xd2);
/// Default stroke for connectors.
pub const CONNECTOR_STROKE: SerializableColor = SerializableColor::rgb(0x33, 0x33, 0x33);

/// Style properties for elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementStyle {
    /// Fill color (None = no fill).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<SerializableColor>,
    /// Stroke color (None = no outline).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<SerializableColor>,
    pub stroke_width: f64,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    pub opacity: f64,
    /// Dash pattern; empty means a solid stroke.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stroke_dash: Vec<f64>,
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: Some(SerializableColor::black()),
            stroke_width: 2.0,
            opacity: 1.0,
            stroke_dash: Vec::new(),
        }
    }
}

impl ElementStyle {
    /// Style given to shapes created with a drawing tool or by drop.
    pub fn shape() -> Self {
        Self {
            fill: Some(SHAPE_FILL),
            stroke: Some(SHAPE_STROKE),
            ..Self::default()
        }
    }

    /// Style given to text elements: outline only.
    pub fn text() -> Self {
        Self {
            fill: Some(SerializableColor::transparent()),
            stroke: Some(SHAPE_STROKE),
            ..Self::default()
        }
    }

    /// Style given to connectors created by finishing a connection.
    pub fn connector() -> Self {
        Self {
            fill: None,
            stroke: Some(CONNECTOR_STROKE),
            ..Self::default()
        }
    }

    /// Fill color with the element opacity applied, for renderers.
    pub fn fill_with_opacity(&self) -> Option<Color> {
        self.fill.map(|c| self.with_opacity(c))
    }

    /// Stroke color with the element opacity applied, for renderers.
    pub fn stroke_with_opacity(&self) -> Option<Color> {
        self.stroke.map(|c| self.with_opacity(c))
    }

    fn with_opacity(&self, color: SerializableColor) -> Color {
        let alpha = (color.a as f64 * self.opacity.clamp(0.0, 1.0)) as u8;
        Color::from_rgba8(color.r, color.g, color.b, alpha)
    }

    pub fn apply(&mut self, patch: &StylePatch) {
        if let Some(fill) = patch.fill {
            self.fill = fill;
        }
        if let Some(stroke) = patch.stroke {
            self.stroke = stroke;
        }
        if let Some(width) = patch.stroke_width {
            self.stroke_width = width;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(dash) = &patch.stroke_dash {
            self.stroke_dash = dash.clone();
        }
    }
}

/// Field-by-field update of an [`ElementStyle`]. `Some(None)` clears a color.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylePatch {
    pub fill: Option<Option<SerializableColor>>,
    pub stroke: Option<Option<SerializableColor>>,
    pub stroke_width: Option<f64>,
    pub opacity: Option<f64>,
    pub stroke_dash: Option<Vec<f64>>,
}
