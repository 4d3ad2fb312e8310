//! Player colors
//!
//! Colors are carried as CSS-style names plus `#RRGGBB` hex so the rendering
//! collaborator can use whichever it prefers.

use serde::{Deserialize, Serialize};

/// Color of a normal item
pub const NORMAL_ITEM_COLOR: &str = "#FF0000";
/// Color of a bonus item
pub const BONUS_ITEM_COLOR: &str = "#FFD700";

/// Outline lightening applied to trail colors
pub const OUTLINE_SHADE: f64 = 0.1;

/// A player's display color
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerColor {
    pub name: String,
    pub hex: String,
}

impl PlayerColor {
    pub fn new(name: &str, hex: &str) -> Self {
        Self {
            name: name.to_string(),
            hex: hex.to_string(),
        }
    }

    /// Slightly lighter variant used for the trail outline
    pub fn outline(&self) -> String {
        shade_hex(&self.hex, OUTLINE_SHADE).unwrap_or_else(|| self.hex.clone())
    }
}

/// Parse `#RGB` or `#RRGGBB`
pub fn parse_hex(hex: &str) -> Option<[u8; 3]> {
    let digits = hex.strip_prefix('#')?;
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// Format an RGB triple as `#rrggbb`
pub fn to_hex(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Lighten (positive) or darken (negative) a hex color by `percent` in [-1, 1]
pub fn shade_hex(hex: &str, percent: f64) -> Option<String> {
    let percent = percent.clamp(-1.0, 1.0);
    let rgb = parse_hex(hex)?;
    let shade = |c: u8| {
        let c = c as f64;
        let shaded = if percent < 0.0 {
            c + c * percent
        } else {
            c + (255.0 - c) * percent
        };
        shaded.round().clamp(0.0, 255.0) as u8
    };
    Some(to_hex([shade(rgb[0]), shade(rgb[1]), shade(rgb[2])]))
}
