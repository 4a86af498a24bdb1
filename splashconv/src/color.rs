//! The console's 12-bit color space.
//!
//! [`HardwareColor`] is the packed `R<<8 | G<<4 | B` word palette RAM stores.
//! [`ColorQuantizer`] brings 8-bit source pixels down to it, optionally
//! compensating for the LCD first. The Oklab distance at the bottom feeds the
//! conversion quality report.

use std::fmt;
use std::str::FromStr;

use oklab::{srgb_to_oklab, Oklab, Rgb};
use serde::{Deserialize, Serialize};

/// Mask of the significant bits of a hardware color word
const COLOR_MASK: u16 = 0x0FFF;
/// Multiplier expanding a 4-bit channel back to 8 bits (0xF * 17 = 0xFF)
const NIBBLE_EXPAND: u8 = 17;

/// A 12-bit color as stored in palette RAM, 4 bits per channel
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct HardwareColor(u16);

impl HardwareColor {
    pub const BLACK: HardwareColor = HardwareColor(0x000);
    pub const WHITE: HardwareColor = HardwareColor(0xFFF);

    /// Wrap a raw color word, discarding bits above the low 12
    pub const fn new(value: u16) -> Self {
        HardwareColor(value & COLOR_MASK)
    }

    /// Truncate each 8-bit channel to its top 4 bits
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        HardwareColor((((r & 0xF0) as u16) << 4) | ((g & 0xF0) as u16) | ((b >> 4) as u16))
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    pub const fn r(self) -> u8 {
        ((self.0 >> 8) & 0x0F) as u8
    }

    pub const fn g(self) -> u8 {
        ((self.0 >> 4) & 0x0F) as u8
    }

    pub const fn b(self) -> u8 {
        (self.0 & 0x0F) as u8
    }

    /// Expand back to 8-bit channels
    pub fn to_rgb(self) -> (u8, u8, u8) {
        (
            self.r() * NIBBLE_EXPAND,
            self.g() * NIBBLE_EXPAND,
            self.b() * NIBBLE_EXPAND,
        )
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        let (r, g, b) = self.to_rgb();
        image::Rgba([r, g, b, 255])
    }

    pub fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 2]) -> Self {
        HardwareColor::new(u16::from_le_bytes(bytes))
    }
}

impl fmt::Display for HardwareColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:03x}", self.0)
    }
}

impl FromStr for HardwareColor {
    type Err = String;

    /// Accepts `#rgb` (already 12-bit) or `#rrggbb` (reduced to 12 bits)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('#');
        match digits.len() {
            3 => u16::from_str_radix(digits, 16)
                .map(HardwareColor::new)
                .map_err(|e| format!("invalid color {s:?}: {e}")),
            6 => {
                let rgb = hex::decode(digits).map_err(|e| format!("invalid color {s:?}: {e}"))?;
                Ok(HardwareColor::from_rgb(rgb[0], rgb[1], rgb[2]))
            }
            _ => Err(format!("invalid color {s:?}: expected #rgb or #rrggbb")),
        }
    }
}

impl Serialize for HardwareColor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for HardwareColor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Converts 8-bit source pixels into hardware colors
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorQuantizer {
    /// Pre-compensate for the LCD's color response before truncating
    pub inverse_color_correct: bool,
}

impl ColorQuantizer {
    pub fn new(inverse_color_correct: bool) -> Self {
        ColorQuantizer {
            inverse_color_correct,
        }
    }

    pub fn quantize(&self, r: u8, g: u8, b: u8) -> HardwareColor {
        if self.inverse_color_correct {
            let (r, g, b) = inverse_color_correct(r, g, b);
            HardwareColor::from_rgb(r, g, b)
        } else {
            HardwareColor::from_rgb(r, g, b)
        }
    }
}

/// Approximate the inverse of the display's color mixing.
/// Coefficients are scaled by 100.
fn inverse_color_correct(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let r2 = (r * 124 - g * 20 - b * 4) / 100;
    let g2 = (r * 12 + g * 140 - b * 52) / 100;
    let b2 = (r * -36 - g * 20 + b * 156) / 100;
    (
        r2.clamp(0, 255) as u8,
        g2.clamp(0, 255) as u8,
        b2.clamp(0, 255) as u8,
    )
}

/// Emulate the color LCD's channel bleed on an 8-bit pixel
pub fn lcd_emulate(pixel: image::Rgba<u8>) -> image::Rgba<u8> {
    let [r, g, b, a] = pixel.0;
    let (r, g, b) = ((r >> 4) as u16, (g >> 4) as u16, (b >> 4) as u16);
    let r2 = r * 26 + g * 4 + b * 2;
    let g2 = g * 24 + b * 8;
    let b2 = r * 6 + g * 4 + b * 22;
    image::Rgba([(r2 >> 1) as u8, (g2 >> 1) as u8, (b2 >> 1) as u8, a])
}

pub fn oklab_from_rgb(r: u8, g: u8, b: u8) -> Oklab {
    srgb_to_oklab(Rgb { r, g, b })
}

fn chroma(c: &Oklab) -> f32 {
    (c.a * c.a + c.b * c.b).sqrt()
}

/// Oklab color difference, split into lightness, chroma and hue terms
pub fn oklab_delta_e(a: Oklab, b: Oklab) -> f32 {
    let lightness = a.l - b.l;
    let chroma_diff = chroma(&a) - chroma(&b);
    let ab_sq = (a.a - b.a).powi(2) + (a.b - b.b).powi(2);
    // hue term can dip below zero through rounding
    let hue_sq = (ab_sq - chroma_diff * chroma_diff).abs();
    (lightness * lightness + chroma_diff * chroma_diff + hue_sq).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_top_nibbles() {
        assert_eq!(HardwareColor::from_rgb(0xFF, 0xFF, 0xFF), HardwareColor::WHITE);
        assert_eq!(HardwareColor::from_rgb(0x12, 0x34, 0x56).value(), 0x135);
        assert_eq!(HardwareColor::from_rgb(0x0F, 0x0F, 0x0F), HardwareColor::BLACK);
    }

    #[test]
    fn new_masks_high_bits() {
        assert_eq!(HardwareColor::new(0xFABC).value(), 0xABC);
    }

    #[test]
    fn expands_nibbles() {
        assert_eq!(HardwareColor::new(0xF80).to_rgb(), (255, 136, 0));
    }

    #[test]
    fn parses_config_colors() {
        assert_eq!("#fff".parse::<HardwareColor>(), Ok(HardwareColor::WHITE));
        assert_eq!(
            "#12a4f0".parse::<HardwareColor>(),
            Ok(HardwareColor::new(0x1AF))
        );
        assert!("#12".parse::<HardwareColor>().is_err());
        assert!("#zzzzzz".parse::<HardwareColor>().is_err());
        assert_eq!(HardwareColor::new(0x0A0).to_string(), "#0a0");
    }

    #[test]
    fn color_correction_clamps() {
        let quantizer = ColorQuantizer::new(true);
        // Pure white stays white once clamped
        assert_eq!(quantizer.quantize(255, 255, 255), HardwareColor::WHITE);
        // Pure red picks up a little green and loses its blue
        assert_eq!(quantizer.quantize(255, 0, 0), HardwareColor::new(0xF10));
        assert_eq!(
            ColorQuantizer::default().quantize(255, 0, 0),
            HardwareColor::new(0xF00)
        );
    }

    #[test]
    fn lcd_emulation_of_white() {
        let out = lcd_emulate(image::Rgba([255, 255, 255, 255]));
        assert_eq!(out, image::Rgba([240, 240, 240, 255]));
    }

    #[test]
    fn delta_e_of_identical_colors_is_zero() {
        let c = oklab_from_rgb(10, 200, 30);
        assert_eq!(oklab_delta_e(c, c), 0.0);
        assert!(oklab_delta_e(c, oklab_from_rgb(0, 0, 0)) > 0.1);
    }

    #[test]
    fn delta_e_terms() {
        use approx::assert_relative_eq;

        let gray = |l| Oklab { l, a: 0.0, b: 0.0 };
        assert_relative_eq!(oklab_delta_e(gray(0.8), gray(0.5)), 0.3, epsilon = 1e-6);

        // same lightness and chroma, hue rotated by 90 degrees
        let a = Oklab { l: 0.7, a: 0.1, b: 0.0 };
        let b = Oklab { l: 0.7, a: 0.0, b: 0.1 };
        assert_relative_eq!(oklab_delta_e(a, b), 0.02f32.sqrt(), epsilon = 1e-6);
        assert_relative_eq!(oklab_delta_e(a, b), oklab_delta_e(b, a), epsilon = 1e-6);
    }
}
