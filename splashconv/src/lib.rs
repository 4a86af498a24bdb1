//! Image to tile conversion for the WonderSwan Color boot splash
//!
//! An RGBA image is quantized to 12-bit colors, split into 8x8 blocks that
//! share up to 11 palettes, packed into deduplicated 1bpp or 2bpp tiles and
//! serialized together with layout metadata into the 1920-byte splash area of
//! the console's internal EEPROM.

pub mod cipher;
pub mod cli;
pub mod color;
pub mod config;
pub mod decode;
pub mod error;
pub mod export;
pub mod metrics;
pub mod palette;
pub mod rom;
pub mod splash;
pub mod tile;
pub mod tilemap;

pub use color::{ColorQuantizer, HardwareColor};
pub use config::Layout;
pub use error::ConversionError;
pub use tilemap::{TilesetEncoder, TilesetImage};

/// Convert an image into a tileset, with slot 0 of the palette set to `background`
pub fn encode(
    img: &image::RgbaImage,
    background: HardwareColor,
    inverse_color_correct: bool,
) -> Result<TilesetImage, ConversionError> {
    TilesetEncoder::new(background, ColorQuantizer::new(inverse_color_correct)).encode(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encodes_with_background() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        let tileset = encode(&img, HardwareColor::new(0x0F0), false).unwrap();
        assert_eq!(tileset.palette[0..2], [0xF0, 0x00]);
        assert_eq!(tileset.width, 1);
    }
}
