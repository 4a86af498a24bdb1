//! Errors raised while converting an image into a boot splash

use std::fmt;
use std::io;

use itertools::Itertools;
use thiserror::Error;

/// Pixel coordinates of the top-left corner of an 8x8 block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPos {
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.y)
    }
}

#[derive(Error, Debug)]
pub enum PaletteOverflow {
    #[error("Image has tiles with more than 4 colors in them: {}", .0.iter().join("; "))]
    TooManyColors(Vec<BlockPos>),

    #[error("Image needs {0} palettes, at most 11 are supported")]
    TooManyPalettes(usize),
}

#[derive(Error, Debug)]
pub enum LayoutOverflow {
    #[error("Invalid image width/height in tiles: {0}x{1}, expected 1 to 32")]
    TilemapSize(usize, usize),

    #[error("Splash data too large ({0} > 1920)")]
    SplashTooLarge(usize),
}

/// Errors that can occur during splash conversion
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Image dimensions {0}x{1} are not multiples of the 8x8 tile size")]
    InvalidDimensions(u32, u32),

    #[error("Image dimensions {0}x{1} are too large, at most 2048x2048 is supported")]
    ImageTooLarge(u32, u32),

    #[error(transparent)]
    PaletteOverflow(#[from] PaletteOverflow),

    #[error("Too many unique tiles in image ({0} > 192)")]
    TileOverflow(usize),

    #[error(transparent)]
    LayoutOverflow(#[from] LayoutOverflow),

    #[error("Invalid splash template: {0}")]
    Template(String),

    #[error("Invalid installer ROM: {0}")]
    Rom(String),

    #[error("Invalid EEPROM size: {0} bytes")]
    Eeprom(usize),

    #[error("Corrupt splash data: {0}")]
    Corrupt(String),

    #[error("Failed to read image: {0}")]
    ImageReadError(#[from] image::ImageError),

    #[error("Malformed splash header: {0}")]
    HeaderError(#[from] binrw::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
