//! Layout configuration for the boot splash
//!
//! Positions of the console name are in pixels, measured at the center of the
//! text. Positions of the image are in tiles.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::color::HardwareColor;
use crate::error::ConversionError;
use crate::tilemap::TilesetImage;

/// Screen size in tiles, landscape orientation
pub const SCREEN_WIDTH_TILES: i32 = 28;
pub const SCREEN_HEIGHT_TILES: i32 = 18;
/// Screen height in pixels, landscape orientation
pub const SCREEN_HEIGHT: i32 = 224;
/// Image location written when no image is supplied, outside the visible screen
const NO_IMAGE_LOCATION: Point = Point { x: 31, y: 31 };
const DEFAULT_NAME_HORIZONTAL: Point = Point { x: 112, y: 160 };
const DEFAULT_NAME_VERTICAL: Point = Point { x: 72, y: -16 };

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

/// A position for each way the console can be held
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub horizontal: Point,
    pub vertical: Point,
}

impl Placement {
    pub fn get(&self, orientation: Orientation) -> Point {
        match orientation {
            Orientation::Horizontal => self.horizontal,
            Orientation::Vertical => self.vertical,
        }
    }
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

impl Orientation {
    /// Screen size in tiles
    pub fn screen_tiles(self) -> (i32, i32) {
        match self {
            Orientation::Horizontal => (SCREEN_WIDTH_TILES, SCREEN_HEIGHT_TILES),
            Orientation::Vertical => (SCREEN_HEIGHT_TILES, SCREEN_WIDTH_TILES),
        }
    }
}

/// Anchor of the image on the screen, before offsets are applied
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    TopLeft,
    Top,
    TopRight,
    Left,
    #[default]
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Alignment {
    /// Column and row of the anchor within a 3x3 grid
    fn grid(self) -> (i32, i32) {
        let index = self as i32;
        (index % 3, index / 3)
    }
}

/// Position of an extent of `size` tiles on a screen axis of `screen` tiles
fn align(anchor: i32, screen: i32, size: i32) -> i32 {
    match anchor {
        0 => 0,
        1 => (screen - size) >> 1,
        _ => screen - size,
    }
}

/// Layout and timing of the boot splash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    /// Color filling the screen behind the image
    pub background_color: HardwareColor,
    /// Index of the console name text color
    pub name_color: u8,
    /// Seconds until the splash ends
    pub duration: f64,
    /// Custom console name position when held horizontally
    pub name_horizontal: Option<Point>,
    /// Custom console name position when held vertically
    pub name_vertical: Option<Point>,
    pub image_alignment: Alignment,
    /// Offset in tiles added to the aligned position
    pub image_offset: Placement,
    /// Pre-compensate source colors for the LCD
    pub inverse_color_correction: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            background_color: HardwareColor::WHITE,
            name_color: 0,
            duration: 2.0,
            name_horizontal: None,
            name_vertical: None,
            image_alignment: Alignment::Center,
            image_offset: Placement::default(),
            inverse_color_correction: false,
        }
    }
}

impl Layout {
    /// Read a layout from a JSON file, missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConversionError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn name_placement(&self) -> Placement {
        Placement {
            horizontal: self.name_horizontal.unwrap_or(DEFAULT_NAME_HORIZONTAL),
            vertical: self.name_vertical.unwrap_or(DEFAULT_NAME_VERTICAL),
        }
    }

    /// Image position in tiles for both orientations, kept on screen
    pub fn image_placement(&self, image: Option<&TilesetImage>) -> Placement {
        let Some(image) = image else {
            return Placement {
                horizontal: NO_IMAGE_LOCATION,
                vertical: NO_IMAGE_LOCATION,
            };
        };
        let (width, height) = (image.width as i32, image.height as i32);
        let (column, row) = self.image_alignment.grid();

        let place = |orientation: Orientation, offset: Point| {
            let (screen_width, screen_height) = orientation.screen_tiles();
            let x = align(column, screen_width, width) + offset.x;
            let y = align(row, screen_height, height) + offset.y;
            Point {
                x: x.min(screen_width - width).max(0),
                y: y.min(screen_height - height).max(0),
            }
        };

        Placement {
            horizontal: place(Orientation::Horizontal, self.image_offset.horizontal),
            vertical: place(Orientation::Vertical, self.image_offset.vertical),
        }
    }
}
