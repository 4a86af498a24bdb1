//! Tileset to raster conversion, used for previews and round-trip checks

use image::{Rgba, RgbaImage};

use crate::color::{lcd_emulate, HardwareColor};
use crate::config::{Orientation, Point};
use crate::error::ConversionError;
use crate::palette::BitDepth;
use crate::tile::{BLOCK_SIZE, BOOT_TILE_OFFSET};
use crate::tilemap::{TilemapEntry, TilesetImage};

/// Screen size in pixels, landscape orientation
const SCREEN_WIDTH: u32 = 224;
const SCREEN_HEIGHT: u32 = 144;

/// Render a tileset into an RGBA image.
///
/// Blocks referencing the blank tile are left fully transparent.
pub fn render(tileset: &TilesetImage) -> Result<RgbaImage, ConversionError> {
    let (width, height) = (tileset.width, tileset.height);
    if tileset.map.len() < width * height {
        return Err(ConversionError::Corrupt(format!(
            "tilemap has {} entries, {}x{} expected",
            tileset.map.len(),
            width,
            height
        )));
    }

    let mut out = RgbaImage::new(width as u32 * BLOCK_SIZE, height as u32 * BLOCK_SIZE);
    for (i, entry) in tileset.map.iter().take(width * height).enumerate() {
        if entry.tile() == 0 {
            continue;
        }
        let pixels = decode_block(tileset, entry)?;
        let (bx, by) = ((i % width) as u32 * BLOCK_SIZE, (i / width) as u32 * BLOCK_SIZE);
        for (p, color) in pixels.iter().enumerate() {
            let (tx, ty) = (p as u32 % BLOCK_SIZE, p as u32 / BLOCK_SIZE);
            out.put_pixel(bx + tx, by + ty, color.to_rgba());
        }
    }
    Ok(out)
}

/// Colors of the 64 pixels of one non-blank block, row-major
fn decode_block(
    tileset: &TilesetImage,
    entry: &TilemapEntry,
) -> Result<Vec<HardwareColor>, ConversionError> {
    let bpp = tileset.bpp;
    let tile_index = entry.tile();
    let tile = tile_index
        .checked_sub(BOOT_TILE_OFFSET)
        .map(|i| i as usize * bpp.tile_size())
        .and_then(|start| tileset.tiles.get(start..start + bpp.tile_size()))
        .ok_or_else(|| ConversionError::Corrupt(format!("tile {tile_index} out of range")))?;

    let slot = entry.palette() as usize;
    let start = slot * bpp.palette_size();
    let palette = tileset
        .palette
        .get(start..start + bpp.palette_size())
        .ok_or_else(|| ConversionError::Corrupt(format!("palette {slot} out of range")))?;

    let tile = entry.flip().apply(tile, bpp);
    let mut pixels = Vec::with_capacity(64);
    for row in tile.chunks_exact(bpp.bits()) {
        for x in 0..BLOCK_SIZE {
            let shift = 7 - x;
            let mut index = ((row[0] >> shift) & 1) as usize;
            if bpp == BitDepth::Two {
                index |= (((row[1] >> shift) & 1) as usize) << 1;
            }
            pixels.push(HardwareColor::from_le_bytes([
                palette[index * 2],
                palette[index * 2 + 1],
            ]));
        }
    }
    Ok(pixels)
}

/// Draw the tileset onto a screen-sized canvas the way the console shows it.
///
/// `location` is the image position in tiles for the given orientation.
pub fn compose_preview(
    tileset: Option<&TilesetImage>,
    background: HardwareColor,
    location: Point,
    orientation: Orientation,
    emulate_lcd: bool,
) -> Result<RgbaImage, ConversionError> {
    let (width, height) = match orientation {
        Orientation::Horizontal => (SCREEN_WIDTH, SCREEN_HEIGHT),
        Orientation::Vertical => (SCREEN_HEIGHT, SCREEN_WIDTH),
    };
    let mut canvas = RgbaImage::from_pixel(width, height, background.to_rgba());

    if let Some(tileset) = tileset {
        let image = render(tileset)?;
        let (ox, oy) = (
            location.x as i64 * BLOCK_SIZE as i64,
            location.y as i64 * BLOCK_SIZE as i64,
        );
        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel[3] == 0 {
                continue;
            }
            let (cx, cy) = (ox + x as i64, oy + y as i64);
            if (0..width as i64).contains(&cx) && (0..height as i64).contains(&cy) {
                canvas.put_pixel(cx as u32, cy as u32, *pixel);
            }
        }
    }

    if emulate_lcd {
        for pixel in canvas.pixels_mut() {
            *pixel = lcd_emulate(*pixel);
        }
    }
    Ok(canvas)
}

/// Whether a decoded pixel was drawn, as opposed to left transparent
pub fn is_opaque(pixel: &Rgba<u8>) -> bool {
    pixel[3] != 0
}
