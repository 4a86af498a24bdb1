//! Text dumps of a converted tileset for inspection

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::color::HardwareColor;
use crate::error::ConversionError;
use crate::tilemap::TilesetImage;

pub const PALETTE_HEX: &str = "palette.hex";
pub const TILES_HEX: &str = "tiles.hex";
pub const TILEMAP_HEX: &str = "tile_map.hex";

/// Write a tileset, or anything holding one, as pretty-printed JSON
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ConversionError> {
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

/// One palette slot per line, colors as 3-digit hex
pub fn write_palette<W: Write>(
    tileset: &TilesetImage,
    out: &mut W,
) -> Result<(), ConversionError> {
    for slot in tileset.palette.chunks(tileset.bpp.palette_size()) {
        for color in slot.chunks_exact(2) {
            let color = HardwareColor::from_le_bytes([color[0], color[1]]);
            write!(out, "{:03x} ", color.value())?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// One tile per line, the blank tile excluded
pub fn write_tiles<W: Write>(
    tileset: &TilesetImage,
    out: &mut W,
) -> Result<(), ConversionError> {
    for tile in tileset.tiles.chunks(tileset.bpp.tile_size()) {
        writeln!(out, "{}", hex::encode(tile))?;
    }
    Ok(())
}

/// One tilemap row per line
pub fn write_tilemap<W: Write>(
    tileset: &TilesetImage,
    out: &mut W,
) -> Result<(), ConversionError> {
    for row in tileset.map.chunks(tileset.width.max(1)) {
        for entry in row {
            write!(out, "{:04x} ", entry.raw())?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write palette, tile and tilemap hex files into `dir`
pub fn write_hex_files(tileset: &TilesetImage, dir: &Path) -> Result<(), ConversionError> {
    std::fs::create_dir_all(dir)?;
    let mut palette = BufWriter::new(File::create(dir.join(PALETTE_HEX))?);
    write_palette(tileset, &mut palette)?;
    let mut tiles = BufWriter::new(File::create(dir.join(TILES_HEX))?);
    write_tiles(tileset, &mut tiles)?;
    let mut tilemap = BufWriter::new(File::create(dir.join(TILEMAP_HEX))?);
    write_tilemap(tileset, &mut tilemap)?;
    palette.flush()?;
    tiles.flush()?;
    tilemap.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::tests::{encoder, unique_tiles_image};

    fn dump(write: fn(&TilesetImage, &mut Vec<u8>) -> Result<(), ConversionError>) -> String {
        let tileset = encoder().encode(&unique_tiles_image(2)).unwrap();
        let mut out = Vec::new();
        write(&tileset, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn palette_lines() {
        assert_eq!(dump(write_palette), "fff 000 \n000 fff \n");
    }

    #[test]
    fn tile_lines() {
        assert_eq!(dump(write_tiles), "00010000000000ff\n00010100000000ff\n");
    }

    #[test]
    fn tilemap_lines() {
        assert_eq!(dump(write_tilemap), "022e 022f \n");
    }

    #[test]
    fn json_round_trips() {
        let tileset = encoder().encode(&unique_tiles_image(3)).unwrap();
        let json = serde_json::to_string(&tileset).unwrap();
        assert!(json.contains("\"tiles\":\"00010000000000ff"));
        let parsed: TilesetImage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tileset);
    }
}
