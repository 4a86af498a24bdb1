//! Tile packing and deduplication
//!
//! Each 8x8 block is packed into bitplane bytes: one byte per row and plane,
//! leftmost pixel in the most significant bit. Packed tiles are then matched
//! against previously stored tiles, including their mirrored forms.

use std::collections::HashMap;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::color::{ColorQuantizer, HardwareColor};
use crate::error::{BlockPos, ConversionError};
use crate::palette::{BitDepth, ColorSet, Palette};

/// Width and height of a block in pixels
pub const BLOCK_SIZE: u32 = 8;
/// Number of pixels in a block
const BLOCK_PIXELS: usize = (BLOCK_SIZE * BLOCK_SIZE) as usize;
/// Tile RAM slots used by the boot firmware before the splash tiles
pub const BOOT_TILE_OFFSET: u16 = 46;
/// Maximum number of unique splash tiles
pub const MAX_TILES: usize = 192;

/// An 8x8 region of the source image, quantized to hardware colors
#[derive(Debug, Clone)]
pub struct Block {
    pub pos: BlockPos,
    /// Row-major pixel colors
    pub pixels: [HardwareColor; BLOCK_PIXELS],
}

impl Block {
    /// Read and quantize the block whose top-left pixel is at `pos`
    pub fn read(img: &RgbaImage, pos: BlockPos, quantizer: &ColorQuantizer) -> Self {
        let mut pixels = [HardwareColor::default(); BLOCK_PIXELS];
        for ty in 0..BLOCK_SIZE {
            for tx in 0..BLOCK_SIZE {
                let [r, g, b, _] = img.get_pixel(pos.x + tx, pos.y + ty).0;
                pixels[(ty * BLOCK_SIZE + tx) as usize] = quantizer.quantize(r, g, b);
            }
        }
        Block { pos, pixels }
    }

    /// Distinct colors, in scan order
    pub fn colors(&self) -> ColorSet {
        self.pixels.iter().copied().collect()
    }

    /// Pack the block's pixel indices within `palette` into bitplanes
    pub fn pack(&self, palette: &Palette, bpp: BitDepth) -> Result<Vec<u8>, ConversionError> {
        let mut tile = Vec::with_capacity(bpp.tile_size());
        for row in self.pixels.chunks_exact(BLOCK_SIZE as usize) {
            let mut b0 = 0u8;
            let mut b1 = 0u8;
            for &color in row {
                let index = palette.index_of(color).ok_or_else(|| {
                    ConversionError::Corrupt(format!(
                        "block at {} uses {color} outside its palette",
                        self.pos
                    ))
                })?;
                b0 = (b0 << 1) | (index & 1) as u8;
                b1 = (b1 << 1) | ((index >> 1) & 1) as u8;
            }
            tile.push(b0);
            if bpp == BitDepth::Two {
                tile.push(b1);
            }
        }
        Ok(tile)
    }
}

/// Mirroring applied to a stored tile when it is displayed
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flip {
    None,
    Horizontal,
    Vertical,
    Both,
}

impl Flip {
    pub fn from_bits(hflip: bool, vflip: bool) -> Self {
        match (hflip, vflip) {
            (false, false) => Flip::None,
            (true, false) => Flip::Horizontal,
            (false, true) => Flip::Vertical,
            (true, true) => Flip::Both,
        }
    }

    pub fn hflip(self) -> bool {
        matches!(self, Flip::Horizontal | Flip::Both)
    }

    pub fn vflip(self) -> bool {
        matches!(self, Flip::Vertical | Flip::Both)
    }

    /// Mirror a tile as the hardware would when displaying it with this flip
    pub fn apply(self, tile: &[u8], bpp: BitDepth) -> Vec<u8> {
        let mut out = tile.to_vec();
        if self.hflip() {
            out = hflip_tile(&out);
        }
        if self.vflip() {
            out = vflip_tile(&out, bpp);
        }
        out
    }
}

/// Mirror left-to-right, independent of bit depth
pub fn hflip_tile(tile: &[u8]) -> Vec<u8> {
    tile.iter().map(|b| b.reverse_bits()).collect()
}

/// Mirror top-to-bottom, keeping the planes of each row together
pub fn vflip_tile(tile: &[u8], bpp: BitDepth) -> Vec<u8> {
    tile.chunks(bpp.bits()).rev().flatten().copied().collect()
}

/// Stores unique tiles and maps packed tiles to (tile index, flip)
#[derive(Debug)]
pub struct TileDeduplicator {
    bpp: BitDepth,
    registry: HashMap<Vec<u8>, u16>,
    tiles: Vec<u8>,
    count: usize,
}

impl TileDeduplicator {
    /// Create a registry with the blank tile pre-registered as index 0
    pub fn new(bpp: BitDepth) -> Self {
        let mut registry = HashMap::new();
        registry.insert(vec![0u8; bpp.tile_size()], 0);
        TileDeduplicator {
            bpp,
            registry,
            tiles: Vec::new(),
            count: 0,
        }
    }

    /// Find `tile` or one of its mirrors, storing it if neither is known
    pub fn insert(&mut self, tile: Vec<u8>) -> Result<(u16, Flip), ConversionError> {
        let vtile = vflip_tile(&tile, self.bpp);
        let candidates = [
            (Flip::None, tile.clone()),
            (Flip::Horizontal, hflip_tile(&tile)),
            (Flip::Vertical, vtile.clone()),
            (Flip::Both, hflip_tile(&vtile)),
        ];
        for (flip, candidate) in candidates.iter() {
            if let Some(&index) = self.registry.get(candidate) {
                return Ok((index, *flip));
            }
        }

        if self.count == MAX_TILES {
            return Err(ConversionError::TileOverflow(self.count + 1));
        }
        let index = BOOT_TILE_OFFSET + self.count as u16;
        self.tiles.extend_from_slice(&tile);
        self.registry.insert(tile, index);
        self.count += 1;
        Ok((index, Flip::None))
    }

    /// Number of stored tiles, not counting the blank tile
    pub fn tile_count(&self) -> usize {
        self.count
    }

    pub fn into_tiles(self) -> Vec<u8> {
        self.tiles
    }
}
