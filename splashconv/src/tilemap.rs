//! Image to tileset conversion
//!
//! This module ties the color, palette and tile stages together: it splits an
//! image into 8x8 blocks, allocates palettes, packs and deduplicates tiles and
//! assembles the tilemap into a [`TilesetImage`].

use bitfield::bitfield;
use image::RgbaImage;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::color::{ColorQuantizer, HardwareColor};
use crate::error::{BlockPos, ConversionError};
use crate::palette::{serialize_palettes, slot_for_palette, BitDepth, PaletteAllocator};
use crate::tile::{Block, Flip, TileDeduplicator, BLOCK_SIZE};

/// Largest accepted source width or height in pixels
pub const MAX_IMAGE_SIZE: u32 = 2048;

bitfield! {
    /// A screen map word referencing a tile, a palette slot and its mirroring
    #[derive(Copy, Clone, PartialEq, Eq, Hash)]
    pub struct TilemapEntry(u16);
    impl Debug;
    u16;
    pub tile, set_tile: 8, 0;
    pub palette, set_palette: 12, 9;
    pub hflip, set_hflip: 14;
    pub vflip, set_vflip: 15;
}

impl TilemapEntry {
    pub fn new(tile: u16, palette: u16, flip: Flip) -> Self {
        let mut entry = TilemapEntry(0);
        entry.set_tile(tile);
        entry.set_palette(palette);
        entry.set_hflip(flip.hflip());
        entry.set_vflip(flip.vflip());
        entry
    }

    pub fn raw(&self) -> u16 {
        self.0
    }

    pub fn flip(&self) -> Flip {
        Flip::from_bits(self.hflip(), self.vflip())
    }
}

impl From<u16> for TilemapEntry {
    fn from(raw: u16) -> Self {
        TilemapEntry(raw)
    }
}

impl Serialize for TilemapEntry {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TilemapEntry {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u16::deserialize(deserializer).map(TilemapEntry)
    }
}

/// Tiles, palettes and tilemap of one converted image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilesetImage {
    pub bpp: BitDepth,
    /// Packed unique tiles, `8 * bpp` bytes each
    #[serde(with = "hex::serde")]
    pub tiles: Vec<u8>,
    /// One entry per block, in raster order
    pub map: Vec<TilemapEntry>,
    /// Background slot followed by every used palette slot
    #[serde(with = "hex::serde")]
    pub palette: Vec<u8>,
    pub tile_count: usize,
    pub palette_count: usize,
    /// Width in tiles
    pub width: usize,
    /// Height in tiles
    pub height: usize,
}

impl TilesetImage {
    /// A single blank tile on a white background, used when no image is given
    pub fn empty() -> Self {
        TilesetImage {
            bpp: BitDepth::One,
            tiles: vec![0; 8],
            map: vec![TilemapEntry(0)],
            palette: vec![0xFF, 0x0F, 0xFF, 0x0F],
            tile_count: 1,
            palette_count: 1,
            width: 1,
            height: 1,
        }
    }

    /// Tilemap serialized as little-endian words
    pub fn map_bytes(&self) -> Vec<u8> {
        self.map.iter().flat_map(|e| e.raw().to_le_bytes()).collect()
    }

    /// Bytes taken by the palette, tile and tilemap sections
    pub fn data_size(&self) -> usize {
        self.palette.len() + self.tiles.len() + self.map.len() * 2
    }
}

/// Converts source images into [`TilesetImage`]s
#[derive(Debug, Clone, Copy)]
pub struct TilesetEncoder {
    quantizer: ColorQuantizer,
    background: HardwareColor,
}

impl TilesetEncoder {
    pub fn new(background: HardwareColor, quantizer: ColorQuantizer) -> Self {
        TilesetEncoder {
            quantizer,
            background,
        }
    }

    pub fn encode(&self, img: &RgbaImage) -> Result<TilesetImage, ConversionError> {
        let (width, height) = img.dimensions();
        if width % BLOCK_SIZE != 0 || height % BLOCK_SIZE != 0 {
            return Err(ConversionError::InvalidDimensions(width, height));
        }
        if width > MAX_IMAGE_SIZE || height > MAX_IMAGE_SIZE {
            return Err(ConversionError::ImageTooLarge(width, height));
        }

        let blocks = self.read_blocks(img);

        let mut allocator = PaletteAllocator::new();
        for block in blocks.iter() {
            allocator.add_block(block.pos, &block.colors());
        }
        let allocation = allocator.finish()?;
        let bpp = allocation.bit_depth();
        let palette = serialize_palettes(&allocation.palettes, bpp, self.background);

        let mut dedup = TileDeduplicator::new(bpp);
        let mut map = Vec::with_capacity(blocks.len());
        for (block, &palette_index) in blocks.iter().zip(allocation.block_palettes.iter()) {
            let tile = block.pack(&allocation.palettes[palette_index], bpp)?;
            let (tile_index, flip) = dedup.insert(tile)?;
            map.push(TilemapEntry::new(
                tile_index,
                slot_for_palette(palette_index),
                flip,
            ));
        }

        let tile_count = dedup.tile_count();
        debug!(
            "{}x{} tiles, {} bpp, {} unique tiles, {} palettes",
            width / BLOCK_SIZE,
            height / BLOCK_SIZE,
            bpp.bits(),
            tile_count,
            allocation.palettes.len()
        );

        Ok(TilesetImage {
            bpp,
            tiles: dedup.into_tiles(),
            map,
            palette_count: palette.len() / bpp.palette_size(),
            palette,
            tile_count,
            width: (width / BLOCK_SIZE) as usize,
            height: (height / BLOCK_SIZE) as usize,
        })
    }

    /// Split the image into quantized blocks in raster order
    fn read_blocks(&self, img: &RgbaImage) -> Vec<Block> {
        let (width, height) = img.dimensions();
        let mut blocks = Vec::with_capacity(((width / BLOCK_SIZE) * (height / BLOCK_SIZE)) as usize);
        for y in (0..height).step_by(BLOCK_SIZE as usize) {
            for x in (0..width).step_by(BLOCK_SIZE as usize) {
                blocks.push(Block::read(img, BlockPos { x, y }, &self.quantizer));
            }
        }
        blocks
    }
}
