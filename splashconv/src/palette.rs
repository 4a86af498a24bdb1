//! Palette allocation and hardware slot mapping
//!
//! Blocks are assigned to shared palettes greedily, in raster order. Once every
//! block is placed, each palette's colors are sorted by value, so pixel index 0
//! is always the palette's lowest color. The allocator-local palette indices
//! are then renumbered into the hardware's palette slot order, with slot 0
//! reserved for the background.

use indexmap::IndexSet;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::color::HardwareColor;
use crate::error::{BlockPos, ConversionError, PaletteOverflow};

/// Maximum number of distinct colors in a single 8x8 block
pub const MAX_BLOCK_COLORS: usize = 4;
/// Maximum number of allocated palettes, not counting the background slot
pub const MAX_PALETTES: usize = 11;
/// Palettes allocated before this index hold 4 colors, later ones hold 3
const FULL_PALETTE_COUNT: usize = 7;
/// Hardware slot for each allocator-local palette index
pub const PALETTE_SLOT_ORDER: [usize; MAX_PALETTES] = [1, 2, 3, 8, 9, 10, 11, 4, 5, 6, 7];

/// Distinct colors of a block or palette
pub type ColorSet = IndexSet<HardwareColor>;

/// Number of bits per pixel index, global to the whole image
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    One,
    Two,
}

impl BitDepth {
    /// 2bpp is needed as soon as any palette holds more than 2 colors
    pub fn for_palettes(palettes: &[Palette]) -> Self {
        if palettes.iter().any(|p| p.len() > 2) {
            BitDepth::Two
        } else {
            BitDepth::One
        }
    }

    pub fn bits(self) -> usize {
        match self {
            BitDepth::One => 1,
            BitDepth::Two => 2,
        }
    }

    /// Colors addressable by one pixel index
    pub fn colors(self) -> usize {
        1 << self.bits()
    }

    /// Bytes per packed 8x8 tile
    pub fn tile_size(self) -> usize {
        8 * self.bits()
    }

    /// Bytes per serialized palette slot
    pub fn palette_size(self) -> usize {
        2 << self.bits()
    }
}

/// A set of colors shared by one or more blocks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub colors: ColorSet,
}

impl Palette {
    /// Colors the palette allocated at `index` may hold
    pub fn capacity(index: usize) -> usize {
        if index < FULL_PALETTE_COUNT {
            4
        } else {
            3
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Pixel index of a color within this palette
    pub fn index_of(&self, color: HardwareColor) -> Option<usize> {
        self.colors.get_index_of(&color)
    }

    /// Try to make this palette cover `colors`, growing it if there is room
    fn absorb(&mut self, colors: &ColorSet, capacity: usize) -> bool {
        let missing = colors.iter().filter(|c| !self.colors.contains(*c)).count();
        if missing == 0 {
            return true;
        }
        if missing + self.colors.len() > capacity {
            return false;
        }
        self.colors.extend(colors.iter().copied());
        true
    }
}

/// Result of palette allocation
#[derive(Debug, Clone)]
pub struct Allocation {
    /// Allocator-local palette index of every block, in raster order
    pub block_palettes: Vec<usize>,
    pub palettes: Vec<Palette>,
}

impl Allocation {
    pub fn bit_depth(&self) -> BitDepth {
        BitDepth::for_palettes(&self.palettes)
    }
}

/// Greedy first-fit palette allocator.
///
/// No backtracking is done, so some images that a smarter packing could fit
/// are rejected.
#[derive(Debug, Default)]
pub struct PaletteAllocator {
    palettes: Vec<Palette>,
    block_palettes: Vec<usize>,
    rejected: Vec<BlockPos>,
}

impl PaletteAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next block (in raster order) to a palette
    pub fn add_block(&mut self, pos: BlockPos, colors: &ColorSet) {
        if colors.len() > MAX_BLOCK_COLORS {
            self.rejected.push(pos);
            return;
        }

        let found = self
            .palettes
            .iter_mut()
            .enumerate()
            .position(|(i, palette)| palette.absorb(colors, Palette::capacity(i)));

        match found {
            Some(index) => self.block_palettes.push(index),
            None if self.palettes.len() >= FULL_PALETTE_COUNT && colors.len() > 3 => {
                self.rejected.push(pos);
            }
            None => {
                self.block_palettes.push(self.palettes.len());
                self.palettes.push(Palette {
                    colors: colors.clone(),
                });
            }
        }
    }

    pub fn finish(self) -> Result<Allocation, ConversionError> {
        if !self.rejected.is_empty() {
            return Err(PaletteOverflow::TooManyColors(self.rejected).into());
        }
        if self.palettes.len() > MAX_PALETTES {
            return Err(PaletteOverflow::TooManyPalettes(self.palettes.len()).into());
        }
        let mut palettes = self.palettes;
        for palette in palettes.iter_mut() {
            palette.colors.sort();
        }
        debug!(
            "allocated {} palettes for {} blocks",
            palettes.len(),
            self.block_palettes.len()
        );
        Ok(Allocation {
            block_palettes: self.block_palettes,
            palettes,
        })
    }
}

/// Hardware palette slot of an allocator-local palette index
pub fn slot_for_palette(index: usize) -> u16 {
    PALETTE_SLOT_ORDER[index] as u16
}

/// Allocator-local palette index stored in a hardware slot, if any
pub fn palette_for_slot(slot: usize) -> Option<usize> {
    PALETTE_SLOT_ORDER.iter().position(|&s| s == slot)
}

/// Number of palette slots written, including the background slot
pub fn palette_slot_count(palette_count: usize) -> usize {
    PALETTE_SLOT_ORDER[..palette_count]
        .iter()
        .max()
        .map_or(1, |&max| max + 1)
}

/// Serialize the background slot followed by every slot up to the highest used.
/// Unused slots and missing colors are zero.
pub fn serialize_palettes(
    palettes: &[Palette],
    bpp: BitDepth,
    background: HardwareColor,
) -> Vec<u8> {
    let slots = palette_slot_count(palettes.len());
    let mut data = Vec::with_capacity(slots * bpp.palette_size());

    data.extend_from_slice(&background.to_le_bytes());
    data.resize(bpp.palette_size(), 0);

    for slot in 1..slots {
        let colors = palette_for_slot(slot)
            .and_then(|i| palettes.get(i))
            .map(|p| &p.colors);
        for i in 0..bpp.colors() {
            let color = colors
                .and_then(|c| c.get_index(i))
                .copied()
                .unwrap_or_default();
            data.extend_from_slice(&color.to_le_bytes());
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(colors: &[u16]) -> ColorSet {
        colors.iter().map(|&c| HardwareColor::new(c)).collect()
    }

    fn pos(i: u32) -> BlockPos {
        BlockPos { x: i * 8, y: 0 }
    }

    fn values(palette: &Palette) -> Vec<u16> {
        palette.colors.iter().map(|c| c.value()).collect()
    }

    #[test]
    fn merges_into_existing_palette() {
        let mut alloc = PaletteAllocator::new();
        alloc.add_block(pos(0), &set(&[0x000, 0xFFF]));
        alloc.add_block(pos(1), &set(&[0xFFF, 0xF00]));
        alloc.add_block(pos(2), &set(&[0x0F0, 0x00F]));
        let result = alloc.finish().unwrap();

        assert_eq!(result.block_palettes, vec![0, 0, 1]);
        assert_eq!(result.palettes.len(), 2);
        assert_eq!(values(&result.palettes[0]), vec![0x000, 0xF00, 0xFFF]);
        assert_eq!(result.bit_depth(), BitDepth::Two);
    }

    #[test]
    fn palette_colors_are_sorted() {
        let mut alloc = PaletteAllocator::new();
        alloc.add_block(pos(0), &set(&[0xFFF, 0x0F0, 0x000]));
        alloc.add_block(pos(1), &set(&[0x00F, 0xFFF]));
        let result = alloc.finish().unwrap();

        let palette = &result.palettes[0];
        assert_eq!(values(palette), vec![0x000, 0x00F, 0x0F0, 0xFFF]);
        assert_eq!(palette.index_of(HardwareColor::BLACK), Some(0));
        assert_eq!(palette.index_of(HardwareColor::WHITE), Some(3));
    }

    #[test]
    fn subset_reuses_palette() {
        let mut alloc = PaletteAllocator::new();
        alloc.add_block(pos(0), &set(&[1, 2, 3, 4]));
        alloc.add_block(pos(1), &set(&[3]));
        let result = alloc.finish().unwrap();
        assert_eq!(result.block_palettes, vec![0, 0]);
    }

    #[test]
    fn later_palettes_hold_three_colors() {
        let mut alloc = PaletteAllocator::new();
        for i in 0..7u16 {
            alloc.add_block(pos(i as u32), &set(&[i * 16 + 1, i * 16 + 2, i * 16 + 3, i * 16 + 4]));
        }
        alloc.add_block(pos(7), &set(&[0x800, 0x801]));
        alloc.add_block(pos(8), &set(&[0x802]));
        // palette 7 is full at 3 colors
        alloc.add_block(pos(9), &set(&[0x803]));
        let result = alloc.finish().unwrap();

        assert_eq!(result.palettes.len(), 9);
        assert_eq!(result.block_palettes[7..], [7, 7, 8]);
    }

    #[test]
    fn rejects_five_color_block() {
        let mut alloc = PaletteAllocator::new();
        alloc.add_block(pos(0), &set(&[1, 2]));
        alloc.add_block(pos(1), &set(&[1, 2, 3, 4, 5]));
        match alloc.finish() {
            Err(ConversionError::PaletteOverflow(PaletteOverflow::TooManyColors(blocks))) => {
                assert_eq!(blocks, vec![pos(1)]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_four_colors_after_seven_palettes() {
        let mut alloc = PaletteAllocator::new();
        for i in 0..8u16 {
            alloc.add_block(pos(i as u32), &set(&[i * 16 + 1, i * 16 + 2, i * 16 + 3, i * 16 + 4]));
        }
        assert!(matches!(
            alloc.finish(),
            Err(ConversionError::PaletteOverflow(PaletteOverflow::TooManyColors(_)))
        ));
    }

    #[test]
    fn rejects_twelve_palettes() {
        let mut alloc = PaletteAllocator::new();
        for i in 0..12u16 {
            alloc.add_block(pos(i as u32), &set(&[i * 16 + 1, i * 16 + 2, i * 16 + 3]));
        }
        assert!(matches!(
            alloc.finish(),
            Err(ConversionError::PaletteOverflow(PaletteOverflow::TooManyPalettes(12)))
        ));
    }

    #[test]
    fn slot_order_round_trips() {
        for (i, &slot) in PALETTE_SLOT_ORDER.iter().enumerate() {
            assert_eq!(palette_for_slot(slot), Some(i));
        }
        assert_eq!(palette_for_slot(0), None);
        assert_eq!(palette_slot_count(0), 1);
        assert_eq!(palette_slot_count(1), 2);
        assert_eq!(palette_slot_count(4), 9);
        assert_eq!(palette_slot_count(11), 12);
    }

    #[test]
    fn serializes_slots_in_hardware_order() {
        let palettes = vec![
            Palette { colors: set(&[0x123, 0x456]) },
            Palette { colors: set(&[0x789]) },
            Palette { colors: set(&[0xABC]) },
            Palette { colors: set(&[0xDEF]) },
        ];
        let data = serialize_palettes(&palettes, BitDepth::One, HardwareColor::WHITE);

        // background + slots 1..=8, two colors each
        assert_eq!(data.len(), 9 * 4);
        assert_eq!(data[0..4], [0xFF, 0x0F, 0, 0]);
        assert_eq!(data[4..8], [0x23, 0x01, 0x56, 0x04]);
        assert_eq!(data[8..12], [0x89, 0x07, 0, 0]);
        // slots 4..=7 are placeholders
        assert!(data[16..32].iter().all(|&b| b == 0));
        assert_eq!(data[32..36], [0xEF, 0x0D, 0, 0]);
    }
}
