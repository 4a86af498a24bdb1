//! Boot splash blob layout
//!
//! The blob starts with a template prefix holding the splash header, followed
//! by the palette, tile and tilemap sections. The header is read from the
//! template, patched and written back in place.

use std::io::Cursor;

use binrw::{BinRead, BinWrite};
use log::{debug, warn};
use serde::Serialize;

use crate::color::HardwareColor;
use crate::config::{Layout, Placement, Point, SCREEN_HEIGHT};
use crate::error::{ConversionError, LayoutOverflow};
use crate::palette::BitDepth;
use crate::tile::MAX_TILES;
use crate::tilemap::{TilemapEntry, TilesetImage};

/// Size of the splash area of the internal EEPROM
pub const SPLASH_SIZE: usize = 1920;
/// Bytes of header a template must provide, up to and including the signature
pub const HEADER_SIZE: usize = 0x22;
/// Splashes up to this size fit the small splash slot
const SMALL_SPLASH_SIZE: usize = 0x380;
/// Largest tilemap width or height in tiles
const MAX_MAP_DIMENSION: usize = 32;
/// Display refresh rate
const FRAMES_PER_SECOND: f64 = 75.47;
const MIN_END_FRAME: u8 = 0x80;
const MAX_END_FRAME: u8 = 0xF0;
/// Screen map address in RAM and its row width in tiles
const SCREEN_MAP_BASE: i32 = 0x800;
const SCREEN_MAP_WIDTH: i32 = 32;
/// Last screen map column when held vertically
const VERTICAL_ROW_BASE: i32 = 27;
/// Name coordinates are stored relative to the top-left of the text
const NAME_CENTER_OFFSET: i32 = 4;
/// Marker of splashes built from the BootFriend template
pub const SIGNATURE: [u8; 2] = *b"bF";
const PALETTE_FLAG_2BPP: u8 = 0x80;
/// Tile RAM available to splash tiles, in bytes
const MAX_TILE_RAM: usize = 0x760;

/// Frame on which the splash ends
pub fn end_frame(seconds: f64) -> u8 {
    let frames = (seconds * FRAMES_PER_SECOND).round();
    if frames.is_nan() {
        warn!("Invalid splash duration {seconds}, using the shortest one");
        return MIN_END_FRAME;
    }
    frames.clamp(MIN_END_FRAME as f64, MAX_END_FRAME as f64) as u8
}

/// Screen map addresses of the image's top-left tile, horizontal then vertical
fn screen_destinations(image: &Placement) -> (u16, u16) {
    let (h, v) = (image.horizontal, image.vertical);
    let horizontal = 2 * (h.x + h.y * SCREEN_MAP_WIDTH) + SCREEN_MAP_BASE;
    let vertical = 2 * ((VERTICAL_ROW_BASE - v.y) + v.x * SCREEN_MAP_WIDTH) + SCREEN_MAP_BASE;
    (horizontal as u16, vertical as u16)
}

/// Check everything that could make the blob invalid, returning its used size
fn validate(image: &TilesetImage, template: &[u8]) -> Result<usize, ConversionError> {
    if template.len() < HEADER_SIZE || template.len() > SPLASH_SIZE {
        return Err(ConversionError::Template(format!(
            "size {} is outside {HEADER_SIZE}..={SPLASH_SIZE} bytes",
            template.len()
        )));
    }
    if image.tile_count > MAX_TILES {
        return Err(ConversionError::TileOverflow(image.tile_count));
    }
    let dimensions = 1..=MAX_MAP_DIMENSION;
    if !dimensions.contains(&image.width) || !dimensions.contains(&image.height) {
        return Err(LayoutOverflow::TilemapSize(image.width, image.height).into());
    }
    if image.palette.len() < 2 {
        return Err(ConversionError::Corrupt("empty palette section".to_string()));
    }
    let total = template.len() + image.data_size();
    if total > SPLASH_SIZE {
        return Err(LayoutOverflow::SplashTooLarge(total).into());
    }
    Ok(total)
}

/// Build the splash blob for `image`, or for a blank splash if there is none
pub fn serialize(
    image: Option<&TilesetImage>,
    template: &[u8],
    layout: &Layout,
) -> Result<[u8; SPLASH_SIZE], ConversionError> {
    let empty = TilesetImage::empty();
    let tileset = image.unwrap_or(&empty);
    let total = validate(tileset, template)?;

    let mut header = SplashHeader::read(&mut Cursor::new(template))?;
    let mut data = [0u8; SPLASH_SIZE];
    data[..template.len()].copy_from_slice(template);

    let names = layout.name_placement();
    header.name_color = layout.name_color;
    header.end_frame = end_frame(layout.duration);
    header.name_horizontal = [
        (names.horizontal.y - NAME_CENTER_OFFSET) as u8,
        (names.horizontal.x - NAME_CENTER_OFFSET) as u8,
    ];
    header.name_vertical = [
        (names.vertical.x - NAME_CENTER_OFFSET) as u8,
        (SCREEN_HEIGHT - names.vertical.y - NAME_CENTER_OFFSET) as u8,
    ];

    let bpp_flag = match tileset.bpp {
        BitDepth::One => 0,
        BitDepth::Two => PALETTE_FLAG_2BPP,
    };
    header.palette_flags = bpp_flag | tileset.palette_count as u8;
    header.tile_count = tileset.tile_count as u8;
    header.map_width = tileset.width as u8;
    header.map_height = tileset.height as u8;

    let mut idx = template.len();
    header.palette_offset = idx as u16;
    data[idx..idx + tileset.palette.len()].copy_from_slice(&tileset.palette);
    data[idx..idx + 2].copy_from_slice(&layout.background_color.to_le_bytes());
    idx += tileset.palette.len();

    header.tile_offset = idx as u16;
    data[idx..idx + tileset.tiles.len()].copy_from_slice(&tileset.tiles);
    idx += tileset.tiles.len();

    let map = tileset.map_bytes();
    header.map_offset = idx as u16;
    data[idx..idx + map.len()].copy_from_slice(&map);

    let (horizontal, vertical) = screen_destinations(&layout.image_placement(image));
    header.screen_dest_horizontal = horizontal;
    header.screen_dest_vertical = vertical;

    if total <= SMALL_SPLASH_SIZE {
        header.size = 0;
    }
    header.write(&mut Cursor::new(&mut data[..HEADER_SIZE]))?;

    debug!("splash uses {total} of {SPLASH_SIZE} bytes");
    Ok(data)
}

/// Header fields of a splash blob, as stored at the start of the template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[binrw::binrw]
#[brw(little)]
pub struct SplashHeader {
    #[serde(skip)]
    pub prefix: [u8; 3],
    pub options: u8,
    pub name_color: u8,
    #[serde(skip)]
    pub reserved: u8,
    pub size: u8,
    pub start_frame: u8,
    pub end_frame: u8,
    pub sprite_count: u8,
    pub palette_flags: u8,
    pub tile_count: u8,
    pub palette_offset: u16,
    pub tile_offset: u16,
    pub map_offset: u16,
    pub screen_dest_horizontal: u16,
    pub screen_dest_vertical: u16,
    pub map_width: u8,
    pub map_height: u8,
    pub vblank_code_offset: u16,
    pub vblank_code_segment: u16,
    pub name_horizontal: [u8; 2],
    pub name_vertical: [u8; 2],
    pub signature: [u8; 2],
}

impl SplashHeader {
    pub fn parse(data: &[u8]) -> Result<Self, ConversionError> {
        if data.len() < HEADER_SIZE {
            return Err(ConversionError::Corrupt(format!(
                "{} bytes is too short for a splash header",
                data.len()
            )));
        }
        Ok(Self::read(&mut Cursor::new(data))?)
    }

    /// Heuristics the boot firmware uses to detect a usable splash
    pub fn is_valid(&self) -> bool {
        let vblank_address = (((self.vblank_code_segment as u32) << 4)
            + self.vblank_code_offset as u32)
            & 0xFFFFF;
        self.size < 2
            && self.start_frame <= self.end_frame
            && self.sprite_count <= 128
            && (self.tile_count as usize) <= MAX_TILE_RAM / 8
            && vblank_address >= SCREEN_MAP_BASE as u32
    }

    pub fn is_bootfriend(&self) -> bool {
        self.signature == SIGNATURE
    }

    pub fn bpp(&self) -> BitDepth {
        if self.palette_flags & PALETTE_FLAG_2BPP != 0 {
            BitDepth::Two
        } else {
            BitDepth::One
        }
    }

    pub fn palette_count(&self) -> usize {
        (self.palette_flags & !PALETTE_FLAG_2BPP) as usize
    }

    /// Seconds until the splash ends
    pub fn duration(&self) -> f64 {
        self.end_frame as f64 / FRAMES_PER_SECOND
    }

    /// Console name centers, as given in a [`Layout`]
    pub fn name_placement(&self) -> Placement {
        let [hy, hx] = self.name_horizontal;
        let [vx, vy] = self.name_vertical;
        Placement {
            horizontal: Point::new(
                hx as i32 + NAME_CENTER_OFFSET,
                hy as i32 + NAME_CENTER_OFFSET,
            ),
            vertical: Point::new(
                vx as i32 + NAME_CENTER_OFFSET,
                SCREEN_HEIGHT - NAME_CENTER_OFFSET - vy as i32,
            ),
        }
    }

    /// Image location in tiles, recovered from the screen map addresses.
    /// Only locations on the visible screen survive the round trip.
    pub fn image_placement(&self) -> Placement {
        let cell = |dest: u16| (dest as i32 - SCREEN_MAP_BASE) / 2;
        let h = cell(self.screen_dest_horizontal);
        let v = cell(self.screen_dest_vertical);
        Placement {
            horizontal: Point::new(
                h.rem_euclid(SCREEN_MAP_WIDTH),
                h.div_euclid(SCREEN_MAP_WIDTH),
            ),
            vertical: Point::new(
                v.div_euclid(SCREEN_MAP_WIDTH),
                VERTICAL_ROW_BASE - v.rem_euclid(SCREEN_MAP_WIDTH),
            ),
        }
    }
}

/// Read the header and the tileset back out of a splash blob
pub fn parse(data: &[u8]) -> Result<(SplashHeader, TilesetImage), ConversionError> {
    let header = SplashHeader::parse(data)?;
    let bpp = header.bpp();
    let (width, height) = (header.map_width as usize, header.map_height as usize);

    let section = |name: &str, start: u16, len: usize| {
        let start = start as usize;
        data.get(start..start + len).ok_or_else(|| {
            ConversionError::Corrupt(format!(
                "{name} section {start:#x}+{len} is past the end of the data"
            ))
        })
    };
    let palette = section(
        "palette",
        header.palette_offset,
        header.palette_count() * bpp.palette_size(),
    )?;
    let tiles = section(
        "tile",
        header.tile_offset,
        header.tile_count as usize * bpp.tile_size(),
    )?;
    let map = section("tilemap", header.map_offset, width * height * 2)?;

    let tileset = TilesetImage {
        bpp,
        tiles: tiles.to_vec(),
        map: map
            .chunks_exact(2)
            .map(|w| TilemapEntry::from(u16::from_le_bytes([w[0], w[1]])))
            .collect(),
        palette: palette.to_vec(),
        tile_count: header.tile_count as usize,
        palette_count: header.palette_count(),
        width,
        height,
    };
    Ok((header, tileset))
}

/// Background color stored in the first palette entry
pub fn background_color(tileset: &TilesetImage) -> HardwareColor {
    match tileset.palette.get(0..2) {
        Some(&[lo, hi]) => HardwareColor::from_le_bytes([lo, hi]),
        _ => HardwareColor::BLACK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Alignment;
    use crate::decode::render;
    use crate::tilemap::tests::{encoder, unique_tiles_image, WHITE};
    use image::RgbaImage;

    fn template() -> Vec<u8> {
        let header = SplashHeader {
            prefix: [0xEA, 0x12, 0x34],
            size: 1,
            // vblank handler at 0080:0000
            vblank_code_segment: 0x80,
            signature: SIGNATURE,
            ..SplashHeader::default()
        };
        let mut template = vec![0u8; 0x36];
        header.write(&mut Cursor::new(&mut template[..])).unwrap();
        template
    }

    fn tileset(bpp: BitDepth, tile_count: usize, width: usize, height: usize) -> TilesetImage {
        TilesetImage {
            bpp,
            tiles: vec![0x5A; tile_count * bpp.tile_size()],
            map: vec![TilemapEntry::from(46 | (1 << 9)); width * height],
            palette: vec![0; 2 * bpp.palette_size()],
            tile_count,
            palette_count: 2,
            width,
            height,
        }
    }

    #[test]
    fn blank_splash() {
        let layout = Layout {
            background_color: HardwareColor::BLACK,
            name_color: 3,
            ..Layout::default()
        };
        let data = serialize(None, &template(), &layout).unwrap();

        assert_eq!(data[0x36..0x44], [
            0x00, 0x00, 0xFF, 0x0F, // palette
            0, 0, 0, 0, 0, 0, 0, 0, // blank tile
            0x00, 0x00, // map
        ]);
        assert_eq!(data[0x04], 3);
        assert_eq!(data[0x06], 0);
        assert_eq!(data[0x08], 151);
        assert_eq!(data[0x0A..0x0C], [0x01, 0x01]);
        assert_eq!(data[0x0C..0x12], [0x36, 0x00, 0x3A, 0x00, 0x42, 0x00]);
        assert_eq!(data[0x12..0x16], [0xFE, 0x0F, 0xB8, 0x0F]);
        assert_eq!(data[0x16..0x18], [1, 1]);
        assert_eq!(data[0x1C..0x20], [156, 108, 68, 236]);
        assert_eq!(data[0x20..0x22], *b"bF");
        assert_eq!(data[0x00..0x03], [0xEA, 0x12, 0x34]);
        assert!(data[0x44..].iter().all(|&b| b == 0));
    }

    #[test]
    fn header_field_offsets() {
        let header = SplashHeader {
            prefix: [0x01, 0x02, 0x03],
            options: 0x04,
            name_color: 0x05,
            reserved: 0x06,
            size: 0x07,
            start_frame: 0x08,
            end_frame: 0x09,
            sprite_count: 0x0A,
            palette_flags: 0x0B,
            tile_count: 0x0C,
            palette_offset: 0x0E0D,
            tile_offset: 0x100F,
            map_offset: 0x1211,
            screen_dest_horizontal: 0x1413,
            screen_dest_vertical: 0x1615,
            map_width: 0x17,
            map_height: 0x18,
            vblank_code_offset: 0x1A19,
            vblank_code_segment: 0x1C1B,
            name_horizontal: [0x1D, 0x1E],
            name_vertical: [0x1F, 0x20],
            signature: [0x21, 0x22],
        };
        let mut data = vec![0u8; HEADER_SIZE];
        header.write(&mut Cursor::new(&mut data[..])).unwrap();

        assert_eq!(data, (0x01..=0x22).collect::<Vec<u8>>());
        assert_eq!(SplashHeader::parse(&data).unwrap(), header);
    }

    #[test]
    fn white_background_palette() {
        let img = RgbaImage::from_pixel(8, 8, WHITE);
        let tileset = encoder().encode(&img).unwrap();
        let data = serialize(Some(&tileset), &template(), &Layout::default()).unwrap();
        assert_eq!(data[0x36..0x38], [0xFF, 0x0F]);
    }

    #[test]
    fn end_frame_is_clamped() {
        assert_eq!(end_frame(0.1), 0x80);
        assert_eq!(end_frame(2.0), 151);
        assert_eq!(end_frame(100.0), 0xF0);
        assert_eq!(end_frame(f64::NAN), 0x80);
    }

    #[test]
    fn large_splash_keeps_size_flag() {
        let data = serialize(
            Some(&tileset(BitDepth::Two, 50, 10, 10)),
            &template(),
            &Layout::default(),
        )
        .unwrap();
        assert_eq!(data[0x06], 1);
        assert_eq!(data[0x0A], 0x82);
        assert_eq!(data[0x0B], 50);
    }

    #[test]
    fn rejects_overflowing_layouts() {
        let layout = Layout::default();
        let err = |image: TilesetImage| {
            serialize(Some(&image), &template(), &layout).unwrap_err()
        };

        assert!(matches!(
            err(tileset(BitDepth::One, 193, 1, 1)),
            ConversionError::TileOverflow(193)
        ));
        assert!(matches!(
            err(tileset(BitDepth::One, 1, 33, 1)),
            ConversionError::LayoutOverflow(LayoutOverflow::TilemapSize(33, 1))
        ));
        assert!(matches!(
            err(tileset(BitDepth::One, 1, 0, 4)),
            ConversionError::LayoutOverflow(LayoutOverflow::TilemapSize(0, 4))
        ));
        // 0x36 + 16 + 110 * 16 + 2 * 32 * 4 > 1920
        assert!(matches!(
            err(tileset(BitDepth::Two, 110, 32, 4)),
            ConversionError::LayoutOverflow(LayoutOverflow::SplashTooLarge(2086))
        ));

        assert!(matches!(
            serialize(None, &[0u8; 0x10], &layout),
            Err(ConversionError::Template(_))
        ));
        assert!(matches!(
            serialize(None, &[0u8; SPLASH_SIZE + 1], &layout),
            Err(ConversionError::Template(_))
        ));
    }

    #[test]
    fn parses_serialized_splash() {
        let layout = Layout {
            background_color: HardwareColor::new(0x123),
            image_alignment: Alignment::Center,
            duration: 3.0,
            ..Layout::default()
        };
        let tileset = encoder().encode(&unique_tiles_image(2)).unwrap();
        let data = serialize(Some(&tileset), &template(), &layout).unwrap();

        let (header, parsed) = parse(&data).unwrap();
        assert!(header.is_valid());
        assert!(header.is_bootfriend());
        assert_eq!(header.bpp(), BitDepth::One);
        assert_eq!(header.end_frame, 226);
        assert_eq!(parsed.map, tileset.map);
        assert_eq!(parsed.tiles, tileset.tiles);
        assert_eq!(parsed.palette[2..], tileset.palette[2..]);
        assert_eq!(background_color(&parsed), HardwareColor::new(0x123));
        assert_eq!(render(&parsed).unwrap(), render(&tileset).unwrap());

        let placement = header.image_placement();
        assert_eq!(placement, layout.image_placement(Some(&tileset)));
        assert_eq!(placement.horizontal, Point::new(13, 8));
        assert_eq!(placement.vertical, Point::new(8, 13));
        assert_eq!(header.name_placement(), layout.name_placement());
    }

    #[test]
    fn header_heuristics() {
        let data = serialize(None, &template(), &Layout::default()).unwrap();
        let header = SplashHeader::parse(&data).unwrap();
        assert!(header.is_valid());

        let invalid = [
            SplashHeader { size: 2, ..header.clone() },
            SplashHeader { start_frame: 0xF1, ..header.clone() },
            SplashHeader { sprite_count: 129, ..header.clone() },
            SplashHeader { tile_count: 0xED, ..header.clone() },
            SplashHeader { vblank_code_segment: 0x7F, ..header.clone() },
        ];
        for header in invalid.iter() {
            assert!(!header.is_valid(), "{header:?}");
        }
        assert!(!SplashHeader { signature: [0, 0], ..header }.is_bootfriend());
    }

    #[test]
    fn rejects_truncated_sections() {
        let data = serialize(None, &template(), &Layout::default()).unwrap();
        assert!(matches!(
            parse(&data[..0x40]),
            Err(ConversionError::Corrupt(_))
        ));
        assert!(matches!(parse(&data[..0x10]), Err(ConversionError::Corrupt(_))));
    }
}
