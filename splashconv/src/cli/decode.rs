use std::fs;
use std::path::PathBuf;

use log::{info, warn};
use serde::Serialize;

use crate::config::Orientation;
use crate::decode::{compose_preview, render};
use crate::error::ConversionError;
use crate::splash::{self, SplashHeader};
use crate::tilemap::TilesetImage;
use crate::{export, rom};

#[derive(clap::Args)]
pub struct Args {
    /// Splash data or internal EEPROM dump
    input: PathBuf,
    /// PNG file to write
    #[arg(short, long)]
    output: PathBuf,
    /// Draw the whole screen instead of the image alone
    #[arg(short, long, default_value_t = false)]
    screen: bool,
    /// Orientation of the screen
    #[arg(long, value_enum, default_value_t = Orientation::Horizontal)]
    orientation: Orientation,
    /// Emulate the LCD colors
    #[arg(long, default_value_t = false)]
    lcd: bool,
    /// Dump the header and tileset as JSON
    #[arg(long)]
    dump_json: Option<PathBuf>,
}

#[derive(Serialize)]
struct SplashDump<'a> {
    header: &'a SplashHeader,
    tileset: &'a TilesetImage,
}

pub fn decode(args: Args) -> Result<(), ConversionError> {
    let data = fs::read(&args.input)?;
    let data = rom::custom_eeprom_splash(&data)?;
    let (header, tileset) = splash::parse(data)?;

    if !header.is_valid() {
        warn!("splash header does not look valid, the console would ignore it");
    }
    if !header.is_bootfriend() {
        warn!("splash was not built from the BootFriend template");
    }
    info!(
        "{}x{} tiles, {} unique, {} palette slots, {} bpp, shown for {:.2}s",
        tileset.width,
        tileset.height,
        tileset.tile_count,
        tileset.palette_count,
        tileset.bpp.bits(),
        header.duration()
    );

    if let Some(path) = &args.dump_json {
        export::write_json(
            &SplashDump {
                header: &header,
                tileset: &tileset,
            },
            path,
        )?;
    }

    let img = if args.screen {
        compose_preview(
            Some(&tileset),
            splash::background_color(&tileset),
            header.image_placement().get(args.orientation),
            args.orientation,
            args.lcd,
        )?
    } else {
        render(&tileset)?
    };
    img.save(&args.output)?;
    info!("wrote {}", args.output.display());
    Ok(())
}
