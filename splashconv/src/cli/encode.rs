use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use log::{info, warn};

use crate::color::HardwareColor;
use crate::config::{Alignment, Layout, Orientation};
use crate::error::ConversionError;
use crate::metrics::QualityMetrics;
use crate::rom::{self, OutputFormat, SplashKind, Timestamp};
use crate::tilemap::TilesetImage;
use crate::{decode, export, splash};

#[derive(clap::Args)]
pub struct Args {
    /// PNG image to show, a blank splash is built if omitted
    input: Option<PathBuf>,
    /// Output file
    #[arg(short, long)]
    output: PathBuf,
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Raw)]
    format: OutputFormat,
    /// Splash template binary placed before the image data
    #[arg(short, long, required_unless_present = "custom_eeprom")]
    template: Option<PathBuf>,
    /// Installer ROM, needed for `rom` and `wwsoft` output
    #[arg(long)]
    installer: Option<PathBuf>,
    /// Install an existing EEPROM image instead of building a splash
    #[arg(long, conflicts_with = "input")]
    custom_eeprom: Option<PathBuf>,
    /// JSON layout file
    #[arg(short, long)]
    layout: Option<PathBuf>,
    /// Background color, `#rgb` or `#rrggbb`
    #[arg(long)]
    background: Option<HardwareColor>,
    /// Console name color index
    #[arg(long)]
    name_color: Option<u8>,
    /// Seconds the splash is shown
    #[arg(long)]
    duration: Option<f64>,
    /// Image alignment on the screen
    #[arg(long, value_enum)]
    align: Option<Alignment>,
    /// Compensate colors for the LCD before quantizing
    #[arg(long, default_value_t = false)]
    inverse_color_correction: bool,
    /// Write a preview of the screen as PNG
    #[arg(long)]
    preview: Option<PathBuf>,
    /// Orientation of the preview
    #[arg(long, value_enum, default_value_t = Orientation::Horizontal)]
    orientation: Orientation,
    /// Emulate the LCD colors in the preview
    #[arg(long, default_value_t = false)]
    lcd: bool,
    /// Dump the converted tileset as JSON
    #[arg(long)]
    dump_json: Option<PathBuf>,
    /// Dump palette, tile and tilemap hex files into this directory
    #[arg(long)]
    dump_hex: Option<PathBuf>,
}

impl Args {
    fn layout(&self) -> Result<Layout, ConversionError> {
        let mut layout = match &self.layout {
            Some(path) => Layout::load(path)?,
            None => Layout::default(),
        };
        if let Some(background) = self.background {
            layout.background_color = background;
        }
        if let Some(name_color) = self.name_color {
            layout.name_color = name_color;
        }
        if let Some(duration) = self.duration {
            layout.duration = duration;
        }
        if let Some(align) = self.align {
            layout.image_alignment = align;
        }
        layout.inverse_color_correction |= self.inverse_color_correction;
        Ok(layout)
    }
}

fn convert_image(path: &Path, layout: &Layout) -> Result<TilesetImage, ConversionError> {
    let img: RgbaImage = image::open(path)?.to_rgba8();
    if img.pixels().any(|p| p[3] != 255) {
        warn!("{} has transparent pixels, alpha is ignored", path.display());
    }

    let tileset = crate::encode(
        &img,
        layout.background_color,
        layout.inverse_color_correction,
    )?;
    info!(
        "{}x{} tiles, {} unique, {} palette slots, {} bpp",
        tileset.width,
        tileset.height,
        tileset.tile_count,
        tileset.palette_count,
        tileset.bpp.bits()
    );

    QualityMetrics::compare(&img, &decode::render(&tileset)?).log();
    Ok(tileset)
}

fn write_preview(args: &Args, splash_data: &[u8]) -> Result<(), ConversionError> {
    let Some(path) = &args.preview else {
        return Ok(());
    };
    let (header, tileset) = splash::parse(splash_data)?;
    let location = header.image_placement().get(args.orientation);
    let preview = decode::compose_preview(
        Some(&tileset),
        splash::background_color(&tileset),
        location,
        args.orientation,
        args.lcd,
    )?;
    preview.save(path)?;
    info!("wrote preview to {}", path.display());
    Ok(())
}

pub fn encode(args: Args) -> Result<(), ConversionError> {
    let (splash_data, kind) = match &args.custom_eeprom {
        Some(path) => {
            let eeprom = fs::read(path)?;
            let data = rom::custom_eeprom_splash(&eeprom)?.to_vec();
            (data, SplashKind::CustomEeprom)
        }
        None => {
            let layout = args.layout()?;
            let tileset = args
                .input
                .as_ref()
                .map(|path| convert_image(path, &layout))
                .transpose()?;
            if let Some(tileset) = &tileset {
                if let Some(path) = &args.dump_json {
                    export::write_json(tileset, path)?;
                }
                if let Some(dir) = &args.dump_hex {
                    export::write_hex_files(tileset, dir)?;
                }
            }

            let template_path = args.template.as_ref().ok_or_else(|| {
                ConversionError::Template("no template file given".to_string())
            })?;
            let template = fs::read(template_path)?;
            let data = splash::serialize(tileset.as_ref(), &template, &layout)?;
            (data.to_vec(), SplashKind::BootFriend)
        }
    };

    write_preview(&args, &splash_data)?;

    let installer = args.installer.as_ref().map(fs::read).transpose()?;
    let output = rom::generate(
        args.format,
        &splash_data,
        kind,
        installer.as_deref(),
        &Timestamp::now(),
    )?;
    fs::write(&args.output, &output)?;
    info!(
        "wrote {} bytes of {:?} output to {}",
        output.len(),
        args.format,
        args.output.display()
    );
    Ok(())
}
