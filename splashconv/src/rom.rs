//! Output images: raw splash data, installer ROM, or WonderWitch transfer file

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::cipher;
use crate::error::ConversionError;
use crate::splash::SPLASH_SIZE;

/// Size of the installer cartridge ROM
pub const ROM_SIZE: usize = 131072;
/// Bytes of the ROM sent as a WonderWitch program
pub const WWSOFT_SIZE: usize = 64168;
/// Size of a full internal EEPROM dump
pub const EEPROM_SIZE: usize = 2048;
/// EEPROM bytes preceding the splash area
const EEPROM_SPLASH_OFFSET: usize = 128;

const SPLASH_MARKER: &[u8] = b"bFtMp";
const TITLE_MARKER: &[u8] = b"bootfriend-inst devel. bui";
const TITLE_LEN: usize = 28;
/// The installer's version bytes follow the title marker
const VERSION_OFFSET: usize = 26;

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Splash data only
    #[default]
    Raw,
    /// Installer cartridge ROM
    Rom,
    /// Installer encoded for WonderWitch transfer
    Wwsoft,
}

/// Where the installed splash comes from
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SplashKind {
    /// Splash generated from an image and a layout
    #[default]
    BootFriend,
    /// Splash taken from an existing EEPROM image
    CustomEeprom,
}

impl SplashKind {
    fn title_prefix(self) -> &'static [u8] {
        match self {
            SplashKind::BootFriend => b"bootfriend-inst",
            SplashKind::CustomEeprom => b"ieepsplash-inst",
        }
    }
}

/// Extract the splash area from a custom EEPROM image.
///
/// Full 2048-byte dumps lose their first 128 bytes, smaller images are taken
/// as splash data directly.
pub fn custom_eeprom_splash(data: &[u8]) -> Result<&[u8], ConversionError> {
    match data.len() {
        EEPROM_SIZE => Ok(&data[EEPROM_SPLASH_OFFSET..]),
        len if len <= SPLASH_SIZE => Ok(data),
        len => Err(ConversionError::Eeprom(len)),
    }
}

/// A UTC date and time, minute precision
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timestamp {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self::from_unix(secs as i64)
    }

    pub fn from_unix(secs: i64) -> Self {
        let days = secs.div_euclid(86400);
        let time = secs.rem_euclid(86400);

        // civil-from-days over 400-year eras, with years starting in March
        let z = days + 719468;
        let era = z.div_euclid(146097);
        let doe = z - era * 146097;
        let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = doy - (153 * mp + 2) / 5 + 1;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        let year = yoe + era * 400 + i64::from(month <= 2);

        Timestamp {
            year,
            month: month as u32,
            day: day as u32,
            hour: (time / 3600) as u32,
            minute: (time % 3600 / 60) as u32,
        }
    }
}

/// `YYMMDDhhmm`
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}{:02}{:02}{:02}{:02}",
            self.year.rem_euclid(100),
            self.month,
            self.day,
            self.hour,
            self.minute
        )
    }
}

/// Pad with spaces on alternating sides, starting on the left
fn pad_centered(mut text: Vec<u8>, len: usize) -> Vec<u8> {
    let mut right = false;
    while text.len() < len {
        if right {
            text.push(b' ');
        } else {
            text.insert(0, b' ');
        }
        right = !right;
    }
    text
}

/// Installer title shown on the cartridge menu
pub fn title(kind: SplashKind, version: [u8; 2], timestamp: &Timestamp) -> Vec<u8> {
    let mut text = kind.title_prefix().to_vec();
    text.extend_from_slice(&version);
    text.push(b' ');
    text.extend_from_slice(timestamp.to_string().as_bytes());
    pad_centered(text, TITLE_LEN)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Splice the splash and a fresh title into a copy of the installer ROM
pub fn compose_rom(
    installer: &[u8],
    splash: &[u8],
    kind: SplashKind,
    timestamp: &Timestamp,
) -> Result<Vec<u8>, ConversionError> {
    if installer.len() > ROM_SIZE {
        return Err(ConversionError::Rom(format!(
            "size {} is larger than {ROM_SIZE} bytes",
            installer.len()
        )));
    }
    let splash_index = find(installer, SPLASH_MARKER)
        .ok_or_else(|| ConversionError::Rom("splash marker not found".to_string()))?;
    let title_index = find(installer, TITLE_MARKER)
        .ok_or_else(|| ConversionError::Rom("title marker not found".to_string()))?;
    if splash_index + splash.len() > ROM_SIZE {
        return Err(ConversionError::Rom(format!(
            "splash at {splash_index:#x} does not fit"
        )));
    }
    if title_index + TITLE_LEN > ROM_SIZE {
        return Err(ConversionError::Rom(format!(
            "title at {title_index:#x} does not fit"
        )));
    }

    let mut rom = vec![0u8; ROM_SIZE];
    rom[..installer.len()].copy_from_slice(installer);
    rom[splash_index..splash_index + splash.len()].copy_from_slice(splash);

    let version_index = title_index + VERSION_OFFSET;
    let version = [rom[version_index], rom[version_index + 1]];
    let title = title(kind, version, timestamp);
    rom[title_index..title_index + title.len()].copy_from_slice(&title);

    debug!(
        "splash at {splash_index:#x}, title {:?} at {title_index:#x}",
        String::from_utf8_lossy(&title)
    );
    Ok(rom)
}

/// Produce the output image in the requested format
pub fn generate(
    format: OutputFormat,
    splash: &[u8],
    kind: SplashKind,
    installer: Option<&[u8]>,
    timestamp: &Timestamp,
) -> Result<Vec<u8>, ConversionError> {
    let compose = || -> Result<Vec<u8>, ConversionError> {
        let installer = installer.ok_or_else(|| {
            ConversionError::Rom(format!("an installer ROM is needed for {format:?} output"))
        })?;
        compose_rom(installer, splash, kind, timestamp)
    };
    match format {
        OutputFormat::Raw => Ok(splash.to_vec()),
        OutputFormat::Rom => compose(),
        OutputFormat::Wwsoft => Ok(cipher::encode(&compose()?[..WWSOFT_SIZE])),
    }
}
