use std::fs;
use std::path::PathBuf;

use log::info;

use crate::cipher::{self, Direction};
use crate::error::ConversionError;

#[derive(clap::Args)]
pub struct Args {
    input: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
    /// Decode instead of encode
    #[arg(short, long, default_value_t = false)]
    decode: bool,
}

pub fn wwcode(args: Args) -> Result<(), ConversionError> {
    let data = fs::read(&args.input)?;
    let direction = match args.decode {
        true => Direction::Decode,
        false => Direction::Encode,
    };
    fs::write(&args.output, cipher::wwcode(&data, direction))?;
    info!("{direction:?}d {} bytes", data.len());
    Ok(())
}
