use splashconv::cli::{decode, encode, wwcode};
use std::process::ExitCode;

#[derive(clap::Parser)]
#[command(version, about)]
struct Args {
    /// Show extra debugging info
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Builds a boot splash from a PNG image
    Encode(encode::Args),
    /// Renders an existing boot splash to PNG
    Decode(decode::Args),
    /// Applies the WonderWitch transfer encoding to a file
    Wwcode(wwcode::Args),
}

fn main() -> ExitCode {
    let args: Args = clap::Parser::parse();

    let level = match args.verbose {
        true => log::LevelFilter::Debug,
        false => log::LevelFilter::Info,
    };
    pretty_env_logger::formatted_builder()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .init();

    let res = match args.command {
        Commands::Encode(args) => encode::encode(args),
        Commands::Decode(args) => decode::decode(args),
        Commands::Wwcode(args) => wwcode::wwcode(args),
    };
    match res {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
