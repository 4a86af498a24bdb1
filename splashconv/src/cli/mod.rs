//! Subcommands of the command line tool

pub mod decode;
pub mod encode;
pub mod wwcode;
