//! # CNC Host
//!
//! Command-line front end for the motion core. It loads a machine
//! configuration, builds a simulated machine, and streams a toolpath record
//! file through the motion controller, either executing it (`batch`) or
//! validating it in check mode (`check`).
//!
//! The record format is a thin testing vehicle, one command per line
//! (`line X10 Y5 F600`, `arc X0 Y10 I-10 J0 ccw`, `dwell P500`, `home`,
//! `probe Z-5`, `pause`); it is not a G-code dialect and no parser beyond
//! it lives here.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod batch;
mod config;
mod toolpath;

/// Host-side driver for the CNC motion core.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process a toolpath file against the simulated machine.
    Batch(batch::BatchArgs),
    /// Validate a toolpath file in check mode without executing anything.
    Check(batch::BatchArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Batch(args) => batch::run(args, false),
        Commands::Check(args) => batch::run(args, true),
    }
}
