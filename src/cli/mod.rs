//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use indicatif::ProgressBar;

use crate::config::{OUTPUT_DIR, VARIABLE};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Downloads ERA5 hourly data for the Nome quad, 1979 to 2018, in four chunks
pub struct Cli {
    /// ERA5 variable to retrieve
    #[arg(long, default_value = VARIABLE)]
    pub variable: String,

    /// Directory the NetCDF files are written to
    #[arg(long, default_value = OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Chunks retrieved at once [default: number of CPUs]
    #[arg(long)]
    pub workers: Option<usize>,

    /// Print the requests as JSON instead of sending them
    #[arg(long)]
    pub dry_run: bool,
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

// -- Tests -------------------------------------------------------------------
