//! Command-line parsing for the metric publisher.
//!
//! Argument parsing and command dispatch stay separate from the
//! fitting/adapter code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::fit::DEFAULT_INITIAL_STD;
use crate::io::{REFERENCE_FOOTER_LINES, REFERENCE_HEADER_LINES};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "oscmon", version, about = "Laser-diagnostic metric publisher")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the configured instruments and publish metric records.
    Run(RunArgs),
    /// Calibrate against a stored reference spectrum and print the baseline.
    Reference(ReferenceArgs),
    /// Fit one stored spectrum file and print the resulting record.
    Fit(FitArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Path to the TOML configuration file.
    #[arg(short = 'c', long, default_value = "oscmon.toml")]
    pub config: PathBuf,

    /// Stop after N polling cycles (default: run until interrupted).
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Use simulated instruments instead of the configured endpoints.
    #[arg(long)]
    pub simulate: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct ReferenceArgs {
    /// Stored reference spectrum (two-column text format).
    #[arg(long)]
    pub path: PathBuf,

    /// Integration time the reference was recorded with, µs.
    #[arg(long = "integration-time-us")]
    pub integration_time_us: f64,

    /// Width seed for the fit's initial guess, cm⁻¹.
    #[arg(long = "std0", default_value_t = DEFAULT_INITIAL_STD)]
    pub std0: f64,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Spectrum file (two-column text format).
    #[arg(long)]
    pub path: PathBuf,

    /// Normalize intensities by this integration time, µs.
    #[arg(long = "integration-time-us")]
    pub integration_time_us: Option<f64>,

    /// Width seed for the fit's initial guess, cm⁻¹.
    #[arg(long = "std0", default_value_t = DEFAULT_INITIAL_STD)]
    pub std0: f64,

    /// Header lines to skip before the numeric table.
    #[arg(long, default_value_t = REFERENCE_HEADER_LINES)]
    pub skip_header: usize,

    /// Footer lines to skip after the numeric table.
    #[arg(long, default_value_t = REFERENCE_FOOTER_LINES)]
    pub skip_footer: usize,

    /// Print the fit as JSON instead of the aligned table.
    #[arg(long)]
    pub json: bool,
}
