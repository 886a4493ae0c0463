//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads and validates configuration
//! - calibrates the reference baseline (startup-fatal on failure)
//! - wires clients, adapters, and the property sink together
//! - drives the polling loop

use std::time::Duration;

use clap::Parser;

use crate::adapter::{MillenniaMonitor, Monitor, TsunamiMonitor};
use crate::calib::Reference;
use crate::cli::{Command, FitArgs, ReferenceArgs, RunArgs};
use crate::config::Config;
use crate::domain::Spectrum;
use crate::error::AppError;
use crate::fit::FitEngine;
use crate::instrument::{HttpClient, SimMillennia, SimTsunami};
use crate::io::load_two_column;
use crate::publish::LogSink;

pub mod pipeline;

/// Request timeout for instrument HTTP calls that have no cycle-level bound
/// of their own.
const HTTP_TIMEOUT: Duration = Duration::from_secs(3);

/// Seed for the simulated instruments under `run --simulate`.
const SIMULATION_SEED: u64 = 17;

/// Entry point for the `oscmon` binary.
pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // `oscmon` and `oscmon -c node.toml` should behave like `oscmon run ...`.
    //
    // Clap requires a subcommand name, so we rewrite the argv list explicitly
    // before parsing; this keeps a clean clap structure while letting the
    // node start from a bare systemd ExecStart line.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Reference(args) => handle_reference(args),
        Command::Fit(args) => handle_fit(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = Config::load(&args.config)?;
    let mut adapters = build_adapters(&config, args.simulate)?;

    let mut sink = LogSink;
    pipeline::declare_all(&adapters, &mut sink);

    log::info!(
        "{} ({}): polling every {} s{}",
        config.device.device_name,
        config.device.device_id,
        config.device.wait,
        if args.simulate { " [simulated]" } else { "" }
    );

    pipeline::run_loop(
        &mut adapters,
        &mut sink,
        Duration::from_secs(config.device.wait),
        args.cycles,
    );
    Ok(())
}

fn build_adapters(config: &Config, simulate: bool) -> Result<Vec<Box<dyn Monitor>>, AppError> {
    let mut adapters: Vec<Box<dyn Monitor>> = Vec::new();

    if let Some(m) = &config.millennia {
        if simulate {
            let monitor = MillenniaMonitor::new("millennia", SimMillennia::new(SIMULATION_SEED), m)?;
            adapters.push(Box::new(monitor));
        } else {
            let client = HttpClient::new(&m.endpoint, Duration::from_millis(m.timeout_ms))
                .map_err(|e| AppError::runtime(e.to_string()))?;
            adapters.push(Box::new(MillenniaMonitor::new("millennia", client, m)?));
        }
    }

    if let Some(t) = &config.tsunami {
        let engine = FitEngine::new(t.initial_std);
        if simulate {
            // No reference file needed: calibrate against the simulator's
            // own noiseless line.
            let client = SimTsunami::new(SIMULATION_SEED);
            let (wavelengths, intensities) = client.clean_spectrum();
            let spectrum = Spectrum::new(wavelengths, intensities)
                .map_err(AppError::calibration)?;
            let fit = engine
                .fit(&spectrum)
                .map_err(|e| AppError::calibration(format!("Simulated reference fit: {e}")))?;
            let reference = Reference::from_fit(fit)?;
            adapters.push(Box::new(TsunamiMonitor::new("tsunami", client, engine, reference)));
        } else {
            let reference = Reference::from_file(&t.reference_path, t.reference_time_us, &engine)?;
            let client = HttpClient::new(&t.endpoint, HTTP_TIMEOUT)
                .map_err(|e| AppError::runtime(e.to_string()))?;
            adapters.push(Box::new(TsunamiMonitor::new("tsunami", client, engine, reference)));
        }
    }

    Ok(adapters)
}

fn handle_reference(args: ReferenceArgs) -> Result<(), AppError> {
    let engine = FitEngine::new(args.std0);
    let reference = Reference::from_file(&args.path, args.integration_time_us, &engine)?;
    print!("{}", crate::report::format_fit(reference.fit()));
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let (wavelengths, mut intensities) =
        load_two_column(&args.path, args.skip_header, args.skip_footer)?;

    if let Some(time_us) = args.integration_time_us {
        if !(time_us.is_finite() && time_us > 0.0) {
            return Err(AppError::config(format!(
                "Integration time must be positive, got {time_us} µs."
            )));
        }
        for y in &mut intensities {
            *y /= time_us;
        }
    }

    let spectrum = Spectrum::new(wavelengths, intensities)
        .map_err(|e| AppError::runtime(format!("'{}': {e}", args.path.display())))?;

    let engine = FitEngine::new(args.std0);
    let fit = engine
        .fit(&spectrum)
        .map_err(|e| AppError::runtime(format!("Fit failed: {e}")))?;

    if args.json {
        let json = serde_json::to_string_pretty(&fit)
            .map_err(|e| AppError::runtime(format!("JSON encoding failed: {e}")))?;
        println!("{json}");
    } else {
        print!("{}", crate::report::format_fit(&fit));
    }
    Ok(())
}

/// Rewrite argv so a bare invocation defaults to `run`.
///
/// Rules:
/// - `oscmon`                      -> `oscmon run`
/// - `oscmon -c node.toml ...`     -> `oscmon run -c node.toml ...`
/// - `oscmon --help/--version/-h`  -> unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version =
        matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "reference" | "fit");
    if is_subcommand {
        return argv;
    }

    // A leading flag means "run with these flags".
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    argv
}
