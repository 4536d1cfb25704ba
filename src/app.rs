//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and configures logging
//! - parses CLI arguments
//! - dispatches `fit`, `synth` and `inspect`

use clap::Parser;
use log::{info, warn};

use crate::cli::{Cli, Command, FitArgs, InspectArgs, MapArgs, SynthArgs};
use crate::data::{PhantomConfig, generate_phantom};
use crate::domain::{FitConfig, MapKey, ModelKind, OutputPaths};
use crate::error::AppError;
use crate::io::{b_values_for, read_vector_volume, write_scalar_volume, write_vector_volume};
use crate::report::{format_run_summary, format_volume_info};

pub mod pipeline;

/// Environment fallback for `--threads`.
pub const THREADS_ENV: &str = "DWFIT_THREADS";

/// Entry point for the `dwfit` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    // `dwfit -i dwi.nii.gz ...` is shorthand for `dwfit fit -i dwi.nii.gz ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Synth(args) => handle_synth(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    // A logger may already be installed when embedded in tests.
    let _ = env_logger::Builder::from_env(env).format_timestamp(None).try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;
    println!("{}", format_run_summary(&run.summary));
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let dims = match args.size.as_slice() {
        &[nx, ny, nz] => [nx, ny, nz],
        other => {
            return Err(AppError::config(format!(
                "--size needs three values (nx,ny,nz), got {}.",
                other.len()
            )));
        }
    };
    let config = PhantomConfig {
        model: ModelKind::from_name(&args.model)?,
        params: args.params.clone(),
        b_values: args.b_values.clone(),
        dims,
        noise_sigma: args.noise,
        seed: args.seed,
    };
    let phantom = generate_phantom(&config)?;
    write_vector_volume(&args.output, &phantom.volume)?;
    info!(
        "Wrote {} phantom ({} x {} x {}, {} b-values) to {}",
        config.model,
        dims[0],
        dims[1],
        dims[2],
        config.b_values.len(),
        args.output.display()
    );
    if let Some(path) = &args.mask_output {
        write_scalar_volume(path, &phantom.mask)?;
        info!("Wrote phantom mask to {}", path.display());
    }
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<(), AppError> {
    let volume = read_vector_volume(&args.input)?;
    let b_values = match b_values_for(&volume) {
        Ok(b) => Some(b),
        Err(err) => {
            warn!("{err}");
            None
        }
    };
    println!("{}", format_volume_info(&args.input, &volume, b_values.as_deref()));
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        input: args.input.clone(),
        mask: args.mask.clone(),
        model_name: args.model.clone(),
        initial_parameters: (!args.init.is_empty()).then(|| args.init.clone()),
        include_b_values: args.include_b.clone(),
        exclude_b_values: args.exclude_b.clone(),
        outputs: output_paths_from_args(&args.maps),
        threads: args.threads.or_else(threads_from_env).unwrap_or(0),
        seed_scale_from_signal: !args.no_scale_seed,
        summary: args.summary.clone(),
    }
}

fn output_paths_from_args(maps: &MapArgs) -> OutputPaths {
    let requested = [
        (MapKey::Scale, &maps.scale_map),
        (MapKey::Adc, &maps.adc_map),
        (MapKey::FastFraction, &maps.fast_fraction_map),
        (MapKey::SlowDiffusion, &maps.slow_diff_map),
        (MapKey::FastDiffusion, &maps.fast_diff_map),
        (MapKey::Kurtosis, &maps.kurtosis_map),
        (MapKey::KurtosisDiffusion, &maps.kurtosis_diff_map),
        (MapKey::Ddc, &maps.ddc_map),
        (MapKey::Alpha, &maps.alpha_map),
        (MapKey::GammaK, &maps.k_map),
        (MapKey::GammaTheta, &maps.theta_map),
        (MapKey::GammaMode, &maps.mode_map),
    ];
    OutputPaths {
        parameter_maps: requested
            .into_iter()
            .filter_map(|(key, path)| path.clone().map(|p| (key, p)))
            .collect(),
        r_squared: maps.rsqr_map.clone(),
        fitted_volume: maps.fitted_volume.clone(),
    }
}

fn threads_from_env() -> Option<usize> {
    let raw = std::env::var(THREADS_ENV).ok()?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Ignoring {THREADS_ENV}={raw:?} (not a thread count).");
            None
        }
    }
}

/// Rewrite argv so bare flags default to the `fit` subcommand.
///
/// Rules:
/// - `dwfit -i x.nii.gz ...`        -> `dwfit fit -i x.nii.gz ...`
/// - `dwfit --help/--version/-h`  -> unchanged (show top-level help/version)
/// - anything else                -> unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1) else {
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version");
    if !is_top_level_help_or_version && arg1.starts_with('-') {
        argv.insert(1, "fit".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_flags_default_to_fit() {
        assert_eq!(
            rewrite_args(args(&["dwfit", "-i", "x.nii.gz"])),
            args(&["dwfit", "fit", "-i", "x.nii.gz"])
        );
        assert_eq!(rewrite_args(args(&["dwfit", "--help"])), args(&["dwfit", "--help"]));
        assert_eq!(rewrite_args(args(&["dwfit", "inspect", "x"])), args(&["dwfit", "inspect", "x"]));
        assert_eq!(rewrite_args(args(&["dwfit"])), args(&["dwfit"]));
    }

    #[test]
    fn fit_args_map_to_config() {
        let cli = Cli::parse_from([
            "dwfit",
            "fit",
            "-i",
            "dwi.nii.gz",
            "--model",
            "gamma",
            "--k-map",
            "k.nii.gz",
            "--mode-map",
            "mode.nii.gz",
            "--no-scale-seed",
            "--threads",
            "3",
        ]);
        let Command::Fit(fit) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&fit);
        assert_eq!(config.model_name, "gamma");
        assert_eq!(config.initial_parameters, None);
        assert!(!config.seed_scale_from_signal);
        assert_eq!(config.threads, 3);
        assert_eq!(config.outputs.parameter_maps.len(), 2);
        assert_eq!(
            config.outputs.parameter_maps.get(&MapKey::GammaMode),
            Some(&PathBuf::from("mode.nii.gz"))
        );
        assert!(config.outputs.r_squared.is_none());
    }
}
