//! Command-line parsing for the diffusion decay fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dwfit", version, about = "Voxel-wise diffusion signal decay model fitting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a decay model at every voxel of a multi-b-value volume and write parameter maps.
    Fit(FitArgs),
    /// Write a synthetic ellipsoid phantom with known parameters.
    Synth(SynthArgs),
    /// Print the grid, geometry and b-values of a volume.
    Inspect(InspectArgs),
}

/// Options for `fit`.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Multi-b-value 4-D input volume (NIfTI, channel as the fourth axis) with a `.json` metadata sidecar.
    #[arg(short = 'i', long, value_name = "NIFTI")]
    pub input: PathBuf,

    /// Voxel mask; nonzero voxels are fitted. Defaults to all voxels.
    #[arg(short = 'm', long, value_name = "NIFTI")]
    pub mask: Option<PathBuf>,

    /// Decay model: MonoExponential, BiExponential, Kurtosis, StretchedExponential or Gamma.
    #[arg(long, default_value = "MonoExponential")]
    pub model: String,

    /// Initial parameter vector (comma-separated, rates in mm²/s).
    #[arg(long = "init", value_delimiter = ',', allow_hyphen_values = true)]
    pub init: Vec<f64>,

    /// Only fit channels with these b-values.
    #[arg(long = "include-b", value_delimiter = ',')]
    pub include_b: Vec<f64>,

    /// Fit all channels except those with these b-values.
    #[arg(long = "exclude-b", value_delimiter = ',')]
    pub exclude_b: Vec<f64>,

    #[command(flatten)]
    pub maps: MapArgs,

    /// Worker threads (0 = rayon default). Falls back to `DWFIT_THREADS`.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Keep the initial scale instead of seeding it from the first acquired channel.
    #[arg(long)]
    pub no_scale_seed: bool,

    /// Write a JSON run summary.
    #[arg(long, value_name = "JSON")]
    pub summary: Option<PathBuf>,
}

/// Output paths. Maps not produced by the selected model are ignored.
#[derive(Debug, Args, Clone, Default)]
pub struct MapArgs {
    #[arg(long, value_name = "NIFTI")]
    pub scale_map: Option<PathBuf>,

    /// Mono-exponential ADC (µm²/s).
    #[arg(long, value_name = "NIFTI")]
    pub adc_map: Option<PathBuf>,

    #[arg(long, value_name = "NIFTI")]
    pub fast_fraction_map: Option<PathBuf>,

    #[arg(long, value_name = "NIFTI")]
    pub slow_diff_map: Option<PathBuf>,

    #[arg(long, value_name = "NIFTI")]
    pub fast_diff_map: Option<PathBuf>,

    #[arg(long, value_name = "NIFTI")]
    pub kurtosis_map: Option<PathBuf>,

    #[arg(long, value_name = "NIFTI")]
    pub kurtosis_diff_map: Option<PathBuf>,

    /// Stretched-exponential distributed diffusion coefficient.
    #[arg(long, value_name = "NIFTI")]
    pub ddc_map: Option<PathBuf>,

    #[arg(long, value_name = "NIFTI")]
    pub alpha_map: Option<PathBuf>,

    #[arg(long, value_name = "NIFTI")]
    pub k_map: Option<PathBuf>,

    #[arg(long, value_name = "NIFTI")]
    pub theta_map: Option<PathBuf>,

    /// Gamma distribution mode, (k - 1) * theta.
    #[arg(long, value_name = "NIFTI")]
    pub mode_map: Option<PathBuf>,

    /// Coefficient of determination per voxel.
    #[arg(long, value_name = "NIFTI")]
    pub rsqr_map: Option<PathBuf>,

    /// Model signal at every b-value (same layout as the input).
    #[arg(long, value_name = "NIFTI")]
    pub fitted_volume: Option<PathBuf>,
}

/// Options for `synth`.
#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output phantom volume.
    #[arg(short = 'o', long, value_name = "NIFTI")]
    pub output: PathBuf,

    /// Also write the foreground mask.
    #[arg(long, value_name = "NIFTI")]
    pub mask_output: Option<PathBuf>,

    #[arg(long, default_value = "MonoExponential")]
    pub model: String,

    /// Model parameters (comma-separated, rates in mm²/s).
    #[arg(long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
    pub params: Vec<f64>,

    /// Acquisition b-values (s/mm²).
    #[arg(long, value_delimiter = ',', default_values_t = [0.0, 200.0, 800.0, 2000.0])]
    pub b_values: Vec<f64>,

    /// Grid size nx,ny,nz.
    #[arg(long, value_delimiter = ',', default_values_t = [16, 16, 4])]
    pub size: Vec<usize>,

    /// Rician noise sigma (0 disables noise).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Options for `inspect`.
#[derive(Debug, Parser, Clone)]
pub struct InspectArgs {
    #[arg(value_name = "NIFTI")]
    pub input: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fit_with_lists_and_maps() {
        let cli = Cli::parse_from([
            "dwfit",
            "fit",
            "-i",
            "dwi.nii.gz",
            "--model",
            "Kurtosis",
            "--init",
            "0,1,0.0015",
            "--exclude-b",
            "0,50",
            "--kurtosis-map",
            "k.nii.gz",
            "--rsqr-map",
            "r2.nii.gz",
            "--threads",
            "2",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.model, "Kurtosis");
        assert_eq!(args.init, vec![0.0, 1.0, 0.0015]);
        assert_eq!(args.exclude_b, vec![0.0, 50.0]);
        assert!(args.include_b.is_empty());
        assert_eq!(args.maps.kurtosis_map, Some(PathBuf::from("k.nii.gz")));
        assert_eq!(args.maps.rsqr_map, Some(PathBuf::from("r2.nii.gz")));
        assert_eq!(args.threads, Some(2));
    }

    #[test]
    fn synth_defaults() {
        let cli = Cli::parse_from(["dwfit", "synth", "-o", "p.nii.gz", "--params", "1000,0.001"]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.b_values, vec![0.0, 200.0, 800.0, 2000.0]);
        assert_eq!(args.size, vec![16, 16, 4]);
        assert_eq!(args.seed, 42);
    }

    #[test]
    fn scale_seed_help_names_the_acquired_channel() {
        use clap::CommandFactory;

        let cli = Cli::command();
        let fit = cli.find_subcommand("fit").unwrap();
        let flag = fit.get_arguments().find(|a| a.get_id() == "no_scale_seed").unwrap();
        let help = flag.get_help().unwrap().to_string();
        assert!(help.contains("first acquired channel"), "{help}");
    }
}
