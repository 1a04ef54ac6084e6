use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::batch::BatchOptions;
use crate::downsample::{DownsampleConfig, DEFAULT_SCALE};
use crate::error::Result;
use crate::reader::BackendPreference;
use crate::solver::ScratchDir;
use crate::superres::SuperResConfig;

#[derive(Parser, Debug)]
#[command(name = "bigearth-sr")]
#[command(about = "Downsample and super-resolve BigEarthNet Sentinel-2 patches")]
#[command(version)]
#[command(author = "Huimori Project")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Number of threads for per-band resampling (default: all available)
    #[arg(short, long, value_name = "N", global = true)]
    pub threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Produce low-resolution pairs from band-major .npy patches
    Downsample(DownsampleArgs),

    /// Super-resolve the 20m and 60m bands of every patch folder
    SuperResolve(SuperResolveArgs),

    /// Read the bands of the given patches and print their sizes
    CheckBands(CheckBandsArgs),
}

#[derive(ClapArgs, Debug)]
pub struct BatchArgs {
    /// Skip this many items of the sorted listing (resume an interrupted run)
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub offset: usize,

    /// Append the index of every failed item to this file
    #[arg(long, value_name = "FILE")]
    pub error_log: Option<PathBuf>,

    /// Stop at the first failed item instead of logging and continuing
    #[arg(long)]
    pub fail_fast: bool,
}

impl BatchArgs {
    fn options(&self, default_log: Option<&str>) -> BatchOptions {
        BatchOptions {
            offset: self.offset,
            error_log: self
                .error_log
                .clone()
                .or_else(|| default_log.map(PathBuf::from)),
            fail_fast: self.fail_fast,
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct DownsampleArgs {
    /// Directory of high-resolution (bands, height, width) .npy patches
    #[arg(short, long, value_name = "DIR")]
    pub input: PathBuf,

    /// Output directory for the low-resolution patches (same file names)
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Spatial scale factor applied to height and width
    #[arg(short, long, value_name = "FACTOR", default_value_t = DEFAULT_SCALE)]
    pub scale: f64,

    #[command(flatten)]
    pub batch: BatchArgs,
}

impl DownsampleArgs {
    pub fn config(&self) -> DownsampleConfig {
        DownsampleConfig {
            input_root: self.input.clone(),
            output_root: self.output.clone(),
            scale: self.scale,
            batch: self.batch.options(None),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    Auto,
    Gdal,
    Tiff,
}

impl From<BackendArg> for BackendPreference {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendPreference::Auto,
            BackendArg::Gdal => BackendPreference::Gdal,
            BackendArg::Tiff => BackendPreference::Tiff,
        }
    }
}

pub const DEFAULT_ERROR_LOG: &str = "error_log.txt";

#[derive(ClapArgs, Debug)]
pub struct SuperResolveArgs {
    /// Dataset root holding one folder per patch
    #[arg(short, long, value_name = "DIR")]
    pub input: PathBuf,

    /// Output directory for the 12-band .npy results
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// GeoTIFF reading backend
    #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
    pub backend: BackendArg,

    /// External solver program (default: bilinear resampling)
    #[arg(long, value_name = "PROGRAM")]
    pub solver: Option<String>,

    /// Extra argument passed to the solver program before the operation (repeatable)
    #[arg(long = "solver-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub solver_args: Vec<String>,

    /// Scratch directory for solver input and output files (default: a temporary one)
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    #[command(flatten)]
    pub batch: BatchArgs,
}

impl SuperResolveArgs {
    pub fn config(&self) -> SuperResConfig {
        SuperResConfig {
            output_root: self.output.clone(),
            batch: self.batch.options(Some(DEFAULT_ERROR_LOG)),
        }
    }

    pub fn solver_command(&self) -> Option<(String, Vec<String>)> {
        self.solver
            .clone()
            .map(|program| (program, self.solver_args.clone()))
    }

    pub fn scratch_dir(&self) -> Result<ScratchDir> {
        ScratchDir::new(self.work_dir.clone())
    }
}

#[derive(ClapArgs, Debug)]
pub struct CheckBandsArgs {
    /// Dataset root holding one folder per patch
    #[arg(short, long, value_name = "DIR")]
    pub input: PathBuf,

    /// GeoTIFF reading backend
    #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
    pub backend: BackendArg,

    /// Patch folder names to check
    #[arg(required = true, value_name = "PATCH")]
    pub patches: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_downsample_defaults() {
        let args = Args::parse_from(["bigearth-sr", "downsample", "-i", "HR", "-o", "LR"]);
        match args.command {
            Command::Downsample(d) => {
                let config = d.config();
                assert_eq!(config.scale, 0.5);
                assert_eq!(config.batch.offset, 0);
                assert!(config.batch.error_log.is_none());
                assert!(!config.batch.fail_fast);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_super_resolve_flags() {
        let args = Args::parse_from([
            "bigearth-sr",
            "super-resolve",
            "-i",
            "BigEarthNet-v1.0",
            "-o",
            "SRBigEarth",
            "--offset",
            "2480",
            "--backend",
            "tiff",
            "--solver",
            "python3",
            "--solver-arg",
            "dsen2.py",
            "--solver-arg",
            "--deep",
            "-v",
        ]);
        assert!(args.verbose);
        match args.command {
            Command::SuperResolve(s) => {
                assert_eq!(s.backend, BackendArg::Tiff);
                let config = s.config();
                assert_eq!(config.batch.offset, 2480);
                assert_eq!(
                    config.batch.error_log,
                    Some(PathBuf::from(DEFAULT_ERROR_LOG))
                );
                assert_eq!(
                    s.solver_command(),
                    Some((
                        "python3".to_string(),
                        vec!["dsen2.py".to_string(), "--deep".to_string()]
                    ))
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_work_dir_flag_selects_kept_scratch_dir() {
        let args = Args::parse_from([
            "bigearth-sr",
            "super-resolve",
            "-i",
            "in",
            "-o",
            "out",
            "--work-dir",
            "scratch",
        ]);
        match args.command {
            Command::SuperResolve(s) => match s.scratch_dir().unwrap() {
                ScratchDir::Kept(dir) => assert_eq!(dir, PathBuf::from("scratch")),
                other => panic!("unexpected scratch dir: {:?}", other),
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_check_bands_requires_patches() {
        assert!(Args::try_parse_from(["bigearth-sr", "check-bands", "-i", "root"]).is_err());
    }
}
