use crate::batch::{run_batch, AtStage, BatchOptions, BatchReport, ItemError, Stage};
use crate::error::Result;
use crate::io::{ensure_dir, item_name, list_npy_files, read_patch, write_patch};
use log::{debug, info};
use std::path::{Path, PathBuf};

pub const DEFAULT_SCALE: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct DownsampleConfig {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub scale: f64,
    pub batch: BatchOptions,
}

impl DownsampleConfig {
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            scale: DEFAULT_SCALE,
            batch: BatchOptions::default(),
        }
    }
}

fn downsample_file(source: &Path, output_root: &Path, scale: f64) -> std::result::Result<(), ItemError> {
    let patch = read_patch(source).at(Stage::Read)?;
    let low = patch.resized(scale).at(Stage::Resize)?;
    debug!(
        "{} {:?} -> {:?} ({})",
        item_name(source),
        patch.dim(),
        low.dim(),
        patch.dtype()
    );

    let target = output_root.join(item_name(source));
    write_patch(&target, &low).at(Stage::Write)
}

pub fn run(config: &DownsampleConfig) -> Result<BatchReport> {
    let sources = list_npy_files(&config.input_root)?;
    info!("Pairs: {}", sources.len());
    ensure_dir(&config.output_root)?;

    let report = run_batch(
        &sources,
        &config.batch,
        |path| item_name(path),
        |path| downsample_file(path, &config.output_root, config.scale),
    )?;
    report.log_summary("Downsampling");
    Ok(report)
}
