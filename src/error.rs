use std::path::PathBuf;

use thiserror::Error;

use crate::batch::Stage;

#[derive(Error, Debug)]
pub enum PatchError {
    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[cfg(feature = "tiff")]
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("NPY read error: {0}")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    #[error("NPY write error: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Directory listing error: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("Input root does not exist or is not a directory: {0}")]
    MissingInputRoot(PathBuf),

    #[error("Band stack must hold {expected} bands, got {actual}")]
    BandCount { expected: usize, actual: usize },

    #[error("{group} group band {band} has shape {actual:?}, expected {expected:?}")]
    GroupShapeMismatch {
        group: &'static str,
        band: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("{group} group has shape {actual:?} at assembly, expected {expected:?}")]
    AssemblyShapeMismatch {
        group: &'static str,
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },

    #[error("Expected a band-major (bands, height, width) array, got {0} dimensions")]
    NotBandMajor(usize),

    #[error("Unsupported array dtype in {0}")]
    UnsupportedDtype(PathBuf),

    #[error("Unsupported raster sample format in {path}: {detail}")]
    UnsupportedSampleFormat { path: PathBuf, detail: String },

    #[error("Invalid scale factor: {0} (must be finite and positive)")]
    InvalidScale(f64),

    #[error("Resizing {height}x{width} by {scale} leaves an empty axis")]
    DegenerateOutput { height: usize, width: usize, scale: f64 },

    #[error("No raster backend available (build with the `gdal` or `tiff` feature)")]
    NoBackendAvailable,

    #[error("Raster backend `{0}` is not available in this build")]
    BackendUnavailable(&'static str),

    #[error("Solver failed: {0}")]
    SolverFailed(String),

    #[error("Solver {operation} returned shape {actual:?}, expected {expected:?}")]
    SolverOutputShape {
        operation: &'static str,
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Item {index} ({item}) failed during {stage}: {cause}")]
    ItemFailed {
        index: usize,
        item: String,
        stage: Stage,
        cause: String,
    },
}

pub type Result<T> = std::result::Result<T, PatchError>;
