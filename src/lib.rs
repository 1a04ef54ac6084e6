// Library exports for testing and reuse

pub mod bands;
pub mod batch;
pub mod cli;
pub mod downsample;
pub mod error;
pub mod io;
pub mod reader;
pub mod resize;
pub mod solver;
pub mod superres;

// Re-export commonly used types
pub use bands::{assemble_canonical, split_bands, Band, BandStack, ResolutionGroups};
pub use batch::{BatchOptions, BatchReport, ItemFailure, Stage};
pub use error::{PatchError, Result};
pub use reader::{open_backend, BackendPreference, BandReader, BandStackReader};
pub use solver::{BilinearSolver, CommandSolver, Solver};
