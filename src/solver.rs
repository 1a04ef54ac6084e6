use crate::error::{PatchError, Result};
use crate::resize::resize_spatial_major;
use log::{debug, info, warn};
use ndarray::Array3;
use ndarray_npy::{read_npy, write_npy};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Upsamples resolution groups onto the 10m grid. Arrays are `(H, W, bands)`.
pub trait Solver {
    fn name(&self) -> &str;

    /// Predict the 20m group at 10m resolution.
    fn predict20(&self, d10: &Array3<f32>, d20: &Array3<f32>) -> Result<Array3<f32>>;

    /// Predict the 60m group at 10m resolution.
    fn predict60(
        &self,
        d10: &Array3<f32>,
        d20: &Array3<f32>,
        d60: &Array3<f32>,
    ) -> Result<Array3<f32>>;
}

/// Reject a prediction that is not `(H10, W10, bands of the input group)`.
pub fn check_prediction(
    operation: &'static str,
    d10: &Array3<f32>,
    group: &Array3<f32>,
    prediction: &Array3<f32>,
) -> Result<()> {
    let (height, width, _) = d10.dim();
    let expected = (height, width, group.dim().2);
    if prediction.dim() != expected {
        return Err(PatchError::SolverOutputShape {
            operation,
            expected,
            actual: prediction.dim(),
        });
    }
    Ok(())
}

/// Resamples the coarse groups onto the 10m grid without a learned model.
#[derive(Debug, Clone, Copy, Default)]
pub struct BilinearSolver;

impl Solver for BilinearSolver {
    fn name(&self) -> &str {
        "bilinear"
    }

    fn predict20(&self, d10: &Array3<f32>, d20: &Array3<f32>) -> Result<Array3<f32>> {
        let (height, width, _) = d10.dim();
        resize_spatial_major(d20, (height, width))
    }

    fn predict60(
        &self,
        d10: &Array3<f32>,
        _d20: &Array3<f32>,
        d60: &Array3<f32>,
    ) -> Result<Array3<f32>> {
        let (height, width, _) = d10.dim();
        resize_spatial_major(d60, (height, width))
    }
}

/// Delegates prediction to an external program exchanging `.npy` files.
///
/// Invoked as `program [args..] <operation> <inputs..> <output>` where
/// operation is `predict20` (inputs d10, d20) or `predict60` (d10, d20, d60).
#[derive(Debug, Clone)]
pub struct CommandSolver {
    program: String,
    args: Vec<String>,
    work_dir: PathBuf,
}

impl CommandSolver {
    pub fn new(program: impl Into<String>, args: Vec<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn invoke(&self, operation: &'static str, inputs: &[(&str, &Array3<f32>)]) -> Result<Array3<f32>> {
        fs::create_dir_all(&self.work_dir)?;

        let mut paths = Vec::with_capacity(inputs.len());
        for (name, array) in inputs {
            let path = self.work_dir.join(format!("{}_{}.npy", operation, name));
            write_npy(&path, *array)?;
            paths.push(path);
        }
        let output_path = self.work_dir.join(format!("{}_out.npy", operation));
        if output_path.exists() {
            fs::remove_file(&output_path)?;
        }

        debug!("Running {} {:?} {}", self.program, self.args, operation);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(operation)
            .args(&paths)
            .arg(&output_path)
            .output();

        let result = match output {
            Ok(result) => {
                if result.status.success() {
                    read_npy::<_, Array3<f32>>(&output_path).map_err(PatchError::from)
                } else {
                    let stderr = String::from_utf8_lossy(&result.stderr);
                    Err(PatchError::SolverFailed(format!(
                        "{} {} exited with {}: {}",
                        self.program,
                        operation,
                        result.status,
                        stderr.trim()
                    )))
                }
            }
            Err(e) => Err(PatchError::SolverFailed(format!(
                "could not launch {}: {}",
                self.program, e
            ))),
        };

        for path in paths.iter().chain(std::iter::once(&output_path)) {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Failed to remove scratch file {}: {}", path.display(), e);
                }
            }
        }

        result
    }
}

impl Solver for CommandSolver {
    fn name(&self) -> &str {
        &self.program
    }

    fn predict20(&self, d10: &Array3<f32>, d20: &Array3<f32>) -> Result<Array3<f32>> {
        let sr20 = self.invoke("predict20", &[("d10", d10), ("d20", d20)])?;
        check_prediction("predict20", d10, d20, &sr20)?;
        Ok(sr20)
    }

    fn predict60(
        &self,
        d10: &Array3<f32>,
        d20: &Array3<f32>,
        d60: &Array3<f32>,
    ) -> Result<Array3<f32>> {
        let sr60 = self.invoke("predict60", &[("d10", d10), ("d20", d20), ("d60", d60)])?;
        check_prediction("predict60", d10, d60, &sr60)?;
        Ok(sr60)
    }
}

/// Solver selected on the command line.
/// Exchange directory for solver files. A temporary one is removed on drop.
#[derive(Debug)]
pub enum ScratchDir {
    Kept(PathBuf),
    Temporary(TempDir),
}

impl ScratchDir {
    pub fn new(dir: Option<PathBuf>) -> Result<Self> {
        match dir {
            Some(dir) => Ok(ScratchDir::Kept(dir)),
            None => {
                let temp = tempfile::Builder::new().prefix("bigearth-sr-").tempdir()?;
                debug!("Solver scratch directory: {}", temp.path().display());
                Ok(ScratchDir::Temporary(temp))
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ScratchDir::Kept(dir) => dir,
            ScratchDir::Temporary(temp) => temp.path(),
        }
    }
}

pub fn build_solver(command: Option<(String, Vec<String>)>, work_dir: &Path) -> Box<dyn Solver> {
    match command {
        Some((program, args)) => {
            info!("Using external solver: {} {:?}", program, args);
            Box::new(CommandSolver::new(program, args, work_dir))
        }
        None => {
            info!("Using bilinear solver");
            Box::new(BilinearSolver)
        }
    }
}
