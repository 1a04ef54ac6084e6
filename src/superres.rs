use crate::bands::{assemble_canonical, split_bands, BandStack};
use crate::batch::{run_batch, AtStage, BatchOptions, BatchReport, ItemError, Stage};
use crate::error::Result;
use crate::io::{ensure_dir, item_name, list_item_folders, write_array};
use crate::reader::BandStackReader;
use crate::solver::Solver;
use log::{debug, info};
use ndarray::Array3;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SuperResConfig {
    pub output_root: PathBuf,
    pub batch: BatchOptions,
}

/// Split, predict and reassemble one stack into a band-major `(12, H, W)` array.
pub fn super_resolve(
    stack: &BandStack,
    solver: &dyn Solver,
) -> std::result::Result<Array3<f32>, ItemError> {
    let groups = split_bands(stack).at(Stage::Split)?;
    let sr20 = solver
        .predict20(&groups.d10, &groups.d20)
        .at(Stage::Predict20)?;
    let sr60 = solver
        .predict60(&groups.d10, &groups.d20, &groups.d60)
        .at(Stage::Predict60)?;
    assemble_canonical(&groups.d10, &sr20, &sr60).at(Stage::Assemble)
}

pub fn output_path(output_root: &Path, item: &str) -> PathBuf {
    output_root.join(format!("{}.npy", item))
}

fn process_item(
    item: &str,
    reader: &BandStackReader,
    solver: &dyn Solver,
    output_root: &Path,
) -> std::result::Result<(), ItemError> {
    let stack = reader.read_stack(item).at(Stage::Read)?;
    let output = super_resolve(&stack, solver)?;
    debug!("{} super-resolved to {:?}", item, output.dim());
    write_array(&output_path(output_root, item), &output).at(Stage::Write)
}

/// Super-resolve every item folder under the reader's root.
pub fn run(
    config: &SuperResConfig,
    reader: &BandStackReader,
    solver: &dyn Solver,
) -> Result<BatchReport> {
    let folders = list_item_folders(reader.root())?;
    info!("Folder Number: {}", folders.len());
    info!(
        "Reading with {} backend, predicting with {} solver",
        reader.backend(),
        solver.name()
    );
    ensure_dir(&config.output_root)?;

    let report = run_batch(
        &folders,
        &config.batch,
        |folder| item_name(folder),
        |folder| process_item(&item_name(folder), reader, solver, &config.output_root),
    )?;
    report.log_summary("All Pairs");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::{Band, BAND_COUNT};
    use crate::error::PatchError;
    use crate::reader::BandReader;
    use crate::solver::BilinearSolver;
    use ndarray::{Array2, Axis};
    use ndarray_npy::read_npy;
    use std::fs;
    use tempfile::tempdir;

    /// Band `i` of every item is filled with `i`; items named in `broken` fail to read.
    struct SyntheticReader {
        broken: Vec<String>,
        size: usize,
    }

    impl BandReader for SyntheticReader {
        fn backend(&self) -> &'static str {
            "synthetic"
        }

        fn read_band(&self, path: &Path) -> Result<Array2<f32>> {
            let file = item_name(path);
            if self.broken.iter().any(|b| file.starts_with(&format!("{}_", b))) {
                return Err(PatchError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    file,
                )));
            }
            let band = Band::ALL
                .iter()
                .position(|b| file.ends_with(&format!("_{}.tif", b.name())))
                .expect("band file name");
            Ok(Array2::from_elem((self.size, self.size), band as f32))
        }
    }

    /// Every prediction is the input group itself.
    struct IdentitySolver;

    impl Solver for IdentitySolver {
        fn name(&self) -> &str {
            "identity"
        }

        fn predict20(&self, _d10: &Array3<f32>, d20: &Array3<f32>) -> Result<Array3<f32>> {
            Ok(d20.clone())
        }

        fn predict60(
            &self,
            _d10: &Array3<f32>,
            _d20: &Array3<f32>,
            d60: &Array3<f32>,
        ) -> Result<Array3<f32>> {
            Ok(d60.clone())
        }
    }

    fn dataset(names: &[String]) -> tempfile::TempDir {
        let root = tempdir().unwrap();
        for name in names {
            fs::create_dir(root.path().join(name)).unwrap();
        }
        root
    }

    fn reader(root: &Path, broken: &[&str]) -> BandStackReader {
        BandStackReader::new(
            root,
            Box::new(SyntheticReader {
                broken: broken.iter().map(|s| s.to_string()).collect(),
                size: 4,
            }),
        )
    }

    #[test]
    fn test_identity_prediction_keeps_band_values() {
        let root = dataset(&["S2A_1".to_string()]);
        let stack = reader(root.path(), &[]).read_stack("S2A_1").unwrap();
        let output = super_resolve(&stack, &IdentitySolver).unwrap();

        assert_eq!(output.dim(), (12, 4, 4));
        for i in 0..BAND_COUNT {
            assert!(output.index_axis(Axis(0), i).iter().all(|&v| v == i as f32));
        }
    }

    #[test]
    fn test_failed_read_is_logged_by_index() {
        let names: Vec<String> = (0..5).map(|i| format!("S2A_{}", i)).collect();
        let root = dataset(&names);
        let out = tempdir().unwrap();
        let log_path = out.path().join("error_log.txt");
        let config = SuperResConfig {
            output_root: out.path().join("SR"),
            batch: BatchOptions {
                error_log: Some(log_path.clone()),
                ..Default::default()
            },
        };

        let report = run(&config, &reader(root.path(), &["S2A_2"]), &IdentitySolver).unwrap();

        assert_eq!(report.succeeded, 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, Stage::Read);
        assert_eq!(fs::read_dir(out.path().join("SR")).unwrap().count(), 4);
        assert!(!output_path(&out.path().join("SR"), "S2A_2").exists());
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "2\n");
    }

    #[test]
    fn test_resume_offset_uses_subset_indices() {
        let names: Vec<String> = (0..10).map(|i| format!("item_{:02}", i)).collect();
        let root = dataset(&names);
        let out = tempdir().unwrap();
        let log_path = out.path().join("error_log.txt");
        let config = SuperResConfig {
            output_root: out.path().join("SR"),
            batch: BatchOptions {
                offset: 3,
                error_log: Some(log_path.clone()),
                fail_fast: false,
            },
        };

        // item_05 and item_09 are at subset positions 2 and 6
        let report = run(
            &config,
            &reader(root.path(), &["item_05", "item_09"]),
            &IdentitySolver,
        )
        .unwrap();

        assert_eq!(report.listed, 10);
        assert_eq!(report.processed, 7);
        assert_eq!(report.succeeded, 5);
        assert!(!output_path(&config.output_root, "item_02").exists());
        assert!(output_path(&config.output_root, "item_03").exists());
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "2\n6\n");
    }

    #[test]
    fn test_written_output_is_canonical_f32() {
        let root = dataset(&["S2B_7".to_string()]);
        let out = tempdir().unwrap();
        let config = SuperResConfig {
            output_root: out.path().to_path_buf(),
            batch: BatchOptions::default(),
        };

        run(&config, &reader(root.path(), &[]), &BilinearSolver).unwrap();

        let written: Array3<f32> = read_npy(output_path(out.path(), "S2B_7")).unwrap();
        assert_eq!(written.dim(), (12, 4, 4));
        assert!(written.index_axis(Axis(0), 9).iter().all(|&v| v == 9.0));
    }

    #[test]
    fn test_solver_failure_is_tagged_with_stage() {
        struct FailingSolver;

        impl Solver for FailingSolver {
            fn name(&self) -> &str {
                "failing"
            }

            fn predict20(&self, d10: &Array3<f32>, d20: &Array3<f32>) -> Result<Array3<f32>> {
                BilinearSolver.predict20(d10, d20)
            }

            fn predict60(
                &self,
                _d10: &Array3<f32>,
                _d20: &Array3<f32>,
                _d60: &Array3<f32>,
            ) -> Result<Array3<f32>> {
                Err(PatchError::SolverFailed("out of memory".to_string()))
            }
        }

        let root = dataset(&["x".to_string()]);
        let stack = reader(root.path(), &[]).read_stack("x").unwrap();
        let err = super_resolve(&stack, &FailingSolver).unwrap_err();
        assert_eq!(err.stage, Stage::Predict60);
    }

    #[cfg(feature = "tiff")]
    #[test]
    fn test_native_resolution_tiffs_end_to_end() {
        use crate::bands::Resolution;
        use crate::reader::{write_test_band, TiffBandReader};

        let root = tempdir().unwrap();
        let out = tempdir().unwrap();
        let item = "S2A_MSIL2A_20170613T101031_0_45";
        fs::create_dir(root.path().join(item)).unwrap();

        for band in Band::ALL {
            let size = match band.resolution() {
                Resolution::R10 => 12,
                Resolution::R20 => 6,
                Resolution::R60 => 2,
            };
            let data = Array2::from_elem((size, size), band.index() as u16 * 10);
            let path = root.path().join(item).join(format!("{}_{}.tif", item, band.name()));
            write_test_band(&path, &data);
        }

        let reader = BandStackReader::new(root.path(), Box::new(TiffBandReader));
        let config = SuperResConfig {
            output_root: out.path().to_path_buf(),
            batch: BatchOptions::default(),
        };
        let report = run(&config, &reader, &BilinearSolver).unwrap();
        assert_eq!(report.succeeded, 1);

        let written: Array3<f32> = read_npy(output_path(out.path(), item)).unwrap();
        assert_eq!(written.dim(), (12, 12, 12));
        for band in Band::ALL {
            let expected = band.index() as f32 * 10.0;
            assert!(written
                .index_axis(Axis(0), band.index())
                .iter()
                .all(|&v| (v - expected).abs() < 1e-4));
        }
    }
}
