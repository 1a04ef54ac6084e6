use crate::error::{PatchError, Result};
use log::{error, info, warn};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Processing step an item failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Split,
    Predict20,
    Predict60,
    Assemble,
    Resize,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::Split => "split",
            Stage::Predict20 => "predict20",
            Stage::Predict60 => "predict60",
            Stage::Assemble => "assemble",
            Stage::Resize => "resize",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// An error tagged with the stage it happened in.
#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct ItemError {
    pub stage: Stage,
    pub source: PatchError,
}

pub trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, ItemError>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, ItemError> {
        self.map_err(|source| ItemError { stage, source })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Zero-based position within the processed subset.
    pub index: usize,
    pub item: String,
    pub stage: Stage,
    pub cause: String,
}

impl ItemFailure {
    fn into_error(self) -> PatchError {
        PatchError::ItemFailed {
            index: self.index,
            item: self.item,
            stage: self.stage,
            cause: self.cause,
        }
    }
}

/// Append-only log of failed item indices, one per line.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, failure: &ItemFailure) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", failure.index)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Number of leading items to skip when resuming an interrupted run.
    pub offset: usize,
    pub error_log: Option<PathBuf>,
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Items in the listing before the offset was applied.
    pub listed: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failures: Vec<ItemFailure>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn log_summary(&self, label: &str) {
        info!(
            "{}: {} processed, {} succeeded, {} failed in {:.2?}",
            label,
            self.processed,
            self.succeeded,
            self.failures.len(),
            self.elapsed
        );
        for failure in &self.failures {
            warn!(
                "  #{} {} [{}] {}",
                failure.index, failure.item, failure.stage, failure.cause
            );
        }
    }
}

/// Items left after skipping `offset`; an offset past the end leaves nothing.
pub fn resume_subset<T>(items: &[T], offset: usize) -> &[T] {
    if offset > items.len() {
        warn!(
            "Resume offset {} is past the end of {} items, nothing to process",
            offset,
            items.len()
        );
        return &[];
    }
    &items[offset..]
}

/// Run `process` over `items[offset..]` in order, isolating failures per item.
///
/// A failure to write the error log is logged and does not stop the batch.
pub fn run_batch<T, N, F>(
    items: &[T],
    options: &BatchOptions,
    name_of: N,
    mut process: F,
) -> Result<BatchReport>
where
    N: Fn(&T) -> String,
    F: FnMut(&T) -> std::result::Result<(), ItemError>,
{
    let start = Instant::now();
    let subset = resume_subset(items, options.offset);
    let error_log = options.error_log.as_ref().map(ErrorLog::new);

    if options.offset > 0 {
        info!(
            "Resuming at offset {}: {} of {} items remain",
            options.offset,
            subset.len(),
            items.len()
        );
    }

    let mut report = BatchReport {
        listed: items.len(),
        ..Default::default()
    };

    for (index, item) in subset.iter().enumerate() {
        let name = name_of(item);
        info!("Number: {}/{} Processing {}", index, subset.len(), name);
        report.processed += 1;

        match process(item) {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                error!("Item {} ({}) {}", index, name, e);
                let failure = ItemFailure {
                    index,
                    item: name,
                    stage: e.stage,
                    cause: e.source.to_string(),
                };
                if let Some(log) = &error_log {
                    if let Err(e) = log.append(&failure) {
                        error!(
                            "Could not record item {} in {}: {}",
                            index,
                            log.path().display(),
                            e
                        );
                    }
                }
                if options.fail_fast {
                    return Err(failure.into_error());
                }
                report.failures.push(failure);
            }
        }
    }

    report.elapsed = start.elapsed();
    Ok(report)
}
