use crate::error::{PatchError, Result};
use crate::resize::resize_band_major;
use glob::{glob_with, MatchOptions};
use log::{debug, info};
use ndarray::Array3;
use ndarray_npy::{read_npy, write_npy, ReadNpyError, ReadableElement, WritableElement};
use std::fs;
use std::path::{Path, PathBuf};

/// A band-major `(bands, height, width)` array in its on-disk element type.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchArray {
    U8(Array3<u8>),
    U16(Array3<u16>),
    I16(Array3<i16>),
    F32(Array3<f32>),
    F64(Array3<f64>),
}

impl PatchArray {
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            PatchArray::U8(a) => a.dim(),
            PatchArray::U16(a) => a.dim(),
            PatchArray::I16(a) => a.dim(),
            PatchArray::F32(a) => a.dim(),
            PatchArray::F64(a) => a.dim(),
        }
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            PatchArray::U8(_) => "u8",
            PatchArray::U16(_) => "u16",
            PatchArray::I16(_) => "i16",
            PatchArray::F32(_) => "f32",
            PatchArray::F64(_) => "f64",
        }
    }

    /// Resize every band spatially, keeping the element type.
    pub fn resized(&self, factor: f64) -> Result<PatchArray> {
        Ok(match self {
            PatchArray::U8(a) => PatchArray::U8(resize_band_major(a, factor)?),
            PatchArray::U16(a) => PatchArray::U16(resize_band_major(a, factor)?),
            PatchArray::I16(a) => PatchArray::I16(resize_band_major(a, factor)?),
            PatchArray::F32(a) => PatchArray::F32(resize_band_major(a, factor)?),
            PatchArray::F64(a) => PatchArray::F64(resize_band_major(a, factor)?),
        })
    }
}

/// Try one element type; `Ok(None)` means the file holds a different dtype.
fn try_read<T: ReadableElement>(path: &Path) -> Result<Option<Array3<T>>> {
    match read_npy::<_, Array3<T>>(path) {
        Ok(array) => Ok(Some(array)),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(ReadNpyError::WrongNdim(_, actual)) => Err(PatchError::NotBandMajor(actual)),
        Err(e) => Err(e.into()),
    }
}

/// Read a band-major patch, detecting its element type.
pub fn read_patch(path: &Path) -> Result<PatchArray> {
    debug!("Reading patch: {}", path.display());
    if let Some(a) = try_read::<f32>(path)? {
        return Ok(PatchArray::F32(a));
    }
    if let Some(a) = try_read::<u16>(path)? {
        return Ok(PatchArray::U16(a));
    }
    if let Some(a) = try_read::<f64>(path)? {
        return Ok(PatchArray::F64(a));
    }
    if let Some(a) = try_read::<i16>(path)? {
        return Ok(PatchArray::I16(a));
    }
    if let Some(a) = try_read::<u8>(path)? {
        return Ok(PatchArray::U8(a));
    }
    Err(PatchError::UnsupportedDtype(path.to_path_buf()))
}

pub fn write_patch(path: &Path, patch: &PatchArray) -> Result<()> {
    match patch {
        PatchArray::U8(a) => write_array(path, a),
        PatchArray::U16(a) => write_array(path, a),
        PatchArray::I16(a) => write_array(path, a),
        PatchArray::F32(a) => write_array(path, a),
        PatchArray::F64(a) => write_array(path, a),
    }
}

/// Write a 3-D array as `.npy`, creating the parent directory if needed.
pub fn write_array<T: WritableElement>(path: &Path, array: &Array3<T>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_npy(path, array)?;
    debug!("Wrote {:?} array to {}", array.dim(), path.display());
    Ok(())
}

/// Create the output root if it does not exist yet.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        info!("Creating output directory: {}", path.display());
        fs::create_dir_all(path)?;
    }
    Ok(())
}

fn require_dir(root: &Path) -> Result<()> {
    if !root.is_dir() {
        return Err(PatchError::MissingInputRoot(root.to_path_buf()));
    }
    Ok(())
}

fn glob_sorted(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let full = format!("{}/{}", escaped, pattern);

    // dot-entries such as `.cache` are never items
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let mut paths = Vec::new();
    for entry in glob_with(&full, options)? {
        paths.push(entry?);
    }
    // glob already yields alphabetical order; sort anyway so resume offsets stay stable
    paths.sort();
    Ok(paths)
}

/// `.npy` files directly under `root`, sorted by path.
pub fn list_npy_files(root: &Path) -> Result<Vec<PathBuf>> {
    require_dir(root)?;
    let files: Vec<PathBuf> = glob_sorted(root, "*.npy")?
        .into_iter()
        .filter(|p| p.is_file())
        .collect();
    debug!("Found {} .npy files under {}", files.len(), root.display());
    Ok(files)
}

/// Item folders directly under `root`, sorted by path.
pub fn list_item_folders(root: &Path) -> Result<Vec<PathBuf>> {
    require_dir(root)?;
    let folders: Vec<PathBuf> = glob_sorted(root, "*")?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect();
    debug!("Found {} item folders under {}", folders.len(), root.display());
    Ok(folders)
}

/// Final path component as an item name.
pub fn item_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
