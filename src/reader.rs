use crate::bands::{Band, BandStack};
use crate::error::{PatchError, Result};
use log::{debug, info};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Reads band 1 of a single-band raster as `f32`.
pub trait BandReader {
    fn backend(&self) -> &'static str;
    fn read_band(&self, path: &Path) -> Result<Array2<f32>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// GDAL when available, otherwise the pure-Rust TIFF decoder
    #[default]
    Auto,
    Gdal,
    Tiff,
}

#[cfg(feature = "gdal")]
pub struct GdalBandReader;

#[cfg(feature = "gdal")]
impl GdalBandReader {
    /// Available when the GTiff driver is registered.
    pub fn probe() -> Option<Self> {
        gdal::DriverManager::get_driver_by_name("GTiff")
            .ok()
            .map(|_| GdalBandReader)
    }
}

#[cfg(feature = "gdal")]
impl BandReader for GdalBandReader {
    fn backend(&self) -> &'static str {
        "gdal"
    }

    fn read_band(&self, path: &Path) -> Result<Array2<f32>> {
        let dataset = gdal::Dataset::open(path)?;
        let rasterband = dataset.rasterband(1)?;

        let width = rasterband.x_size() as usize;
        let height = rasterband.y_size() as usize;

        let buffer = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
        let data_vec: Vec<f32> = buffer.into_iter().collect();
        Ok(Array2::from_shape_vec((height, width), data_vec)?)
    }
}

#[cfg(feature = "tiff")]
pub struct TiffBandReader;

#[cfg(feature = "tiff")]
impl BandReader for TiffBandReader {
    fn backend(&self) -> &'static str {
        "tiff"
    }

    fn read_band(&self, path: &Path) -> Result<Array2<f32>> {
        use std::fs::File;
        use std::io::BufReader;
        use tiff::decoder::{Decoder, DecodingResult, Limits};
        use tiff::ColorType;

        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

        match decoder.colortype()? {
            ColorType::Gray(_) => {}
            other => {
                return Err(PatchError::UnsupportedSampleFormat {
                    path: path.to_path_buf(),
                    detail: format!("{:?}", other),
                })
            }
        }

        let (width, height) = decoder.dimensions()?;
        let data: Vec<f32> = match decoder.read_image()? {
            DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
            DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
            DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
            DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
            DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
            DecodingResult::F32(v) => v,
            DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
            _ => {
                return Err(PatchError::UnsupportedSampleFormat {
                    path: path.to_path_buf(),
                    detail: "64-bit integer or signed 8-bit samples".to_string(),
                })
            }
        };

        Ok(Array2::from_shape_vec((height as usize, width as usize), data)?)
    }
}

#[cfg(feature = "gdal")]
fn gdal_backend() -> Option<Box<dyn BandReader>> {
    GdalBandReader::probe().map(|r| Box::new(r) as Box<dyn BandReader>)
}

#[cfg(not(feature = "gdal"))]
fn gdal_backend() -> Option<Box<dyn BandReader>> {
    None
}

#[cfg(feature = "tiff")]
fn tiff_backend() -> Option<Box<dyn BandReader>> {
    Some(Box::new(TiffBandReader))
}

#[cfg(not(feature = "tiff"))]
fn tiff_backend() -> Option<Box<dyn BandReader>> {
    None
}

/// Pick a raster backend, failing now rather than at the first read.
pub fn open_backend(preference: BackendPreference) -> Result<Box<dyn BandReader>> {
    let reader = match preference {
        BackendPreference::Auto => gdal_backend()
            .or_else(tiff_backend)
            .ok_or(PatchError::NoBackendAvailable)?,
        BackendPreference::Gdal => gdal_backend().ok_or(PatchError::BackendUnavailable("gdal"))?,
        BackendPreference::Tiff => tiff_backend().ok_or(PatchError::BackendUnavailable("tiff"))?,
    };
    info!("{} backend will be used to read GeoTIFF files", reader.backend());
    Ok(reader)
}

/// Reads the 12 bands of a dataset item laid out as `{root}/{item}/{item}_{BAND}.tif`.
pub struct BandStackReader {
    root: PathBuf,
    reader: Box<dyn BandReader>,
}

impl BandStackReader {
    pub fn new(root: impl Into<PathBuf>, reader: Box<dyn BandReader>) -> Self {
        Self {
            root: root.into(),
            reader,
        }
    }

    pub fn open(root: impl Into<PathBuf>, preference: BackendPreference) -> Result<Self> {
        Ok(Self::new(root, open_backend(preference)?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backend(&self) -> &'static str {
        self.reader.backend()
    }

    pub fn reset_root(&mut self, root: impl Into<PathBuf>) {
        self.root = root.into();
        debug!("Band reader root set to {}", self.root.display());
    }

    pub fn band_path(&self, item: &str, band: Band) -> PathBuf {
        self.root
            .join(item)
            .join(format!("{}_{}.tif", item, band.name()))
    }

    pub fn read_stack(&self, item: &str) -> Result<BandStack> {
        let mut bands = Vec::with_capacity(Band::ALL.len());
        for band in Band::ALL {
            let path = self.band_path(item, band);
            debug!("Reading {}", path.display());
            bands.push(self.reader.read_band(&path)?);
        }
        BandStack::new(bands)
    }

    /// Read every band of `item` and log its shape without keeping the data.
    pub fn check_bands(&self, item: &str) -> Result<Vec<(Band, (usize, usize))>> {
        let mut shapes = Vec::with_capacity(Band::ALL.len());
        for band in Band::ALL {
            let data = self.reader.read_band(&self.band_path(item, band))?;
            info!(
                "band {} of patch {} is ready with size {:?}",
                band.name(),
                item,
                data.dim()
            );
            shapes.push((band, data.dim()));
        }
        Ok(shapes)
    }
}

/// Write a single-band GeoTIFF fixture.
#[cfg(all(test, feature = "tiff"))]
pub(crate) fn write_test_band(path: &Path, data: &Array2<u16>) {
    use std::fs::File;
    use tiff::encoder::{colortype, TiffEncoder};

    let (height, width) = data.dim();
    let pixels: Vec<u16> = data.iter().copied().collect();
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    encoder
        .write_image::<colortype::Gray16>(width as u32, height as u32, &pixels)
        .unwrap();
}
