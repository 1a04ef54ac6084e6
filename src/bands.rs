use crate::error::{PatchError, Result};
use ndarray::{concatenate, stack, Array2, Array3, ArrayView2, Axis};

pub const BAND_COUNT: usize = 12;

/// Native ground sampling distance of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    R10,
    R20,
    R60,
}

impl Resolution {
    pub fn label(self) -> &'static str {
        match self {
            Resolution::R10 => "10m",
            Resolution::R20 => "20m",
            Resolution::R60 => "60m",
        }
    }

    /// Canonical band indices belonging to this group, in stacking order.
    pub fn indices(self) -> &'static [usize] {
        match self {
            Resolution::R10 => &GROUP_10M,
            Resolution::R20 => &GROUP_20M,
            Resolution::R60 => &GROUP_60M,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    B01,
    B02,
    B03,
    B04,
    B05,
    B06,
    B07,
    B08,
    B8A,
    B09,
    B11,
    B12,
}

impl Band {
    /// All bands in acquisition order.
    pub const ALL: [Band; BAND_COUNT] = [
        Band::B01,
        Band::B02,
        Band::B03,
        Band::B04,
        Band::B05,
        Band::B06,
        Band::B07,
        Band::B08,
        Band::B8A,
        Band::B09,
        Band::B11,
        Band::B12,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Band::B01 => "B01",
            Band::B02 => "B02",
            Band::B03 => "B03",
            Band::B04 => "B04",
            Band::B05 => "B05",
            Band::B06 => "B06",
            Band::B07 => "B07",
            Band::B08 => "B08",
            Band::B8A => "B8A",
            Band::B09 => "B09",
            Band::B11 => "B11",
            Band::B12 => "B12",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn resolution(self) -> Resolution {
        match self {
            Band::B02 | Band::B03 | Band::B04 | Band::B08 => Resolution::R10,
            Band::B05 | Band::B06 | Band::B07 | Band::B8A | Band::B11 | Band::B12 => {
                Resolution::R20
            }
            Band::B01 | Band::B09 => Resolution::R60,
        }
    }
}

pub const GROUP_10M: [usize; 4] = [1, 2, 3, 7];
pub const GROUP_20M: [usize; 6] = [4, 5, 6, 8, 10, 11];
pub const GROUP_60M: [usize; 2] = [0, 9];

/// For each canonical slot, the entry of the `[10m | 20m | 60m]` stack to place there.
pub const CANONICAL_FROM_STACKED: [usize; BAND_COUNT] = [10, 0, 1, 2, 4, 5, 6, 3, 7, 11, 8, 9];

/// Twelve bands in acquisition order. The length is fixed at construction.
#[derive(Debug, Clone)]
pub struct BandStack {
    bands: Vec<Array2<f32>>,
}

impl BandStack {
    pub fn new(bands: Vec<Array2<f32>>) -> Result<Self> {
        if bands.len() != BAND_COUNT {
            return Err(PatchError::BandCount {
                expected: BAND_COUNT,
                actual: bands.len(),
            });
        }
        Ok(Self { bands })
    }

    pub fn band(&self, band: Band) -> &Array2<f32> {
        &self.bands[band.index()]
    }

    pub fn bands(&self) -> &[Array2<f32>] {
        &self.bands
    }

    pub fn into_bands(self) -> Vec<Array2<f32>> {
        self.bands
    }
}

/// Spatial-major `(H, W, bands)` groups as consumed by the solver.
#[derive(Debug, Clone)]
pub struct ResolutionGroups {
    pub d10: Array3<f32>,
    pub d20: Array3<f32>,
    pub d60: Array3<f32>,
}

/// Split a stack into its 10m, 20m and 60m groups.
pub fn split_bands(stack: &BandStack) -> Result<ResolutionGroups> {
    Ok(ResolutionGroups {
        d10: stack_group(stack, Resolution::R10)?,
        d20: stack_group(stack, Resolution::R20)?,
        d60: stack_group(stack, Resolution::R60)?,
    })
}

fn stack_group(band_stack: &BandStack, resolution: Resolution) -> Result<Array3<f32>> {
    let indices = resolution.indices();
    let expected = band_stack.bands[indices[0]].dim();

    let mut views: Vec<ArrayView2<'_, f32>> = Vec::with_capacity(indices.len());
    for &i in indices {
        let band = &band_stack.bands[i];
        if band.dim() != expected {
            return Err(PatchError::GroupShapeMismatch {
                group: resolution.label(),
                band: Band::ALL[i].name(),
                expected,
                actual: band.dim(),
            });
        }
        views.push(band.view());
    }

    Ok(stack(Axis(2), &views)?)
}

/// Concatenate `[d10 | sr20 | sr60]` band-major and permute into acquisition order.
///
/// All three inputs are spatial-major and must already share the 10m grid.
pub fn assemble_canonical(
    d10: &Array3<f32>,
    sr20: &Array3<f32>,
    sr60: &Array3<f32>,
) -> Result<Array3<f32>> {
    let (height, width, _) = d10.dim();
    let groups = [
        (Resolution::R10, d10),
        (Resolution::R20, sr20),
        (Resolution::R60, sr60),
    ];

    for (resolution, group) in groups {
        let expected = (height, width, resolution.indices().len());
        if group.dim() != expected {
            return Err(PatchError::AssemblyShapeMismatch {
                group: resolution.label(),
                expected,
                actual: group.dim(),
            });
        }
    }

    let band_major: Vec<_> = groups
        .iter()
        .map(|(_, group)| group.view().permuted_axes([2, 0, 1]))
        .collect();
    let stacked = concatenate(Axis(0), &band_major)?;

    Ok(to_canonical_order(&stacked))
}

/// Apply the fixed permutation to a band-major `[10m | 20m | 60m]` stack.
pub fn to_canonical_order(stacked: &Array3<f32>) -> Array3<f32> {
    stacked.select(Axis(0), &CANONICAL_FROM_STACKED)
}
