use crate::error::{PatchError, Result};
use log::debug;
use ndarray::{stack, Array2, Array3, ArrayView2, Axis};
use rayon::prelude::*;

/// Element types that can pass through the resampler.
pub trait Sample: Copy + Send + Sync + 'static {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

macro_rules! integer_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    value.round().clamp(<$t>::MIN as f64, <$t>::MAX as f64) as $t
                }
            }
        )*
    };
}

integer_sample!(u8, u16, i16);

impl Sample for f32 {
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Sample for f64 {
    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

/// Destination length for a source axis scaled by `factor`.
pub fn scaled_len(len: usize, factor: f64) -> usize {
    (len as f64 * factor).round_ties_even() as usize
}

fn validate_factor(factor: f64) -> Result<()> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(PatchError::InvalidScale(factor));
    }
    Ok(())
}

/// Source taps `(lower, upper, upper_weight)` for every destination index.
///
/// Pixel centres map to `(d + 0.5) * scale - 0.5` and clamp at the border,
/// so a factor of 0.5 averages 2x2 blocks.
fn axis_taps(src_len: usize, dst_len: usize, scale: f64) -> Vec<(usize, usize, f64)> {
    let last = src_len - 1;
    (0..dst_len)
        .map(|d| {
            let s = ((d as f64 + 0.5) * scale - 0.5).max(0.0);
            let lower = s.floor() as usize;
            if lower >= last {
                (last, last, 0.0)
            } else {
                (lower, lower + 1, s - lower as f64)
            }
        })
        .collect()
}

fn resize_plane<T: Sample>(
    src: ArrayView2<'_, T>,
    (dst_h, dst_w): (usize, usize),
    (scale_y, scale_x): (f64, f64),
) -> Array2<T> {
    let (src_h, src_w) = src.dim();
    let rows = axis_taps(src_h, dst_h, scale_y);
    let cols = axis_taps(src_w, dst_w, scale_x);

    Array2::from_shape_fn((dst_h, dst_w), |(y, x)| {
        let (y0, y1, wy) = rows[y];
        let (x0, x1, wx) = cols[x];

        let top = src[[y0, x0]].to_f64() * (1.0 - wx) + src[[y0, x1]].to_f64() * wx;
        let bottom = src[[y1, x0]].to_f64() * (1.0 - wx) + src[[y1, x1]].to_f64() * wx;
        T::from_f64(top * (1.0 - wy) + bottom * wy)
    })
}

/// Resize one plane by `factor` in both axes.
pub fn resize_by_factor<T: Sample>(src: ArrayView2<'_, T>, factor: f64) -> Result<Array2<T>> {
    validate_factor(factor)?;
    let (height, width) = src.dim();
    let dst = (scaled_len(height, factor), scaled_len(width, factor));
    if height == 0 || width == 0 || dst.0 == 0 || dst.1 == 0 {
        return Err(PatchError::DegenerateOutput {
            height,
            width,
            scale: factor,
        });
    }
    Ok(resize_plane(src, dst, (1.0 / factor, 1.0 / factor)))
}

/// Resize one plane onto an explicit `(height, width)` grid.
pub fn resize_to<T: Sample>(src: ArrayView2<'_, T>, dst: (usize, usize)) -> Result<Array2<T>> {
    let (height, width) = src.dim();
    if height == 0 || width == 0 || dst.0 == 0 || dst.1 == 0 {
        return Err(PatchError::DegenerateOutput {
            height,
            width,
            scale: dst.0 as f64 / height.max(1) as f64,
        });
    }
    let scale = (height as f64 / dst.0 as f64, width as f64 / dst.1 as f64);
    Ok(resize_plane(src, dst, scale))
}

/// Resize every band of a band-major `(bands, H, W)` array by `factor`.
pub fn resize_band_major<T: Sample>(patch: &Array3<T>, factor: f64) -> Result<Array3<T>> {
    validate_factor(factor)?;
    let (bands, height, width) = patch.dim();
    debug!(
        "Resizing {} bands of {}x{} by {}",
        bands, height, width, factor
    );

    let planes: Vec<ArrayView2<'_, T>> = patch.outer_iter().collect();
    let resized = planes
        .par_iter()
        .map(|plane| resize_by_factor(plane.view(), factor))
        .collect::<Result<Vec<Array2<T>>>>()?;

    stack_planes(resized, Axis(0))
}

/// Resample every channel of a spatial-major `(H, W, bands)` array onto `dst`.
pub fn resize_spatial_major<T: Sample>(group: &Array3<T>, dst: (usize, usize)) -> Result<Array3<T>> {
    let channels: Vec<ArrayView2<'_, T>> = group.axis_iter(Axis(2)).collect();
    let resized = channels
        .par_iter()
        .map(|channel| resize_to(channel.view(), dst))
        .collect::<Result<Vec<Array2<T>>>>()?;

    stack_planes(resized, Axis(2))
}

fn stack_planes<T: Sample>(planes: Vec<Array2<T>>, axis: Axis) -> Result<Array3<T>> {
    if planes.is_empty() {
        return Err(PatchError::NotBandMajor(0));
    }
    let views: Vec<ArrayView2<'_, T>> = planes.iter().map(|p| p.view()).collect();
    Ok(stack(axis, &views)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array3};

    #[test]
    fn test_scaled_len_rounds_half_to_even() {
        assert_eq!(scaled_len(120, 0.5), 60);
        assert_eq!(scaled_len(5, 0.5), 2);
        assert_eq!(scaled_len(7, 0.5), 4);
        assert_eq!(scaled_len(3, 0.5), 2);
        assert_eq!(scaled_len(2, 0.5), 1);
    }

    #[test]
    fn test_half_scale_is_box_mean() {
        let src = arr2(&[
            [0.0f32, 2.0, 4.0, 6.0],
            [2.0, 4.0, 6.0, 8.0],
            [10.0, 10.0, 20.0, 20.0],
            [10.0, 10.0, 20.0, 20.0],
        ]);
        let out = resize_by_factor(src.view(), 0.5).unwrap();
        assert_eq!(out, arr2(&[[2.0f32, 6.0], [10.0, 20.0]]));
    }

    #[test]
    fn test_integer_samples_round_and_saturate() {
        let src = arr2(&[[0u16, 1], [0, 0]]);
        // mean 0.25 rounds down
        assert_eq!(resize_by_factor(src.view(), 0.5).unwrap()[[0, 0]], 0);

        let src = arr2(&[[1u16, 2], [2, 2]]);
        // mean 1.75 rounds up
        assert_eq!(resize_by_factor(src.view(), 0.5).unwrap()[[0, 0]], 2);

        assert_eq!(<u8 as Sample>::from_f64(300.0), 255);
        assert_eq!(<i16 as Sample>::from_f64(-40000.0), i16::MIN);
    }

    #[test]
    fn test_upsampling_clamps_at_borders() {
        let src = arr2(&[[0.0f64, 4.0]]);
        let out = resize_to(src.view(), (1, 4)).unwrap();
        // centres at -0.25, 0.25, 0.75, 1.25 in source pixels
        assert_eq!(out, arr2(&[[0.0, 1.0, 3.0, 4.0]]));
    }

    #[test]
    fn test_constant_plane_stays_constant() {
        let src = Array2::<f32>::from_elem((20, 20), 7.5);
        let out = resize_to(src.view(), (120, 120)).unwrap();
        assert!(out.iter().all(|&v| (v - 7.5).abs() < 1e-6));
    }

    #[test]
    fn test_band_major_shape() {
        let patch = Array3::<f32>::zeros((12, 7, 10));
        let out = resize_band_major(&patch, 0.5).unwrap();
        assert_eq!(out.dim(), (12, 4, 5));
    }

    #[test]
    fn test_spatial_major_shape_and_band_order() {
        let group = Array3::from_shape_fn((2, 2, 3), |(_, _, c)| c as f32);
        let out = resize_spatial_major(&group, (6, 6)).unwrap();
        assert_eq!(out.dim(), (6, 6, 3));
        assert_eq!(out[[5, 5, 2]], 2.0);
    }

    #[test]
    fn test_invalid_factors_rejected() {
        let src = Array2::<f32>::zeros((4, 4));
        assert!(matches!(
            resize_by_factor(src.view(), 0.0),
            Err(PatchError::InvalidScale(_))
        ));
        assert!(matches!(
            resize_by_factor(src.view(), f64::NAN),
            Err(PatchError::InvalidScale(_))
        ));
        assert!(matches!(
            resize_by_factor(src.view(), 0.1),
            Err(PatchError::DegenerateOutput { .. })
        ));
    }
}
