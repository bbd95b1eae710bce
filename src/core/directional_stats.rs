//! Local statistics over the edge-aligned window chosen for each pixel

use crate::core::direction::DirectionField;
use crate::core::kernels::Orientation;
use crate::core::neighborhood::{window_stats, NeighborhoodStats};
use crate::types::{BackscatterRaster, SarReal, SarRealImage};
use ndarray::Array2;

/// Per-pixel mean and variance over the selected directional window
#[derive(Debug, Clone)]
pub struct DirectionalStats {
    pub mean: SarRealImage,
    pub variance: SarRealImage,
    /// Pixels that had no usable direction and took the 3x3 statistics instead
    pub fallback_pixels: usize,
}

/// Reduce each pixel over the window of its own direction label.
///
/// Only the matching window is evaluated (one-hot per pixel). Pixels without an
/// orientation (label 0 or a tie composite above 8) reuse `stats3`.
pub fn directional_statistics(
    raster: &BackscatterRaster,
    directions: &DirectionField,
    stats3: &NeighborhoodStats,
) -> DirectionalStats {
    let (height, width) = raster.dim();
    let data = raster.data().view();
    let valid = raster.valid().view();

    let mut mean = Array2::from_elem((height, width), SarReal::NAN);
    let mut variance = Array2::from_elem((height, width), SarReal::NAN);
    let mut fallback_pixels = 0;

    for i in 0..height {
        for j in 0..width {
            match directions.orientation(i, j) {
                Some(orientation) => {
                    let cells = window_cells(orientation);
                    if let Some(stats) = window_stats(data, valid, i, j, cells) {
                        mean[[i, j]] = stats.mean as SarReal;
                        variance[[i, j]] = stats.variance as SarReal;
                    }
                }
                None => {
                    mean[[i, j]] = stats3.mean[[i, j]];
                    variance[[i, j]] = stats3.variance[[i, j]];
                    fallback_pixels += 1;
                }
            }
        }
    }

    DirectionalStats {
        mean,
        variance,
        fallback_pixels,
    }
}

fn window_cells(orientation: Orientation) -> impl Iterator<Item = ((isize, isize), f64)> + Clone {
    orientation.window().iter().map(|&offset| (offset, 1.0))
}
