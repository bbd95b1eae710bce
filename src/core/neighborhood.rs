//! Windowed mean / variance over kernel neighbourhoods
//!
//! Border policy: window cells falling outside the raster, and masked pixels, are
//! skipped; the statistic is taken over whatever weight remains. Only a window with
//! no remaining weight yields NaN. Variance is the weighted population variance.

use crate::core::kernels::{Kernel, Offset};
use crate::types::{BackscatterRaster, SarReal, SarRealImage};
use ndarray::{Array2, ArrayView2};

/// Reduction applied over a neighbourhood
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Mean,
    Variance,
}

/// Weighted statistics of one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub mean: f64,
    pub variance: f64,
    /// Total weight of the contributing cells
    pub weight: f64,
}

/// Per-pixel mean and variance rasters
#[derive(Debug, Clone)]
pub struct NeighborhoodStats {
    pub mean: SarRealImage,
    pub variance: SarRealImage,
}

impl NeighborhoodStats {
    pub fn dim(&self) -> (usize, usize) {
        self.mean.dim()
    }

    /// (mean, variance) at (row, col) as f64
    pub fn at(&self, row: usize, col: usize) -> (f64, f64) {
        (self.mean[[row, col]] as f64, self.variance[[row, col]] as f64)
    }
}

/// Statistics of the valid in-bounds cells around (row, col).
///
/// Two passes over the cells: mean first, then weighted squared deviations, so a
/// constant window has a variance of exactly zero.
pub fn window_stats<I>(
    data: ArrayView2<SarReal>,
    valid: ArrayView2<bool>,
    row: usize,
    col: usize,
    cells: I,
) -> Option<WindowStats>
where
    I: IntoIterator<Item = (Offset, f64)> + Clone,
{
    let (height, width) = data.dim();
    let sample = |(dr, dc): Offset| -> Option<f64> {
        let r = row as isize + dr;
        let c = col as isize + dc;
        if r < 0 || c < 0 || r >= height as isize || c >= width as isize {
            return None;
        }
        let (r, c) = (r as usize, c as usize);
        if valid[[r, c]] {
            Some(data[[r, c]] as f64)
        } else {
            None
        }
    };

    let mut sum = 0.0;
    let mut weight = 0.0;
    for (offset, w) in cells.clone() {
        if let Some(v) = sample(offset) {
            sum += w * v;
            weight += w;
        }
    }
    if weight <= 0.0 {
        return None;
    }
    let mean = sum / weight;

    let mut squared = 0.0;
    for (offset, w) in cells {
        if let Some(v) = sample(offset) {
            let d = v - mean;
            squared += w * d * d;
        }
    }

    Some(WindowStats {
        mean,
        variance: squared / weight,
        weight,
    })
}

/// Mean and variance of `raster` over `kernel` for every pixel
pub fn neighborhood_stats(raster: &BackscatterRaster, kernel: &Kernel) -> NeighborhoodStats {
    let (height, width) = raster.dim();
    let data = raster.data().view();
    let valid = raster.valid().view();
    let cells = kernel.cells();

    let mut mean = Array2::from_elem((height, width), SarReal::NAN);
    let mut variance = Array2::from_elem((height, width), SarReal::NAN);

    for i in 0..height {
        for j in 0..width {
            if let Some(stats) = window_stats(data, valid, i, j, cells.iter().copied()) {
                mean[[i, j]] = stats.mean as SarReal;
                variance[[i, j]] = stats.variance as SarReal;
            }
        }
    }

    NeighborhoodStats { mean, variance }
}

/// Single reducer over `kernel` for every pixel
pub fn reduce_neighborhood(raster: &BackscatterRaster, kernel: &Kernel, reducer: Reducer) -> SarRealImage {
    let stats = neighborhood_stats(raster, kernel);
    match reducer {
        Reducer::Mean => stats.mean,
        Reducer::Variance => stats.variance,
    }
}
