use crate::types::{
    BackscatterRaster, BackscatterUnit, ClassMask, Extent, GridGeometry, SarError, SarResult, ValidityMask,
};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Backscatter level (dB) below which a surface is treated as open water
pub const DEFAULT_WATER_THRESHOLD_DB: f32 = -15.0;

/// Change detection parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeDetectionParams {
    /// Water threshold in dB
    pub threshold_db: f32,
    /// Optional study extent; pixels centred outside it are masked
    pub study_area: Option<Extent>,
}

impl Default for ChangeDetectionParams {
    fn default() -> Self {
        Self {
            threshold_db: DEFAULT_WATER_THRESHOLD_DB,
            study_area: None,
        }
    }
}

/// Pixel counts and areas of a change detection run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloodStatistics {
    pub total_pixels: usize,
    pub valid_pixels: usize,
    pub persistent_water_pixels: usize,
    pub flood_pixels: usize,
    /// Ground area of one pixel (map units²)
    pub pixel_area: f64,
    pub persistent_water_area: f64,
    pub flood_area: f64,
    /// Flooded share of the valid pixels, in percent
    pub flood_percentage: f64,
}

/// Persistent water and flood extent masks
#[derive(Debug, Clone)]
pub struct ChangeDetectionResult {
    /// Water in both epochs
    pub persistent_water: ClassMask,
    /// Water only in the candidate epoch
    pub flood_extent: ClassMask,
    pub statistics: FloodStatistics,
}

/// Threshold-based change detector between a reference and a candidate epoch
pub struct ChangeDetector {
    params: ChangeDetectionParams,
}

impl ChangeDetector {
    pub fn new(params: ChangeDetectionParams) -> SarResult<Self> {
        if !params.threshold_db.is_finite() {
            return Err(SarError::InvalidParameter(format!(
                "Water threshold must be finite, got {}",
                params.threshold_db
            )));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &ChangeDetectionParams {
        &self.params
    }

    /// Classify filtered dB rasters.
    ///
    /// * `reference` - "normal" epoch
    /// * `candidate` - "flood" epoch, same grid
    pub fn detect(
        &self,
        reference: &BackscatterRaster,
        candidate: &BackscatterRaster,
    ) -> SarResult<ChangeDetectionResult> {
        for (name, raster) in [("reference", reference), ("candidate", candidate)] {
            if raster.unit() != BackscatterUnit::Decibel {
                return Err(SarError::InvalidParameter(format!(
                    "Change detection expects dB rasters, {} epoch is {}",
                    name,
                    raster.unit()
                )));
            }
        }
        reference
            .geometry()
            .ensure_matches(candidate.geometry(), "change detection")?;

        let geometry = *reference.geometry();
        let threshold = self.params.threshold_db;
        log::info!(
            "Detecting flood extent on {}x{} grid (threshold {} dB)",
            geometry.rows,
            geometry.cols,
            threshold
        );

        let inside = self.study_area_mask(&geometry);
        let valid: ValidityMask = Zip::from(reference.valid())
            .and(candidate.valid())
            .and(&inside)
            .par_map_collect(|&a, &b, &within| a && b && within);

        let reference_water = reference.data().mapv(|v| v < threshold);
        let candidate_water = candidate.data().mapv(|v| v < threshold);

        let persistent = Zip::from(&reference_water)
            .and(&candidate_water)
            .par_map_collect(|&before, &after| before && after);
        let flooded = Zip::from(&reference_water)
            .and(&candidate_water)
            .par_map_collect(|&before, &after| !before && after);

        let persistent_water = ClassMask::new(persistent, valid.clone(), geometry)?;
        let flood_extent = ClassMask::new(flooded, valid, geometry)?;
        let statistics = Self::statistics(&geometry, &persistent_water, &flood_extent);

        log::info!(
            "Flood extent: {} pixels ({:.2}% of valid), persistent water: {} pixels",
            statistics.flood_pixels,
            statistics.flood_percentage,
            statistics.persistent_water_pixels
        );

        Ok(ChangeDetectionResult {
            persistent_water,
            flood_extent,
            statistics,
        })
    }

    fn study_area_mask(&self, geometry: &GridGeometry) -> Array2<bool> {
        match self.params.study_area {
            Some(extent) => Array2::from_shape_fn(geometry.dim(), |(i, j)| {
                let (x, y) = geometry.transform.pixel_center(i, j);
                extent.contains(x, y)
            }),
            None => Array2::from_elem(geometry.dim(), true),
        }
    }

    fn statistics(geometry: &GridGeometry, persistent: &ClassMask, flood: &ClassMask) -> FloodStatistics {
        let pixel_area = geometry.pixel_area();
        let valid_pixels = flood.valid_count();
        let persistent_water_pixels = persistent.class_count();
        let flood_pixels = flood.class_count();

        FloodStatistics {
            total_pixels: geometry.pixel_count(),
            valid_pixels,
            persistent_water_pixels,
            flood_pixels,
            pixel_area,
            persistent_water_area: persistent_water_pixels as f64 * pixel_area,
            flood_area: flood_pixels as f64 * pixel_area,
            flood_percentage: if valid_pixels > 0 {
                100.0 * flood_pixels as f64 / valid_pixels as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self {
            params: ChangeDetectionParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;

    fn db_row(values: Vec<f32>) -> BackscatterRaster {
        let n = values.len();
        let geometry = GridGeometry::new(1, n, GeoTransform::north_up(0.0, 30.0, 10.0));
        BackscatterRaster::new(Array2::from_shape_vec((1, n), values).unwrap(), geometry, BackscatterUnit::Decibel)
            .unwrap()
    }

    #[test]
    fn test_threshold_scenario() {
        let normal = db_row(vec![-20.0, -10.0, -20.0]);
        let flood = db_row(vec![-20.0, -20.0, -20.0]);
        let result = ChangeDetector::default().detect(&normal, &flood).unwrap();

        let persistent: Vec<Option<bool>> = (0..3).map(|j| result.persistent_water.get(0, j)).collect();
        let flooded: Vec<Option<bool>> = (0..3).map(|j| result.flood_extent.get(0, j)).collect();
        assert_eq!(persistent, vec![Some(true), Some(false), Some(true)]);
        assert_eq!(flooded, vec![Some(false), Some(true), Some(false)]);

        assert_eq!(result.statistics.flood_pixels, 1);
        assert_eq!(result.statistics.persistent_water_pixels, 2);
        assert_eq!(result.statistics.flood_area, 100.0);
    }

    #[test]
    fn test_threshold_boundary_is_not_water() {
        // normal exactly at T counts as dry, flood exactly at T is not water
        let normal = db_row(vec![-15.0, -15.0]);
        let flood = db_row(vec![-15.5, -15.0]);
        let result = ChangeDetector::default().detect(&normal, &flood).unwrap();

        assert_eq!(result.flood_extent.get(0, 0), Some(true));
        assert_eq!(result.flood_extent.get(0, 1), Some(false));
        assert_eq!(result.persistent_water.get(0, 1), Some(false));
    }

    #[test]
    fn test_masked_epochs_propagate() {
        let normal = db_row(vec![f32::NAN, -10.0, -20.0, -10.0]);
        let flood = db_row(vec![-20.0, f32::NAN, -20.0, -20.0]);
        let result = ChangeDetector::default().detect(&normal, &flood).unwrap();

        for j in 0..2 {
            assert_eq!(result.persistent_water.get(0, j), None);
            assert_eq!(result.flood_extent.get(0, j), None);
        }
        assert_eq!(result.persistent_water.get(0, 2), Some(true));
        assert_eq!(result.flood_extent.get(0, 3), Some(true));
        assert_eq!(result.statistics.valid_pixels, 2);
        assert_eq!(result.statistics.flood_percentage, 50.0);
    }

    #[test]
    fn test_study_area_clipping() {
        let normal = db_row(vec![-10.0, -10.0, -10.0]);
        let flood = db_row(vec![-20.0, -20.0, -20.0]);
        let params = ChangeDetectionParams {
            study_area: Some(Extent::new(0.0, 0.0, 20.0, 30.0).unwrap()),
            ..Default::default()
        };
        let result = ChangeDetector::new(params).unwrap().detect(&normal, &flood).unwrap();

        assert_eq!(result.flood_extent.get(0, 0), Some(true));
        assert_eq!(result.flood_extent.get(0, 1), Some(true));
        assert_eq!(result.flood_extent.get(0, 2), None);
    }

    #[test]
    fn test_grid_mismatch_fails_fast() {
        let normal = db_row(vec![-10.0, -10.0]);
        let flood = db_row(vec![-20.0, -20.0, -20.0]);
        let result = ChangeDetector::default().detect(&normal, &flood);
        assert!(matches!(result, Err(SarError::GeometryMismatch(_))));
    }

    #[test]
    fn test_linear_input_rejected() {
        let normal = db_row(vec![-10.0]);
        let geometry = *normal.geometry();
        let linear =
            BackscatterRaster::new(Array2::from_elem((1, 1), 0.1), geometry, BackscatterUnit::Linear).unwrap();
        assert!(ChangeDetector::default().detect(&normal, &linear).is_err());
        assert!(ChangeDetector::new(ChangeDetectionParams {
            threshold_db: f32::NAN,
            ..Default::default()
        })
        .is_err());
    }
}
