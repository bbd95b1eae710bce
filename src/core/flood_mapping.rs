//! End-to-end flood mapping from a reference and a candidate dB scene
//!
//! dB -> linear -> Refined Lee -> dB for each epoch, then threshold change detection.

use crate::core::change_detection::{
    ChangeDetectionParams, ChangeDetector, FloodStatistics, DEFAULT_WATER_THRESHOLD_DB,
};
use crate::core::speckle_filter::{equivalent_number_of_looks, RefinedLeeFilter, RefinedLeeParams};
use crate::core::units::{to_db, to_natural};
use crate::types::{
    AcquisitionWindow, BackscatterRaster, BackscatterUnit, ClassMask, Extent, GridGeometry, SarError, SarResult,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Nominal Sentinel-1 GRD pixel spacing (map units)
pub const DEFAULT_PIXEL_SPACING: f64 = 10.0;

/// Flood mapping configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodMappingConfig {
    /// Water threshold on the filtered backscatter (dB)
    pub water_threshold_db: f32,
    /// Expected pixel spacing of both inputs
    pub pixel_spacing: f64,
    /// Allowed deviation from `pixel_spacing`
    pub spacing_tolerance: f64,
    /// Optional study extent in map coordinates
    pub study_area: Option<Extent>,
    pub refined_lee: RefinedLeeParams,
}

impl Default for FloodMappingConfig {
    fn default() -> Self {
        Self {
            water_threshold_db: DEFAULT_WATER_THRESHOLD_DB,
            pixel_spacing: DEFAULT_PIXEL_SPACING,
            spacing_tolerance: 1e-6,
            study_area: None,
            refined_lee: RefinedLeeParams::default(),
        }
    }
}

impl FloodMappingConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> SarResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SarResult<Self> {
        let path = path.as_ref();
        log::debug!("Loading flood mapping configuration from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> SarResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> SarResult<()> {
        if !self.water_threshold_db.is_finite() {
            return Err(SarError::Config(format!(
                "water_threshold_db must be finite, got {}",
                self.water_threshold_db
            )));
        }
        if !(self.pixel_spacing.is_finite() && self.pixel_spacing > 0.0) {
            return Err(SarError::Config(format!(
                "pixel_spacing must be positive, got {}",
                self.pixel_spacing
            )));
        }
        if !(self.spacing_tolerance.is_finite() && self.spacing_tolerance >= 0.0) {
            return Err(SarError::Config(format!(
                "spacing_tolerance must be non-negative, got {}",
                self.spacing_tolerance
            )));
        }
        if self.refined_lee.tile_rows == 0 {
            return Err(SarError::Config("refined_lee.tile_rows must be at least 1".to_string()));
        }
        if let Some(extent) = &self.study_area {
            if !(extent.min_x < extent.max_x && extent.min_y < extent.max_y) {
                return Err(SarError::Config(format!("study_area is degenerate: {:?}", extent)));
            }
        }
        Ok(())
    }

    fn change_detection_params(&self) -> ChangeDetectionParams {
        ChangeDetectionParams {
            threshold_db: self.water_threshold_db,
            study_area: self.study_area,
        }
    }
}

/// One epoch's input: a single-band dB raster and the dates it was drawn from
#[derive(Debug, Clone)]
pub struct EpochScene {
    pub backscatter: BackscatterRaster,
    pub window: Option<AcquisitionWindow>,
}

impl EpochScene {
    pub fn new(backscatter: BackscatterRaster) -> Self {
        Self {
            backscatter,
            window: None,
        }
    }

    pub fn with_window(backscatter: BackscatterRaster, window: AcquisitionWindow) -> Self {
        Self {
            backscatter,
            window: Some(window),
        }
    }
}

/// Outputs handed to export / visualisation
#[derive(Debug, Clone)]
pub struct FloodMappingProduct {
    /// Filtered reference epoch (dB)
    pub reference_db: BackscatterRaster,
    /// Filtered candidate epoch (dB)
    pub candidate_db: BackscatterRaster,
    pub persistent_water: ClassMask,
    pub flood_extent: ClassMask,
    pub geometry: GridGeometry,
    pub pixel_spacing: f64,
    pub statistics: FloodStatistics,
    pub reference_window: Option<AcquisitionWindow>,
    pub candidate_window: Option<AcquisitionWindow>,
}

/// Runs the full flood mapping chain
pub struct FloodMapper {
    config: FloodMappingConfig,
    filter: RefinedLeeFilter,
    detector: ChangeDetector,
}

impl FloodMapper {
    pub fn new(config: FloodMappingConfig) -> SarResult<Self> {
        config.validate()?;
        let filter = RefinedLeeFilter::with_params(config.refined_lee);
        let detector = ChangeDetector::new(config.change_detection_params())?;
        Ok(Self {
            config,
            filter,
            detector,
        })
    }

    pub fn config(&self) -> &FloodMappingConfig {
        &self.config
    }

    /// Map persistent water and flood extent between two epochs
    pub fn run(&self, reference: &EpochScene, candidate: &EpochScene) -> SarResult<FloodMappingProduct> {
        log::info!("Starting flood mapping");
        self.validate_inputs(reference, candidate)?;

        let (reference_db, candidate_db) = self.filter_epochs(&reference.backscatter, &candidate.backscatter)?;
        let detection = self.detector.detect(&reference_db, &candidate_db)?;

        log::info!(
            "Flood mapping complete: {:.0} units² flooded, {:.0} units² persistent water",
            detection.statistics.flood_area,
            detection.statistics.persistent_water_area
        );

        Ok(FloodMappingProduct {
            geometry: *reference_db.geometry(),
            pixel_spacing: self.config.pixel_spacing,
            reference_db,
            candidate_db,
            persistent_water: detection.persistent_water,
            flood_extent: detection.flood_extent,
            statistics: detection.statistics,
            reference_window: reference.window,
            candidate_window: candidate.window,
        })
    }

    /// dB -> linear -> Refined Lee -> dB
    pub fn filter_epoch(&self, scene_db: &BackscatterRaster) -> SarResult<BackscatterRaster> {
        let natural = to_natural(scene_db)?;
        let filtered = self.filter.apply_filter(&natural)?;

        if let (Some(before), Some(after)) = (
            equivalent_number_of_looks(&natural),
            equivalent_number_of_looks(&filtered),
        ) {
            log::debug!("Equivalent number of looks: {:.2} -> {:.2}", before, after);
        }

        to_db(&filtered)
    }

    #[cfg(feature = "parallel")]
    fn filter_epochs(
        &self,
        reference: &BackscatterRaster,
        candidate: &BackscatterRaster,
    ) -> SarResult<(BackscatterRaster, BackscatterRaster)> {
        let (reference_db, candidate_db) =
            rayon::join(|| self.filter_epoch(reference), || self.filter_epoch(candidate));
        Ok((reference_db?, candidate_db?))
    }

    #[cfg(not(feature = "parallel"))]
    fn filter_epochs(
        &self,
        reference: &BackscatterRaster,
        candidate: &BackscatterRaster,
    ) -> SarResult<(BackscatterRaster, BackscatterRaster)> {
        Ok((self.filter_epoch(reference)?, self.filter_epoch(candidate)?))
    }

    /// Preconditions checked before any pixel is processed
    fn validate_inputs(&self, reference: &EpochScene, candidate: &EpochScene) -> SarResult<()> {
        for (name, scene) in [("reference", reference), ("candidate", candidate)] {
            if scene.backscatter.unit() != BackscatterUnit::Decibel {
                return Err(SarError::InvalidParameter(format!(
                    "{} scene must be in dB, got {}",
                    name,
                    scene.backscatter.unit()
                )));
            }
            self.check_spacing(name, scene.backscatter.geometry())?;
        }

        reference
            .backscatter
            .geometry()
            .ensure_matches(candidate.backscatter.geometry(), "reference vs candidate scene")?;

        if let (Some(before), Some(after)) = (reference.window, candidate.window) {
            log::info!("Reference window {}, candidate window {}", before, after);
            if !before.precedes(&after) {
                log::warn!(
                    "Reference window {} does not end before candidate window {}",
                    before,
                    after
                );
            }
        }

        let geometry = reference.backscatter.geometry();
        log::debug!(
            "Input grid {}x{}, extent {:?}",
            geometry.rows,
            geometry.cols,
            geometry.extent()
        );
        Ok(())
    }

    fn check_spacing(&self, name: &str, geometry: &GridGeometry) -> SarResult<()> {
        let (dx, dy) = geometry.pixel_spacing();
        let expected = self.config.pixel_spacing;
        let tolerance = self.config.spacing_tolerance;
        if (dx - expected).abs() > tolerance || (dy - expected).abs() > tolerance {
            return Err(SarError::GeometryMismatch(format!(
                "{} scene pixel spacing {}x{} differs from configured {}",
                name, dx, dy, expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;
    use ndarray::Array2;

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config = FloodMappingConfig::from_json_str(r#"{ "water_threshold_db": -18.0 }"#).unwrap();
        assert_eq!(config.water_threshold_db, -18.0);
        assert_eq!(config.pixel_spacing, DEFAULT_PIXEL_SPACING);
        assert_eq!(config.refined_lee, RefinedLeeParams::default());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let mut config = FloodMappingConfig::default();
        config.refined_lee.tie_break = crate::core::direction::TieBreak::PreferAxisAligned;
        config.study_area = Some(Extent::new(0.0, 0.0, 100.0, 50.0).unwrap());

        let json = config.to_json().unwrap();
        assert!(json.contains("prefer_axis_aligned"));
        assert_eq!(FloodMappingConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            FloodMappingConfig::from_json_str(r#"{ "pixel_spacing": -10.0 }"#),
            Err(SarError::Config(_))
        ));
        assert!(matches!(
            FloodMappingConfig::from_json_str(r#"{ "refined_lee": { "tile_rows": 0 } }"#),
            Err(SarError::Config(_))
        ));
        assert!(matches!(
            FloodMappingConfig::from_json_str("{ not json"),
            Err(SarError::Json(_))
        ));
    }

    #[test]
    fn test_spacing_mismatch_fails_before_filtering() {
        let geometry = GridGeometry::new(4, 4, GeoTransform::north_up(0.0, 0.0, 20.0));
        let raster =
            BackscatterRaster::new(Array2::from_elem((4, 4), -12.0), geometry, BackscatterUnit::Decibel).unwrap();
        let scene = EpochScene::new(raster);

        let mapper = FloodMapper::new(FloodMappingConfig::default()).unwrap();
        assert!(matches!(mapper.run(&scene, &scene), Err(SarError::GeometryMismatch(_))));
    }
}
