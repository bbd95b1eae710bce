//! sarflood: Refined Lee speckle filtering and change-detection flood mapping
//!
//! Filters a "normal" and a "flood" Sentinel-1 backscatter scene with an
//! edge-aligned Refined Lee filter and thresholds both to derive persistent
//! water and flood extent masks.

pub mod types;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    AcquisitionWindow, BackscatterRaster, BackscatterUnit, ClassMask, Extent, GeoTransform, GridGeometry,
    SarError, SarReal, SarRealImage, SarResult, ValidityMask,
};

pub use crate::core::{
    ChangeDetector, EpochScene, FloodMapper, FloodMappingConfig, FloodMappingProduct, RefinedLeeFilter,
    RefinedLeeParams, TieBreak,
};
