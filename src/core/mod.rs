//! Core speckle filtering and flood mapping modules

pub mod units;
pub mod kernels;
pub mod neighborhood;
pub mod direction;
pub mod directional_stats;
pub mod tiling;
pub mod speckle_filter;
pub mod change_detection;
pub mod flood_mapping;

// Re-export main types
pub use units::{to_natural, to_db, db_to_linear, linear_to_db};
pub use kernels::{Kernel, Orientation, WindowShape};
pub use neighborhood::{neighborhood_stats, reduce_neighborhood, NeighborhoodStats, Reducer};
pub use direction::{select_directions, DirectionField, TieBreak};
pub use directional_stats::{directional_statistics, DirectionalStats};
pub use tiling::{TilePlan, RowTile, REFINED_LEE_HALO};
pub use speckle_filter::{RefinedLeeFilter, RefinedLeeParams, RefinedLeeOutput, lee_estimate, equivalent_number_of_looks};
pub use change_detection::{ChangeDetector, ChangeDetectionParams, ChangeDetectionResult, FloodStatistics, DEFAULT_WATER_THRESHOLD_DB};
pub use flood_mapping::{FloodMapper, FloodMappingConfig, FloodMappingProduct, EpochScene};
