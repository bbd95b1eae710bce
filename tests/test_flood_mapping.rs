use approx::assert_abs_diff_eq;
use ndarray::Array2;
use sarflood::core::{EpochScene, FloodMapper, FloodMappingConfig};
use sarflood::types::{
    AcquisitionWindow, BackscatterRaster, BackscatterUnit, Extent, GeoTransform, GridGeometry, SarError,
    NODATA_CODE,
};
use std::io::Write;

const DRY_DB: f32 = -10.0;
const WATER_DB: f32 = -22.0;
const SIZE: usize = 32;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn geometry(rows: usize, cols: usize) -> GridGeometry {
    GridGeometry::new(rows, cols, GeoTransform::north_up(500000.0, 4000000.0, 10.0))
}

fn db_scene(data: Array2<f32>) -> EpochScene {
    let (rows, cols) = data.dim();
    let raster = BackscatterRaster::new(data, geometry(rows, cols), BackscatterUnit::Decibel)
        .expect("Failed to build raster");
    EpochScene::new(raster)
}

fn in_lake(i: usize, j: usize) -> bool {
    i < 10 && j < 10
}

fn in_flood(i: usize, j: usize) -> bool {
    (16..28).contains(&i) && (16..28).contains(&j)
}

/// Dry land with a permanent lake in the top-left corner
fn reference_scene() -> Array2<f32> {
    Array2::from_shape_fn((SIZE, SIZE), |(i, j)| if in_lake(i, j) { WATER_DB } else { DRY_DB })
}

/// Same lake plus a flooded block
fn candidate_scene() -> Array2<f32> {
    Array2::from_shape_fn((SIZE, SIZE), |(i, j)| {
        if in_lake(i, j) || in_flood(i, j) {
            WATER_DB
        } else {
            DRY_DB
        }
    })
}

#[test]
fn test_end_to_end_flood_mapping() {
    init_logging();

    let window_before = AcquisitionWindow::parse("2024-03-01", "2024-03-31").unwrap();
    let window_after = AcquisitionWindow::parse("2024-05-01", "2024-05-10").unwrap();
    let reference = EpochScene::with_window(db_scene(reference_scene()).backscatter, window_before);
    let candidate = EpochScene::with_window(db_scene(candidate_scene()).backscatter, window_after);

    let mapper = FloodMapper::new(FloodMappingConfig::default()).unwrap();
    let product = mapper.run(&reference, &candidate).expect("Flood mapping failed");

    // Interior of the lake: water in both epochs
    assert_eq!(product.persistent_water.get(3, 3), Some(true));
    assert_eq!(product.flood_extent.get(3, 3), Some(false));

    // Interior of the flooded block
    assert_eq!(product.flood_extent.get(22, 22), Some(true));
    assert_eq!(product.persistent_water.get(22, 22), Some(false));

    // Dry in both epochs
    assert_eq!(product.flood_extent.get(8, 24), Some(false));
    assert_eq!(product.persistent_water.get(8, 24), Some(false));

    // Homogeneous areas come back at their input level
    assert_abs_diff_eq!(product.reference_db.value(20, 5).unwrap(), DRY_DB, epsilon = 1e-4);
    assert_abs_diff_eq!(product.candidate_db.value(22, 22).unwrap(), WATER_DB, epsilon = 1e-4);
    assert_eq!(product.reference_db.unit(), BackscatterUnit::Decibel);

    let stats = &product.statistics;
    assert_eq!(stats.total_pixels, SIZE * SIZE);
    assert_eq!(stats.valid_pixels, SIZE * SIZE);
    assert!(stats.flood_pixels >= 36);
    assert!(stats.persistent_water_pixels >= 49);
    assert_eq!(stats.pixel_area, 100.0);
    assert_eq!(stats.flood_area, stats.flood_pixels as f64 * 100.0);

    assert_eq!(product.reference_window, Some(window_before));
    assert_eq!(product.candidate_window, Some(window_after));
    assert_eq!(product.pixel_spacing, 10.0);
}

#[test]
fn test_masked_pixels_are_nodata_in_both_masks() {
    init_logging();

    let mut reference = reference_scene();
    reference[[20, 5]] = f32::NAN;
    let mut candidate = candidate_scene();
    candidate[[22, 22]] = f32::NAN;

    let mapper = FloodMapper::new(FloodMappingConfig::default()).unwrap();
    let product = mapper.run(&db_scene(reference), &db_scene(candidate)).unwrap();

    for (i, j) in [(20, 5), (22, 22)] {
        assert_eq!(product.persistent_water.get(i, j), None);
        assert_eq!(product.flood_extent.get(i, j), None);
        assert_eq!(product.flood_extent.to_codes()[[i, j]], NODATA_CODE);
    }
    assert_eq!(product.statistics.valid_pixels, SIZE * SIZE - 2);

    // Neighbours of the hole are still classified
    assert_eq!(product.flood_extent.get(22, 23), Some(true));
}

#[test]
fn test_grid_mismatch_fails_before_filtering() {
    let mapper = FloodMapper::new(FloodMappingConfig::default()).unwrap();
    let reference = db_scene(reference_scene());
    let candidate = db_scene(Array2::from_elem((SIZE, SIZE - 1), DRY_DB));

    let result = mapper.run(&reference, &candidate);
    assert!(matches!(result, Err(SarError::GeometryMismatch(_))));
}

#[test]
fn test_linear_input_rejected() {
    let mapper = FloodMapper::new(FloodMappingConfig::default()).unwrap();
    let linear = BackscatterRaster::new(
        Array2::from_elem((SIZE, SIZE), 0.1),
        geometry(SIZE, SIZE),
        BackscatterUnit::Linear,
    )
    .unwrap();
    let reference = db_scene(reference_scene());

    let result = mapper.run(&reference, &EpochScene::new(linear));
    assert!(matches!(result, Err(SarError::InvalidParameter(_))));
}

#[test]
fn test_study_area_limits_classification() {
    init_logging();

    // Left half of the grid only (x from 500000 to 500160)
    let mut config = FloodMappingConfig::default();
    config.study_area = Some(Extent::new(500000.0, 3999680.0, 500160.0, 4000000.0).unwrap());

    let mapper = FloodMapper::new(config).unwrap();
    let product = mapper
        .run(&db_scene(reference_scene()), &db_scene(candidate_scene()))
        .unwrap();

    assert_eq!(product.persistent_water.get(3, 3), Some(true));
    assert_eq!(product.flood_extent.get(22, 22), None);
    for i in 0..SIZE {
        for j in SIZE / 2..SIZE {
            assert_eq!(product.flood_extent.get(i, j), None);
        }
    }
    assert_eq!(product.statistics.valid_pixels, SIZE * SIZE / 2);
}

#[test]
fn test_threshold_from_config_file() {
    init_logging();

    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    writeln!(
        file,
        r#"{{
            "water_threshold_db": -25.0,
            "refined_lee": {{ "tie_break": "prefer_axis_aligned", "tile_rows": 8 }}
        }}"#
    )
    .unwrap();

    let config = FloodMappingConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.water_threshold_db, -25.0);
    assert_eq!(config.refined_lee.tile_rows, 8);

    // -22 dB is no longer below the threshold
    let mapper = FloodMapper::new(config).unwrap();
    let product = mapper
        .run(&db_scene(reference_scene()), &db_scene(candidate_scene()))
        .unwrap();
    assert_eq!(product.statistics.flood_pixels, 0);
    assert_eq!(product.statistics.persistent_water_pixels, 0);
}

#[test]
fn test_missing_config_file() {
    let result = FloodMappingConfig::from_json_file("/nonexistent/sarflood.json");
    assert!(matches!(result, Err(SarError::Io(_))));
}
