//! Python bindings (`python` feature)

use crate::core::flood_mapping::{EpochScene, FloodMapper, FloodMappingConfig};
use crate::core::speckle_filter::{RefinedLeeFilter, RefinedLeeParams};
use crate::core::units;
use crate::core::direction::TieBreak;
use crate::types::{BackscatterRaster, BackscatterUnit, GeoTransform, GridGeometry, SarError};
use numpy::{PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

fn to_py_err(e: SarError) -> PyErr {
    match e {
        SarError::InvalidParameter(_) | SarError::GeometryMismatch(_) | SarError::Config(_) => {
            PyValueError::new_err(format!("{}", e))
        }
        _ => PyRuntimeError::new_err(format!("{}", e)),
    }
}

fn parse_tie_break(tie_break: Option<String>) -> PyResult<TieBreak> {
    match tie_break.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("sum_labels") => Ok(TieBreak::SumLabels),
        Some("prefer_axis_aligned") => Ok(TieBreak::PreferAxisAligned),
        Some(other) => Err(PyValueError::new_err(format!("Unknown tie break: {}", other))),
    }
}

/// Wrap a numpy array on an anonymous north-up grid
fn raster_from_numpy(
    values: PyReadonlyArray2<f32>,
    pixel_spacing: f64,
    unit: BackscatterUnit,
) -> PyResult<BackscatterRaster> {
    let array = values.as_array().to_owned();
    let (rows, cols) = array.dim();
    let geometry = GridGeometry::new(rows, cols, GeoTransform::north_up(0.0, 0.0, pixel_spacing));
    BackscatterRaster::new(array, geometry, unit).map_err(to_py_err)
}

/// Convert dB values to linear power (NaN = masked)
#[pyfunction]
fn convert_to_natural(py: Python, values: PyReadonlyArray2<f32>) -> PyResult<PyObject> {
    let raster = raster_from_numpy(values, 1.0, BackscatterUnit::Decibel)?;
    let natural = units::to_natural(&raster).map_err(to_py_err)?;
    Ok(natural.data().to_pyarray(py).into())
}

/// Convert linear power to dB (non-positive power becomes NaN)
#[pyfunction]
fn convert_to_db(py: Python, values: PyReadonlyArray2<f32>) -> PyResult<PyObject> {
    let raster = raster_from_numpy(values, 1.0, BackscatterUnit::Linear)?;
    let db = units::to_db(&raster).map_err(to_py_err)?;
    Ok(db.data().to_pyarray(py).into())
}

/// Refined Lee filter on a linear-power image
#[pyfunction]
fn refined_lee_filter(
    py: Python,
    image: PyReadonlyArray2<f32>,
    tie_break: Option<String>,
    tile_rows: Option<usize>,
) -> PyResult<PyObject> {
    let params = RefinedLeeParams {
        tie_break: parse_tie_break(tie_break)?,
        tile_rows: tile_rows.unwrap_or(RefinedLeeParams::default().tile_rows),
    };
    let raster = raster_from_numpy(image, 1.0, BackscatterUnit::Linear)?;
    let output = RefinedLeeFilter::with_params(params)
        .apply_filter_with_diagnostics(&raster)
        .map_err(to_py_err)?;

    let result = PyDict::new(py);
    result.set_item("filtered", output.estimate.data().to_pyarray(py))?;
    result.set_item("directions", output.directions.to_pyarray(py))?;
    result.set_item("sigma_v", output.sigma_v.to_pyarray(py))?;
    result.set_item("fallback_pixels", output.fallback_pixels)?;
    Ok(result.into())
}

/// Full flood mapping on two dB images of the same grid
#[pyfunction]
fn map_flood_extent(
    py: Python,
    reference_db: PyReadonlyArray2<f32>,
    candidate_db: PyReadonlyArray2<f32>,
    threshold_db: Option<f32>,
    pixel_spacing: Option<f64>,
    tie_break: Option<String>,
) -> PyResult<PyObject> {
    let mut config = FloodMappingConfig::default();
    if let Some(threshold) = threshold_db {
        config.water_threshold_db = threshold;
    }
    if let Some(spacing) = pixel_spacing {
        config.pixel_spacing = spacing;
    }
    config.refined_lee.tie_break = parse_tie_break(tie_break)?;

    let reference = raster_from_numpy(reference_db, config.pixel_spacing, BackscatterUnit::Decibel)?;
    let candidate = raster_from_numpy(candidate_db, config.pixel_spacing, BackscatterUnit::Decibel)?;

    let mapper = FloodMapper::new(config).map_err(to_py_err)?;
    let product = mapper
        .run(&EpochScene::new(reference), &EpochScene::new(candidate))
        .map_err(to_py_err)?;

    let result = PyDict::new(py);
    result.set_item("reference_filtered_db", product.reference_db.data().to_pyarray(py))?;
    result.set_item("candidate_filtered_db", product.candidate_db.data().to_pyarray(py))?;
    result.set_item("persistent_water", product.persistent_water.to_codes().to_pyarray(py))?;
    result.set_item("flood_extent", product.flood_extent.to_codes().to_pyarray(py))?;
    result.set_item("flood_pixels", product.statistics.flood_pixels)?;
    result.set_item("persistent_water_pixels", product.statistics.persistent_water_pixels)?;
    result.set_item("flood_area", product.statistics.flood_area)?;
    result.set_item("flood_percentage", product.statistics.flood_percentage)?;
    Ok(result.into())
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(convert_to_natural, m)?)?;
    m.add_function(wrap_pyfunction!(convert_to_db, m)?)?;
    m.add_function(wrap_pyfunction!(refined_lee_filter, m)?)?;
    m.add_function(wrap_pyfunction!(map_flood_extent, m)?)?;
    Ok(())
}
