use chrono::NaiveDate;
use ndarray::{s, Array2, Zip};
use serde::{Deserialize, Serialize};

/// Real-valued backscatter sample
pub type SarReal = f32;

/// 2D real SAR data array (rows x cols)
pub type SarRealImage = Array2<SarReal>;

/// Per-pixel validity (true = observed, false = masked / nodata)
pub type ValidityMask = Array2<bool>;

/// Radiometric unit of a backscatter raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackscatterUnit {
    /// Linear ("natural") power
    Linear,
    /// Decibels, 10 * log10(power)
    Decibel,
}

impl std::fmt::Display for BackscatterUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackscatterUnit::Linear => write!(f, "linear"),
            BackscatterUnit::Decibel => write!(f, "dB"),
        }
    }
}

/// Geospatial transformation parameters (GDAL layout)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform with square pixels of `pixel_size` map units
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_size: f64) -> Self {
        Self {
            top_left_x,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }

    /// Create from GDAL coefficients [x0, dx, rx, y0, ry, dy]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            top_left_x: coeffs[0],
            pixel_width: coeffs[1],
            rotation_x: coeffs[2],
            top_left_y: coeffs[3],
            rotation_y: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Map coordinates of the centre of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let c = col as f64 + 0.5;
        let r = row as f64 + 0.5;
        let x = self.top_left_x + c * self.pixel_width + r * self.rotation_x;
        let y = self.top_left_y + c * self.rotation_y + r * self.pixel_height;
        (x, y)
    }

    /// Map coordinates of the top-left corner of pixel (row, col)
    pub fn pixel_corner(&self, row: usize, col: usize) -> (f64, f64) {
        let c = col as f64;
        let r = row as f64;
        let x = self.top_left_x + c * self.pixel_width + r * self.rotation_x;
        let y = self.top_left_y + c * self.rotation_y + r * self.pixel_height;
        (x, y)
    }

    /// Coefficient-wise comparison with an absolute tolerance
    pub fn approx_eq(&self, other: &GeoTransform, tolerance: f64) -> bool {
        self.to_gdal()
            .iter()
            .zip(other.to_gdal().iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

/// Axis-aligned region in map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> SarResult<Self> {
        if !(min_x < max_x && min_y < max_y) {
            return Err(SarError::InvalidParameter(format!(
                "Degenerate extent [{}, {}, {}, {}]",
                min_x, min_y, max_x, max_y
            )));
        }
        Ok(Self { min_x, min_y, max_x, max_y })
    }

    /// Inclusive containment test
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Tolerance used when comparing grid transforms
pub const GEOMETRY_TOLERANCE: f64 = 1e-6;

/// Pixel grid of a raster: dimensions plus georeferencing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
}

impl GridGeometry {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform) -> Self {
        Self { rows, cols, transform }
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn pixel_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Absolute pixel size (x, y) in map units
    pub fn pixel_spacing(&self) -> (f64, f64) {
        (self.transform.pixel_width.abs(), self.transform.pixel_height.abs())
    }

    /// Ground area covered by one pixel
    pub fn pixel_area(&self) -> f64 {
        let (dx, dy) = self.pixel_spacing();
        dx * dy
    }

    /// Bounding extent of the grid (from its four outer corners)
    pub fn extent(&self) -> Extent {
        let corners = [
            self.transform.pixel_corner(0, 0),
            self.transform.pixel_corner(0, self.cols),
            self.transform.pixel_corner(self.rows, 0),
            self.transform.pixel_corner(self.rows, self.cols),
        ];
        let mut extent = Extent {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            extent.min_x = extent.min_x.min(x);
            extent.min_y = extent.min_y.min(y);
            extent.max_x = extent.max_x.max(x);
            extent.max_y = extent.max_y.max(y);
        }
        extent
    }

    /// Geometry of the row band [row_start, row_end)
    pub fn row_band(&self, row_start: usize, row_end: usize) -> GridGeometry {
        let (x, y) = self.transform.pixel_corner(row_start, 0);
        GridGeometry {
            rows: row_end - row_start,
            cols: self.cols,
            transform: GeoTransform {
                top_left_x: x,
                top_left_y: y,
                ..self.transform
            },
        }
    }

    /// Fail unless `other` describes exactly the same pixel grid
    pub fn ensure_matches(&self, other: &GridGeometry, context: &str) -> SarResult<()> {
        if self.dim() != other.dim() {
            return Err(SarError::GeometryMismatch(format!(
                "{}: grid {}x{} does not match {}x{}",
                context, self.rows, self.cols, other.rows, other.cols
            )));
        }
        if !self.transform.approx_eq(&other.transform, GEOMETRY_TOLERANCE) {
            return Err(SarError::GeometryMismatch(format!(
                "{}: geotransform {:?} does not match {:?}",
                context,
                self.transform.to_gdal(),
                other.transform.to_gdal()
            )));
        }
        Ok(())
    }
}

/// Single-band backscatter raster with validity mask
#[derive(Debug, Clone, PartialEq)]
pub struct BackscatterRaster {
    data: SarRealImage,
    valid: ValidityMask,
    geometry: GridGeometry,
    unit: BackscatterUnit,
}

impl BackscatterRaster {
    /// Wrap `data`; every non-finite sample is treated as masked
    pub fn new(data: SarRealImage, geometry: GridGeometry, unit: BackscatterUnit) -> SarResult<Self> {
        let valid = data.mapv(|v| v.is_finite());
        Self::with_mask(data, valid, geometry, unit)
    }

    /// Wrap `data` with an explicit validity mask (non-finite samples are masked regardless)
    pub fn with_mask(
        data: SarRealImage,
        valid: ValidityMask,
        geometry: GridGeometry,
        unit: BackscatterUnit,
    ) -> SarResult<Self> {
        if data.dim() != geometry.dim() {
            return Err(SarError::GeometryMismatch(format!(
                "Data shape {:?} does not match grid {}x{}",
                data.dim(),
                geometry.rows,
                geometry.cols
            )));
        }
        if valid.dim() != data.dim() {
            return Err(SarError::GeometryMismatch(format!(
                "Mask shape {:?} does not match data shape {:?}",
                valid.dim(),
                data.dim()
            )));
        }
        Ok(Self::from_parts(data, valid, geometry, unit))
    }

    /// Wrap `data`, masking every sample equal to the `nodata` sentinel
    pub fn from_nodata(
        data: SarRealImage,
        nodata: SarReal,
        geometry: GridGeometry,
        unit: BackscatterUnit,
    ) -> SarResult<Self> {
        let valid = data.mapv(|v| v != nodata);
        Self::with_mask(data, valid, geometry, unit)
    }

    /// Masked samples are normalised to NaN
    pub(crate) fn from_parts(
        mut data: SarRealImage,
        mut valid: ValidityMask,
        geometry: GridGeometry,
        unit: BackscatterUnit,
    ) -> Self {
        Zip::from(&mut data).and(&mut valid).for_each(|v, ok| {
            *ok = *ok && v.is_finite();
            if !*ok {
                *v = SarReal::NAN;
            }
        });
        Self { data, valid, geometry, unit }
    }

    pub fn data(&self) -> &SarRealImage {
        &self.data
    }

    pub fn valid(&self) -> &ValidityMask {
        &self.valid
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn unit(&self) -> BackscatterUnit {
        self.unit
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Sample at (row, col), `None` when masked or out of bounds
    pub fn value(&self, row: usize, col: usize) -> Option<SarReal> {
        match self.valid.get((row, col)) {
            Some(true) => Some(self.data[[row, col]]),
            _ => None,
        }
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&ok| ok).count()
    }

    /// Copy of the row band [row_start, row_end)
    pub fn row_band(&self, row_start: usize, row_end: usize) -> BackscatterRaster {
        Self {
            data: self.data.slice(s![row_start..row_end, ..]).to_owned(),
            valid: self.valid.slice(s![row_start..row_end, ..]).to_owned(),
            geometry: self.geometry.row_band(row_start, row_end),
            unit: self.unit,
        }
    }

    pub fn into_parts(self) -> (SarRealImage, ValidityMask, GridGeometry, BackscatterUnit) {
        (self.data, self.valid, self.geometry, self.unit)
    }
}

/// Export code for a class pixel
pub const CLASS_CODE: u8 = 1;
/// Export code for a valid pixel outside the class
pub const BACKGROUND_CODE: u8 = 0;
/// Export code for a masked pixel
pub const NODATA_CODE: u8 = 255;

/// Boolean classification raster (e.g. flood extent) with validity mask
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMask {
    class: Array2<bool>,
    valid: ValidityMask,
    geometry: GridGeometry,
}

impl ClassMask {
    /// Masked pixels are forced to `false` in the class raster
    pub fn new(mut class: Array2<bool>, valid: ValidityMask, geometry: GridGeometry) -> SarResult<Self> {
        if class.dim() != geometry.dim() || valid.dim() != geometry.dim() {
            return Err(SarError::GeometryMismatch(format!(
                "Class mask {:?} / validity {:?} do not match grid {}x{}",
                class.dim(),
                valid.dim(),
                geometry.rows,
                geometry.cols
            )));
        }
        Zip::from(&mut class).and(&valid).for_each(|c, &ok| *c = *c && ok);
        Ok(Self { class, valid, geometry })
    }

    pub fn class(&self) -> &Array2<bool> {
        &self.class
    }

    pub fn valid(&self) -> &ValidityMask {
        &self.valid
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// `Some(in_class)` for valid pixels, `None` for masked or out-of-bounds ones
    pub fn get(&self, row: usize, col: usize) -> Option<bool> {
        match self.valid.get((row, col)) {
            Some(true) => Some(self.class[[row, col]]),
            _ => None,
        }
    }

    pub fn class_count(&self) -> usize {
        self.class.iter().filter(|&&c| c).count()
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&ok| ok).count()
    }

    /// u8 raster for export: CLASS_CODE, BACKGROUND_CODE or NODATA_CODE
    pub fn to_codes(&self) -> Array2<u8> {
        Zip::from(&self.class).and(&self.valid).map_collect(|&c, &ok| {
            if !ok {
                NODATA_CODE
            } else if c {
                CLASS_CODE
            } else {
                BACKGROUND_CODE
            }
        })
    }
}

/// Date window an epoch's scenes were selected from (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AcquisitionWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> SarResult<Self> {
        if end < start {
            return Err(SarError::InvalidParameter(format!(
                "Acquisition window ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse from two ISO-8601 dates (YYYY-MM-DD)
    pub fn parse(start: &str, end: &str) -> SarResult<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| SarError::InvalidParameter(format!("Invalid date '{}': {}", s, e)))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// True when this window ends strictly before `other` begins
    pub fn precedes(&self, other: &AcquisitionWindow) -> bool {
        self.end < other.start
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl std::fmt::Display for AcquisitionWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Error types for flood mapping
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for flood mapping operations
pub type SarResult<T> = Result<T, SarError>;
