//! Neighbourhood kernels for the Refined Lee filter
//!
//! Offsets are `(row, col)` relative to the kernel anchor, rows increasing downwards.

use crate::types::{SarError, SarResult};

/// Cell offset relative to the kernel anchor
pub type Offset = (isize, isize);

/// 3x3 boxcar window
pub const BOX_3X3: [Offset; 9] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1), (0, 0), (0, 1),
    (1, -1), (1, 0), (1, 1),
];

/// Centres of the nine 3x3 sub-windows sampled inside a 7x7 neighbourhood, row-major
pub const SAMPLE_OFFSETS: [Offset; 9] = [
    (-2, -2), (-2, 0), (-2, 2),
    (0, -2), (0, 0), (0, 2),
    (2, -2), (2, 0), (2, 2),
];

/// Cells in every directional window (both shapes cover 28 of the 49 cells)
pub const WINDOW_CELLS: usize = 28;

/// Largest reach of any directional window
pub const WINDOW_RADIUS: usize = 3;

pub type DirectionalWindow = [Offset; WINDOW_CELLS];

/// Base shape of a directional window before rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowShape {
    /// Anchor row and the three rows below it
    Rectangular,
    /// Lower-left triangle including the main diagonal
    Diagonal,
}

/// One of the eight edge-aligned windows, named after the side of the anchor it covers.
///
/// The discriminant is the direction label produced by the gradient selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Orientation {
    Below = 1,
    BelowLeft = 2,
    Left = 3,
    AboveLeft = 4,
    Above = 5,
    AboveRight = 6,
    Right = 7,
    BelowRight = 8,
}

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Orientation::Below,
        Orientation::BelowLeft,
        Orientation::Left,
        Orientation::AboveLeft,
        Orientation::Above,
        Orientation::AboveRight,
        Orientation::Right,
        Orientation::BelowRight,
    ];

    /// Orientation for direction label 1..=8
    pub fn from_label(label: u8) -> Option<Self> {
        match label {
            1..=8 => Some(Self::ALL[label as usize - 1]),
            _ => None,
        }
    }

    pub fn label(self) -> u8 {
        self as u8
    }

    pub fn shape(self) -> WindowShape {
        if self.label() % 2 == 1 {
            WindowShape::Rectangular
        } else {
            WindowShape::Diagonal
        }
    }

    /// Clockwise quarter turns applied to the base shape
    pub fn quarter_turns(self) -> u8 {
        (self.label() - 1) / 2
    }

    pub fn window(self) -> &'static DirectionalWindow {
        &DIRECTIONAL_WINDOWS[self.label() as usize - 1]
    }
}

const fn build_window(diagonal: bool, quarter_turns: u8) -> DirectionalWindow {
    let mut cells = [(0isize, 0isize); WINDOW_CELLS];
    let mut n = 0;
    let mut row: isize = -3;
    while row <= 3 {
        let mut col: isize = -3;
        while col <= 3 {
            let inside = if diagonal { row >= col } else { row >= 0 };
            if inside {
                let (mut r, mut c) = (row, col);
                let mut turn = 0;
                while turn < quarter_turns {
                    // clockwise: (r, c) -> (c, -r)
                    let previous_row = r;
                    r = c;
                    c = -previous_row;
                    turn += 1;
                }
                cells[n] = (r, c);
                n += 1;
            }
            col += 1;
        }
        row += 1;
    }
    cells
}

/// Indexed by `label - 1`
static DIRECTIONAL_WINDOWS: [DirectionalWindow; 8] = [
    build_window(false, 0),
    build_window(true, 0),
    build_window(false, 1),
    build_window(true, 1),
    build_window(false, 2),
    build_window(true, 2),
    build_window(false, 3),
    build_window(true, 3),
];

/// Weighted neighbourhood definition anchored at its centre cell
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    cells: Vec<(Offset, f64)>,
    radius: usize,
}

impl Kernel {
    /// Square kernel of ones; `size` must be odd
    pub fn boxcar(size: usize) -> SarResult<Self> {
        if size == 0 || size % 2 == 0 {
            return Err(SarError::InvalidParameter(format!(
                "Kernel size must be odd, got {}",
                size
            )));
        }
        let half = (size / 2) as isize;
        let offsets: Vec<Offset> = (-half..=half)
            .flat_map(|r| (-half..=half).map(move |c| (r, c)))
            .collect();
        Ok(Self::from_offsets(&offsets))
    }

    /// Indicator kernel over the given offsets
    pub fn from_offsets(offsets: &[Offset]) -> Self {
        let cells: Vec<(Offset, f64)> = offsets.iter().map(|&o| (o, 1.0)).collect();
        let radius = Self::reach(&cells);
        Self { cells, radius }
    }

    /// Kernel from a row-major weight grid anchored at (anchor_row, anchor_col).
    /// Zero-weight cells are dropped.
    pub fn fixed(weights: &[Vec<f64>], anchor_row: usize, anchor_col: usize) -> SarResult<Self> {
        let width = weights.first().map(|r| r.len()).unwrap_or(0);
        if weights.is_empty() || width == 0 {
            return Err(SarError::InvalidParameter("Kernel weights are empty".to_string()));
        }
        if weights.iter().any(|r| r.len() != width) {
            return Err(SarError::InvalidParameter(
                "Kernel weight rows have inconsistent lengths".to_string(),
            ));
        }
        if anchor_row >= weights.len() || anchor_col >= width {
            return Err(SarError::InvalidParameter(format!(
                "Kernel anchor ({}, {}) lies outside the {}x{} grid",
                anchor_row,
                anchor_col,
                weights.len(),
                width
            )));
        }

        let mut cells = Vec::new();
        for (r, row) in weights.iter().enumerate() {
            for (c, &w) in row.iter().enumerate() {
                if !w.is_finite() || w < 0.0 {
                    return Err(SarError::InvalidParameter(format!(
                        "Kernel weight at ({}, {}) must be finite and non-negative, got {}",
                        r, c, w
                    )));
                }
                if w > 0.0 {
                    let offset = (r as isize - anchor_row as isize, c as isize - anchor_col as isize);
                    cells.push((offset, w));
                }
            }
        }
        if cells.is_empty() {
            return Err(SarError::InvalidParameter("Kernel has no non-zero weights".to_string()));
        }

        let radius = Self::reach(&cells);
        Ok(Self { cells, radius })
    }

    /// Indicator kernel of a directional window
    pub fn directional(orientation: Orientation) -> Self {
        Self::from_offsets(orientation.window())
    }

    pub fn cells(&self) -> &[(Offset, f64)] {
        &self.cells
    }

    /// Largest row or column distance from the anchor
    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn reach(cells: &[(Offset, f64)]) -> usize {
        cells
            .iter()
            .map(|&((r, c), _)| r.unsigned_abs().max(c.unsigned_abs()))
            .max()
            .unwrap_or(0)
    }
}
