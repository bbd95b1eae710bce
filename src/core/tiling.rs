//! Row-band tiling with a read halo for neighbourhood pipelines
//!
//! Each tile owns the output rows `[start, end)` and reads the rows
//! `[halo_start, halo_end)`, i.e. up to `halo` extra rows on each side. When the
//! halo covers the full reach of a pipeline, filtering tile by tile gives the same
//! result as filtering the whole raster at once.

use crate::types::{SarError, SarResult};

/// Reach of the Refined Lee pipeline: 1 (3x3 stats) + 2 (sample offsets),
/// and 3 for the 7x7 directional windows
pub const REFINED_LEE_HALO: usize = 3;

/// Rows owned and read by one tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowTile {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub halo_start: usize,
    pub halo_end: usize,
}

impl RowTile {
    /// Owned rows
    pub fn rows(&self) -> usize {
        self.end - self.start
    }

    /// Rows read, halo included
    pub fn read_rows(&self) -> usize {
        self.halo_end - self.halo_start
    }

    /// Position of the first owned row inside the read band
    pub fn core_offset(&self) -> usize {
        self.start - self.halo_start
    }
}

/// Partition of a raster's rows into haloed bands
#[derive(Debug, Clone)]
pub struct TilePlan {
    tiles: Vec<RowTile>,
    total_rows: usize,
    halo: usize,
}

impl TilePlan {
    pub fn new(total_rows: usize, tile_rows: usize, halo: usize) -> SarResult<Self> {
        if tile_rows == 0 {
            return Err(SarError::InvalidParameter(
                "Tile height must be at least one row".to_string(),
            ));
        }

        let tiles = (0..total_rows)
            .step_by(tile_rows)
            .enumerate()
            .map(|(index, start)| {
                let end = (start + tile_rows).min(total_rows);
                RowTile {
                    index,
                    start,
                    end,
                    halo_start: start.saturating_sub(halo),
                    halo_end: (end + halo).min(total_rows),
                }
            })
            .collect();

        Ok(Self {
            tiles,
            total_rows,
            halo,
        })
    }

    pub fn tiles(&self) -> &[RowTile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn halo(&self) -> usize {
        self.halo
    }

    /// Rows read across all tiles relative to the raster height
    pub fn read_amplification(&self) -> f64 {
        if self.total_rows == 0 {
            return 1.0;
        }
        let read: usize = self.tiles.iter().map(|t| t.read_rows()).sum();
        read as f64 / self.total_rows as f64
    }
}
