//! Detection grid geometry.
//!
//! The detection frame is split into `rows x cols` equally sized cells,
//! addressed by a row-major linear index:
//!
//! ```text
//!        col 0   col 1   col 2  ...
//! row 0 [  0  ] [  1  ] [  2  ]
//! row 1 [cols ] [cols+1] ...
//! ```
//!
//! Cell sizes use integer division, so when the frame does not divide evenly
//! the rightmost and bottom slivers belong to no cell.

use serde::Serialize;

/// Pixel rectangle of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    rows: u32,
    cols: u32,
    width: u32,
    height: u32,
}

impl GridGeometry {
    /// Grid of `rows x cols` cells laid over a `width x height` image.
    pub fn new(rows: u32, cols: u32, width: u32, height: u32) -> Self {
        GridGeometry {
            rows,
            cols,
            width,
            height,
        }
    }

    pub fn cell_count(&self) -> u64 {
        self.rows as u64 * self.cols as u64
    }

    /// (width, height) of every cell.
    pub fn cell_size(&self) -> (u32, u32) {
        (
            self.width.checked_div(self.cols).unwrap_or(0),
            self.height.checked_div(self.rows).unwrap_or(0),
        )
    }

    /// (row, col) of a linear cell index, `None` if the grid has no such cell.
    pub fn row_col(&self, index: u32) -> Option<(u32, u32)> {
        if index as u64 >= self.cell_count() {
            return None;
        }
        Some((index / self.cols, index % self.cols))
    }

    /// Rectangle covered by the cell at `index`.
    pub fn cell(&self, index: u32) -> Option<CellRect> {
        let (row, col) = self.row_col(index)?;
        let (width, height) = self.cell_size();
        Some(CellRect {
            x: col * width,
            y: row * height,
            width,
            height,
        })
    }
}
