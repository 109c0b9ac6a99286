//! 3×3 voltage grid
//!
//! Cell `(row, col)` always refers to the same physical target of the
//! calibration plate: row 0 is the top row, column 0 the left column.

use lasertrace_core::VoltagePoint;
use serde::{Deserialize, Serialize};

/// Voltage pair per calibration target
///
/// Serialized as a `[3][3][2]` nested array.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoordinateGrid {
    cells: [[VoltagePoint; 3]; 3],
}

impl CoordinateGrid {
    /// All cells at 0 V
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid from explicit cells
    pub fn from_cells(cells: [[VoltagePoint; 3]; 3]) -> Self {
        Self { cells }
    }

    /// Edge cells from the two operator confirmed corners
    ///
    /// The top-left confirmation fixes the X voltage of the left column and
    /// the Y voltage of the top row; bottom-right fixes the right column and
    /// the bottom row. The middle row and column are left for
    /// [`interpolated`](Self::interpolated).
    pub fn from_corners(top_left: VoltagePoint, bottom_right: VoltagePoint) -> Self {
        let mut grid = Self::new();
        for k in 0..3 {
            grid.cells[k][0].x = top_left.x;
            grid.cells[k][2].x = bottom_right.x;
            grid.cells[0][k].y = top_left.y;
            grid.cells[2][k].y = bottom_right.y;
        }
        grid
    }

    /// Cell value
    pub fn get(&self, row: usize, col: usize) -> VoltagePoint {
        self.cells[row][col]
    }

    /// Overwrite a cell
    pub fn set(&mut self, row: usize, col: usize, value: VoltagePoint) {
        self.cells[row][col] = value;
    }

    /// Raw cells
    pub fn cells(&self) -> &[[VoltagePoint; 3]; 3] {
        &self.cells
    }

    /// Cells in row-major order with their indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, VoltagePoint)> + '_ {
        (0..3).flat_map(move |r| (0..3).map(move |c| (r, c, self.cells[r][c])))
    }

    /// Fill row 1 and then column 1 with midpoints of their neighbours
    ///
    /// Column 1 is computed from the already interpolated row 1, so the
    /// centre cell is the midpoint of the interpolated left and right cells.
    pub fn interpolated(&self) -> Self {
        let mut cells = self.cells;
        for col in 0..3 {
            cells[1][col] = VoltagePoint::midpoint(cells[0][col], cells[2][col]);
        }
        for row in cells.iter_mut() {
            row[1] = VoltagePoint::midpoint(row[0], row[2]);
        }
        Self { cells }
    }

    /// Every voltage is a finite number
    pub fn is_finite(&self) -> bool {
        self.iter().all(|(_, _, p)| p.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_rows_then_columns() {
        let mut grid = CoordinateGrid::new();
        for col in 0..3 {
            grid.set(0, col, VoltagePoint::new(1.0, 1.0));
            grid.set(2, col, VoltagePoint::new(3.0, 3.0));
        }
        let grid = grid.interpolated();
        for col in 0..3 {
            assert_eq!(grid.get(1, col), VoltagePoint::new(2.0, 2.0));
        }
    }

    #[test]
    fn test_center_uses_interpolated_row() {
        let mut grid = CoordinateGrid::new();
        grid.set(0, 0, VoltagePoint::new(0.0, 0.0));
        grid.set(2, 0, VoltagePoint::new(0.0, 4.0));
        grid.set(0, 2, VoltagePoint::new(8.0, 0.0));
        grid.set(2, 2, VoltagePoint::new(8.0, 4.0));
        let grid = grid.interpolated();
        assert_eq!(grid.get(1, 0), VoltagePoint::new(0.0, 2.0));
        assert_eq!(grid.get(1, 2), VoltagePoint::new(8.0, 2.0));
        assert_eq!(grid.get(1, 1), VoltagePoint::new(4.0, 2.0));
    }

    #[test]
    fn test_corners_give_regular_grid() {
        let grid =
            CoordinateGrid::from_corners(VoltagePoint::new(-1.0, -1.0), VoltagePoint::new(1.0, 1.0))
                .interpolated();
        for (row, col, p) in grid.iter() {
            assert_eq!(p, VoltagePoint::new(col as f64 - 1.0, row as f64 - 1.0));
        }
    }

    #[test]
    fn test_serialized_shape() {
        let grid = CoordinateGrid::from_corners(VoltagePoint::new(-1.0, -1.0), VoltagePoint::new(1.0, 1.0));
        let json = serde_json::to_value(grid).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 3);
        assert_eq!(json[0][0], serde_json::json!([-1.0, -1.0]));
    }
}
