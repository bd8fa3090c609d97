//! Grid snapshots and tempo
//!
//! A `Grid` is the immutable picture handed to the scheduler when playback
//! starts. Rows are voices (row 0 is the highest pitch), columns are time steps.

use super::color::Color;
use thiserror::Error;

/// The colour of an unpainted cell
pub const BACKGROUND: Color = Color::rgb(0x17, 0x17, 0x17);

/// Side length of a freshly created canvas
pub const DEFAULT_SIDE: usize = 23;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("grid has no rows")]
    Empty,
    #[error("row {row} has {len} cells, expected {expected} for a square grid")]
    NotSquare {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("cell ({row}, {col}) is outside a {side}x{side} grid")]
    OutOfBounds { row: usize, col: usize, side: usize },
    #[error("tempo must be between 0 and {max} beats per minute, got {0}", max = Tempo::MAX_BPM)]
    InvalidTempo(f64),
}

/// Square grid of cell colours
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Color>>,
}

impl Grid {
    /// Build a grid from rows, validating that it is square and non-empty
    pub fn new(rows: Vec<Vec<Color>>) -> Result<Self, GridError> {
        let side = rows.len();
        if side == 0 {
            return Err(GridError::Empty);
        }
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != side {
                return Err(GridError::NotSquare {
                    row,
                    len: cells.len(),
                    expected: side,
                });
            }
        }
        Ok(Self { rows })
    }

    /// An all-background grid
    pub fn blank(side: usize) -> Result<Self, GridError> {
        Self::new(vec![vec![BACKGROUND; side]; side])
    }

    /// Number of columns (time steps per loop)
    pub fn width(&self) -> usize {
        self.rows[0].len()
    }

    /// Number of rows (voices)
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Color> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Iterate the cells of one column from the top row down
    pub fn column(&self, col: usize) -> impl Iterator<Item = (usize, Color)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter_map(move |(row, cells)| cells.get(col).map(|&c| (row, c)))
    }

    pub fn rows(&self) -> &[Vec<Color>] {
        &self.rows
    }

    /// True if any cell is painted
    pub fn has_content(&self) -> bool {
        self.rows
            .iter()
            .any(|row| row.iter().any(|&cell| cell != BACKGROUND))
    }

    /// Number of painted cells
    pub fn painted_cells(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.iter())
            .filter(|&&cell| cell != BACKGROUND)
            .count()
    }

    /// Paint a single cell in place
    pub fn set_cell(&mut self, row: usize, col: usize, color: Color) -> Result<(), GridError> {
        let side = self.height();
        let cell = self
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or(GridError::OutOfBounds { row, col, side })?;
        *cell = color;
        Ok(())
    }

    /// Builder form of [`Grid::set_cell`]
    pub fn with_cell(mut self, row: usize, col: usize, color: Color) -> Result<Self, GridError> {
        self.set_cell(row, col, color)?;
        Ok(self)
    }

    /// Reset every cell to the background colour
    pub fn clear(&mut self) {
        for row in &mut self.rows {
            row.fill(BACKGROUND);
        }
    }

    /// Render the grid as coloured terminal blocks, marking `playhead` with a caret row
    #[cfg(feature = "colored")]
    pub fn render_ansi(&self, playhead: Option<usize>) -> String {
        let mut out = String::new();
        for row in &self.rows {
            for cell in row {
                out.push_str(&cell.swatch().to_string());
            }
            out.push('\n');
        }
        if let Some(col) = playhead {
            out.push_str(&"  ".repeat(col));
            out.push_str("^^\n");
        }
        out
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            rows: vec![vec![BACKGROUND; DEFAULT_SIDE]; DEFAULT_SIDE],
        }
    }
}

/// Playback speed; one beat is one grid column
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tempo(f64);

impl Tempo {
    pub const DEFAULT_BPM: f64 = 80.0;
    pub const MAX_BPM: f64 = 1000.0;

    pub fn new(bpm: f64) -> Result<Self, GridError> {
        if bpm > 0.0 && bpm <= Self::MAX_BPM {
            Ok(Self(bpm))
        } else {
            Err(GridError::InvalidTempo(bpm))
        }
    }

    pub fn bpm(&self) -> f64 {
        self.0
    }

    /// Seconds between consecutive columns
    pub fn seconds_per_column(&self) -> f64 {
        60.0 / self.0
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(Self::DEFAULT_BPM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::rgb(0xD2, 0x60, 0x64);

    #[test]
    fn test_rejects_empty_and_ragged() {
        assert_eq!(Grid::new(vec![]), Err(GridError::Empty));
        let ragged = vec![vec![BACKGROUND; 2], vec![BACKGROUND; 1]];
        assert!(matches!(
            Grid::new(ragged),
            Err(GridError::NotSquare { row: 1, len: 1, expected: 2 })
        ));
        let wide = vec![vec![BACKGROUND; 3]];
        assert!(Grid::new(wide).is_err());
    }

    #[test]
    fn test_single_cell_grid() {
        let grid = Grid::blank(1).unwrap();
        assert_eq!(grid.width(), 1);
        assert_eq!(grid.height(), 1);
        assert!(!grid.has_content());
    }

    #[test]
    fn test_has_content_and_painted_cells() {
        let grid = Grid::blank(4).unwrap().with_cell(2, 3, RED).unwrap();
        assert!(grid.has_content());
        assert_eq!(grid.painted_cells(), 1);
        assert_eq!(grid.cell(2, 3), Some(RED));
        assert_eq!(grid.cell(4, 0), None);
    }

    #[test]
    fn test_set_cell_out_of_bounds() {
        let mut grid = Grid::blank(2).unwrap();
        assert_eq!(
            grid.set_cell(2, 0, RED),
            Err(GridError::OutOfBounds { row: 2, col: 0, side: 2 })
        );
    }

    #[test]
    fn test_column_iterates_top_down() {
        let grid = Grid::blank(3)
            .unwrap()
            .with_cell(0, 1, RED)
            .unwrap()
            .with_cell(2, 1, RED)
            .unwrap();
        let painted: Vec<usize> = grid
            .column(1)
            .filter(|(_, c)| *c != BACKGROUND)
            .map(|(row, _)| row)
            .collect();
        assert_eq!(painted, vec![0, 2]);
    }

    #[test]
    fn test_clear() {
        let mut grid = Grid::blank(2).unwrap().with_cell(0, 0, RED).unwrap();
        grid.clear();
        assert!(!grid.has_content());
    }

    #[test]
    fn test_default_canvas_size() {
        let grid = Grid::default();
        assert_eq!(grid.width(), DEFAULT_SIDE);
        assert_eq!(grid.height(), DEFAULT_SIDE);
    }

    #[test]
    fn test_tempo() {
        assert_eq!(Tempo::new(120.0).unwrap().seconds_per_column(), 0.5);
        assert_eq!(Tempo::default().bpm(), 80.0);
        assert!(Tempo::new(0.0).is_err());
        assert!(Tempo::new(-10.0).is_err());
        assert!(Tempo::new(f64::NAN).is_err());
        assert!(Tempo::new(f64::INFINITY).is_err());
        assert!(Tempo::new(Tempo::MAX_BPM).is_ok());
        assert!(Tempo::new(Tempo::MAX_BPM + 1.0).is_err());
    }
}
