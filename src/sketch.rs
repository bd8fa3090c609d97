//! Sketch files: a painted grid and an optional tempo as JSON
//!
//! ```json
//! { "grid": [["#171717", "#D26064"], ["#171717", "#171717"]], "tempo": 80 }
//! ```

use anyhow::{anyhow, Context, Result};
use pixelsong_core::types::{Color, Grid, Tempo};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct SketchFile {
    grid: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tempo: Option<f64>,
}

/// A grid as saved on disk
#[derive(Debug, Clone, PartialEq)]
pub struct Sketch {
    pub grid: Grid,
    pub tempo: Option<Tempo>,
}

impl Sketch {
    pub fn new(grid: Grid, tempo: Option<Tempo>) -> Self {
        Self { grid, tempo }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: SketchFile = serde_json::from_str(raw)?;
        let rows = file
            .grid
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .map(|(col, cell)| {
                        cell.parse::<Color>()
                            .map_err(|e| anyhow!("cell ({}, {}): {}", row, col, e))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        let grid = Grid::new(rows)?;
        let tempo = file.tempo.map(Tempo::new).transpose()?;
        Ok(Self { grid, tempo })
    }

    pub fn to_json(&self) -> Result<String> {
        let file = SketchFile {
            grid: self
                .grid
                .rows()
                .iter()
                .map(|row| row.iter().map(Color::to_string).collect())
                .collect(),
            tempo: self.tempo.map(|t| t.bpm()),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read sketch: {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid sketch: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write sketch: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelsong_core::types::BACKGROUND;
    use tempfile::tempdir;

    #[test]
    fn test_parse_sketch() {
        let sketch = Sketch::from_json(
            r##"{ "grid": [["#171717", "d26064"], ["#171717", "#171717"]], "tempo": 120 }"##,
        )
        .unwrap();
        assert_eq!(sketch.grid.width(), 2);
        assert_eq!(sketch.grid.cell(0, 1), Some(Color::rgb(0xD2, 0x60, 0x64)));
        assert_eq!(sketch.grid.cell(1, 0), Some(BACKGROUND));
        assert_eq!(sketch.tempo.map(|t| t.bpm()), Some(120.0));
    }

    #[test]
    fn test_tempo_is_optional() {
        let sketch = Sketch::from_json(r##"{ "grid": [["#171717"]] }"##).unwrap();
        assert!(sketch.tempo.is_none());
    }

    #[test]
    fn test_rejects_bad_input() {
        let bad_colour = Sketch::from_json(r##"{ "grid": [["#17171"]] }"##).unwrap_err();
        assert!(bad_colour.to_string().contains("cell (0, 0)"));
        assert!(Sketch::from_json(r##"{ "grid": [["#171717", "#171717"]] }"##).is_err());
        assert!(Sketch::from_json(r##"{ "grid": [] }"##).is_err());
        assert!(Sketch::from_json(r##"{ "grid": [["#171717"]], "tempo": -5 }"##).is_err());
        assert!(Sketch::from_json("not json").is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.json");
        let grid = Grid::blank(3)
            .unwrap()
            .with_cell(2, 1, Color::rgb(0x9B, 0xA6, 0x5D))
            .unwrap();
        let sketch = Sketch::new(grid, Some(Tempo::new(95.0).unwrap()));
        sketch.save(&path).unwrap();
        assert_eq!(Sketch::load(&path).unwrap(), sketch);
    }
}
