//! Persisted calibration record
//!
//! One JSON document holding both grids. Restoring never fills in missing
//! values: a record without either grid, or with a non-finite voltage, is
//! rejected as corrupt.

use crate::grid::CoordinateGrid;
use chrono::{DateTime, Utc};
use lasertrace_core::{PersistenceError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Coarse and fine grid of one calibration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub coarse_grid: CoordinateGrid,
    pub fine_grid: CoordinateGrid,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl CalibrationRecord {
    pub fn new(coarse_grid: CoordinateGrid, fine_grid: CoordinateGrid) -> Self {
        Self {
            coarse_grid,
            fine_grid,
            created_at: Utc::now(),
        }
    }

    /// Write atomically: temp file in the same directory, then rename
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |reason: String| PersistenceError::Write {
            path: path.display().to_string(),
            reason,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, json).map_err(|e| write_err(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| write_err(e.to_string()))?;

        tracing::info!("Saved calibration record to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound {
                    path: path.display().to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json(&content).map_err(|reason| {
            PersistenceError::Corrupt {
                path: path.display().to_string(),
                reason,
            }
            .into()
        })
    }

    fn from_json(content: &str) -> std::result::Result<Self, String> {
        let record: Self = serde_json::from_str(content).map_err(|e| e.to_string())?;
        if !record.coarse_grid.is_finite() {
            return Err("coarse_grid contains a non-finite voltage".to_string());
        }
        if !record.fine_grid.is_finite() {
            return Err("fine_grid contains a non-finite voltage".to_string());
        }
        Ok(record)
    }
}
