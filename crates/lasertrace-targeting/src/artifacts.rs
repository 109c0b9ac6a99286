//! Reconstruction artifacts
//!
//! The external reconstruction writes two JSON files: `coordinates.json`
//! holding `[[x, y, z], ...]` and `center.json` holding `[cx, cy]`.

use crate::tumour::Tumour;
use lasertrace_core::{PersistenceError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionArtifacts {
    pub coordinates: Vec<[f64; 3]>,
    pub center: [f64; 2],
}

impl ReconstructionArtifacts {
    pub fn load(coordinates: &Path, center: &Path) -> Result<Self> {
        let artifacts = Self {
            coordinates: read_json(coordinates)?,
            center: read_json(center)?,
        };

        if artifacts.coordinates.is_empty() {
            return Err(corrupt(coordinates, "no points"));
        }
        if artifacts.coordinates.iter().flatten().any(|v| !v.is_finite()) {
            return Err(corrupt(coordinates, "non-finite coordinate"));
        }
        if artifacts.center.iter().any(|v| !v.is_finite()) {
            return Err(corrupt(center, "non-finite center"));
        }

        tracing::info!(
            "Loaded {} tumour points, center ({}, {})",
            artifacts.coordinates.len(),
            artifacts.center[0],
            artifacts.center[1]
        );
        Ok(artifacts)
    }

    pub fn save(&self, coordinates: &Path, center: &Path) -> Result<()> {
        write_json(coordinates, &self.coordinates)?;
        write_json(center, &self.center)
    }

    /// Body-frame tumour for a reconstruction of `image_height` rows
    pub fn tumour(&self, image_height: f64) -> Tumour {
        Tumour::from_reconstruction(&self.coordinates, self.center, image_height)
    }
}

fn corrupt(path: &Path, reason: &str) -> lasertrace_core::Error {
    PersistenceError::Corrupt {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
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
    serde_json::from_str(&content).map_err(|e| corrupt(path, &e.to_string()))
}

pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let write_err = |reason: String| PersistenceError::Write {
        path: path.display().to_string(),
        reason,
    };
    let json = serde_json::to_string_pretty(value).map_err(|e| write_err(e.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }
    std::fs::write(path, json).map_err(|e| write_err(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_center_file() {
        let dir = tempfile::tempdir().unwrap();
        let coordinates = dir.path().join("coordinates.json");
        std::fs::write(&coordinates, "[[1.0, 2.0, 3.0]]").unwrap();

        let err = ReconstructionArtifacts::load(&coordinates, &dir.path().join("center.json"))
            .unwrap_err();
        assert!(matches!(
            err,
            lasertrace_core::Error::Persistence(PersistenceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_malformed_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let coordinates = dir.path().join("coordinates.json");
        let center = dir.path().join("center.json");
        std::fs::write(&coordinates, "[[1.0, 2.0]]").unwrap();
        std::fs::write(&center, "[0.0, 0.0]").unwrap();

        let err = ReconstructionArtifacts::load(&coordinates, &center).unwrap_err();
        assert!(err.is_safety_abort());
    }
}
