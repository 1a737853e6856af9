//! Persisted matrix artifact
//!
//! The matrix file is the contract between refresh and everything downstream
//! (enumeration, builds, templating). Serialization is deterministic: pretty
//! JSON with a trailing newline, map keys in a fixed order.

use crate::error::{MatrixError, Result};
use camino::Utf8Path;
use keel_core::types::MatrixEntry;
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::debug;

/// Ordered list of matrix entries, newest major and version first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Matrix {
    entries: Vec<MatrixEntry>,
}

impl Matrix {
    pub fn new(entries: Vec<MatrixEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[MatrixEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical serialized form
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| MatrixError::matrix("<memory>", e.to_string()))?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| MatrixError::matrix("<memory>", e.to_string()))
    }

    /// Read the matrix file
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MatrixError::matrix(
                path.as_str(),
                format!("{} (run `keel matrix refresh` first)", e),
            )
        })?;
        serde_json::from_str(&content).map_err(|e| MatrixError::matrix(path.as_str(), e.to_string()))
    }

    /// Write the matrix file; returns `false` when the file already held
    /// identical bytes and was left untouched
    pub fn save(&self, path: &Utf8Path) -> Result<bool> {
        let json = self.to_json()?;

        if let Ok(existing) = fs::read_to_string(path) {
            if existing == json {
                debug!("{} is up to date", path);
                return Ok(false);
            }
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"[
  {
    "version": "5.0.2",
    "releases": {
      "amd64": {
        "url": "https://example.com/db-5.0.2-amd64.tgz",
        "sha256": "aa"
      }
    },
    "tags": {
      "bookworm": [
        "latest",
        "5",
        "5.0.2"
      ]
    }
  }
]
"#;

    #[test]
    fn test_canonical_form_is_stable() {
        let matrix = Matrix::from_json(SAMPLE).unwrap();
        assert_eq!(matrix.to_json().unwrap(), SAMPLE);
    }

    #[test]
    fn test_save_reports_unchanged() {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("out/matrix.json")).unwrap();
        let matrix = Matrix::from_json(SAMPLE).unwrap();

        assert!(matrix.save(&path).unwrap());
        assert!(!matrix.save(&path).unwrap());
        assert_eq!(Matrix::load(&path).unwrap(), matrix);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Matrix::load(Utf8Path::new("/nonexistent/matrix.json")).unwrap_err();
        assert!(matches!(err, MatrixError::Matrix { .. }));
    }
}
