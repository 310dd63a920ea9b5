//! Ground-truth loading.
//!
//! Curated bug datasets ship one `zkbugs_config.json` per target, keyed by a
//! human-readable bug name:
//!
//! ```json
//! {
//!   "unchecked input": {
//!     "Vulnerability": "Under-Constrained",
//!     "Location": { "Function": "Multiplier", "Line": "10-15" },
//!     "Short Description of the Vulnerability": "out is never constrained"
//!   }
//! }
//! ```
//!
//! The loader accepts both that wrapped shape and a flat record, and is
//! lenient about key capitalization. Line numbers arrive as strings in both
//! `"7"` and `"10-15"` spellings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::model::{GroundTruth, GroundTruthLocation, LineSpan, VulnClass};

#[derive(Debug, Error)]
pub enum GroundTruthError {
    #[error("failed to read ground truth '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse ground truth '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("ground truth '{0}' contains no bug record")]
    Empty(PathBuf),
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    #[serde(default, alias = "File", alias = "file")]
    file: Option<String>,
    #[serde(default, alias = "Function", alias = "function", alias = "Template")]
    function: Option<String>,
    #[serde(default, alias = "Line", alias = "line", alias = "Lines")]
    line: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGroundTruth {
    #[serde(alias = "Vulnerability", alias = "vulnerability")]
    vulnerability: String,
    #[serde(default, alias = "Location", alias = "location")]
    location: Option<RawLocation>,
    #[serde(
        default,
        alias = "Short Description of the Vulnerability",
        alias = "description"
    )]
    description: Option<String>,
}

impl RawGroundTruth {
    fn into_ground_truth(self) -> GroundTruth {
        let location = self
            .location
            .map(|raw| GroundTruthLocation {
                file: raw.file,
                function: raw.function,
                // Unparseable line text degrades to no line constraint.
                lines: raw.line.and_then(|s| s.parse::<LineSpan>().ok()),
            })
            .unwrap_or_default();
        GroundTruth {
            vulnerability: self
                .vulnerability
                .parse()
                .unwrap_or(VulnClass::Other(self.vulnerability)),
            location,
            description: self.description,
        }
    }
}

/// Load the first bug record from a ground-truth file.
///
/// A wrapped file may describe several bugs; records after the first are
/// ignored, matching how the curated datasets use one bug per target.
pub fn load_ground_truth(path: &Path) -> Result<GroundTruth, GroundTruthError> {
    let text = fs::read_to_string(path)
        .map_err(|source| GroundTruthError::Read { path: path.to_path_buf(), source })?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|source| GroundTruthError::Parse { path: path.to_path_buf(), source })?;

    let record = if value.get("Vulnerability").is_some() || value.get("vulnerability").is_some() {
        value
    } else {
        // Wrapped form: take the first (and in practice only) bug entry.
        value
            .as_object()
            .and_then(|map| map.values().find(|v| v.is_object()))
            .cloned()
            .ok_or_else(|| GroundTruthError::Empty(path.to_path_buf()))?
    };

    let raw: RawGroundTruth = serde_json::from_value(record)
        .map_err(|source| GroundTruthError::Parse { path: path.to_path_buf(), source })?;
    Ok(raw.into_ground_truth())
}
