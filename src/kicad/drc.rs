//! KiCad DRC JSON report

use crate::error::Result;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// Report written by `kicad-cli pcb drc --format json`
#[derive(Debug, Clone, Deserialize)]
pub struct DrcReport {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub violations: Vec<DrcViolation>,
    #[serde(default)]
    pub unconnected_items: Vec<DrcViolation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DrcViolation {
    #[serde(rename = "type")]
    pub violation_type: String,
    pub severity: String,
    #[serde(default)]
    pub description: String,
    /// Excluded by the user in KiCad
    #[serde(default)]
    pub excluded: bool,
}

impl DrcReport {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse DRC JSON report")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).context("Failed to read DRC report file")?;
        Self::from_json(&contents)
    }

    /// Error-level findings that were not excluded
    pub fn errors(&self) -> impl Iterator<Item = &DrcViolation> {
        self.violations
            .iter()
            .chain(self.unconnected_items.iter())
            .filter(|v| !v.excluded && v.severity == "error")
    }
}
