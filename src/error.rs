//! Error handling for kifab
//!
//! This module provides unified error handling using anyhow for propagation
//! and a typed error enum for the precondition failures callers may want to
//! match on.

use anyhow::Context;
use std::path::Path;

pub type Result<T> = anyhow::Result<T>;

/// Extension trait for Results to add context with file paths
pub trait ResultExt<T> {
    /// Add context with file path information
    fn with_path_context<P: AsRef<Path>>(self, operation: &str, path: P) -> Result<T>;

    /// Add context naming the export stage that failed
    fn with_stage_context(self, stage: &str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error> + Send + Sync + 'static,
{
    fn with_path_context<P: AsRef<Path>>(self, operation: &str, path: P) -> Result<T> {
        self.map_err(|e| e.into())
            .with_context(|| format!("Failed to {}: {}", operation, path.as_ref().display()))
    }

    fn with_stage_context(self, stage: &str) -> Result<T> {
        self.map_err(|e| e.into())
            .with_context(|| format!("Error in {} stage", stage))
    }
}

/// Specific error types for kifab operations
#[derive(Debug, thiserror::Error)]
pub enum FabError {
    #[error("Board file does not exist: {path}")]
    BoardNotFound { path: String },

    #[error("Invalid board file {path}: {reason}")]
    InvalidBoard { path: String, reason: String },

    #[error("Invalid schematic file {path}: {reason}")]
    InvalidSchematic { path: String, reason: String },

    #[error("Design rule check failed with {violations} violation(s)")]
    DrcFailed { violations: usize },

    #[error("When outputting assembly data, schematic is required")]
    SchematicRequired,

    #[error("Name template must contain '{{}}': {template}")]
    InvalidNameTemplate { template: String },

    #[error("Unknown export preset: {name}")]
    UnknownPreset { name: String },

    #[error("{tool} needs to be installed in order to {purpose}")]
    ToolNotFound { tool: String, purpose: String },

    #[error("{tool} exited with {status}")]
    ProcessFailed { tool: String, status: String },
}
