//! Gerber job file
//!
//! The `.gbrjob` manifest lists every plotted Gerber with its X2 file
//! function so fabricators can identify layers without guessing from names.

use crate::error::{Result, ResultExt};
use crate::layers::Layer;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct JobFile {
    header: Header,
    general_specs: GeneralSpecs,
    files_attributes: Vec<FileAttributes>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Header {
    generation_software: GenerationSoftware,
    creation_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GenerationSoftware {
    vendor: String,
    application: String,
    version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GeneralSpecs {
    project_id: ProjectId,
    layer_number: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ProjectId {
    name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct FileAttributes {
    path: String,
    file_function: String,
    file_polarity: String,
}

/// Collects plotted Gerbers and writes the job file
pub struct GerberJobFileWriter {
    project_name: String,
    copper_layers: u8,
    files: Vec<FileAttributes>,
}

impl GerberJobFileWriter {
    pub fn new(project_name: &str, copper_layers: u8) -> Self {
        Self {
            project_name: project_name.to_string(),
            copper_layers,
            files: Vec::new(),
        }
    }

    /// Register a Gerber file (name relative to the job file) plotted from `layer`
    pub fn add_gerber_file(&mut self, layer: Layer, file_name: &str) {
        self.files.push(FileAttributes {
            path: file_name.to_string(),
            file_function: layer.file_function(self.copper_layers),
            file_polarity: if layer.is_negative() {
                "Negative".to_string()
            } else {
                "Positive".to_string()
            },
        });
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        let job = JobFile {
            header: Header {
                generation_software: GenerationSoftware {
                    vendor: "kifab".to_string(),
                    application: env!("CARGO_PKG_NAME").to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
                creation_date: chrono::Local::now().to_rfc3339(),
            },
            general_specs: GeneralSpecs {
                project_id: ProjectId {
                    name: self.project_name.clone(),
                },
                layer_number: self.copper_layers,
            },
            files_attributes: self.files.clone(),
        };

        Ok(serde_json::to_string_pretty(&job)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let content = self.to_json()?;
        std::fs::write(path, content).with_path_context("write job file", path)?;
        info!(
            "Wrote job file {} listing {} Gerber file(s)",
            path.display(),
            self.files.len()
        );
        Ok(())
    }
}
