//! Drill file export
//!
//! Derives NC-drill files from the loaded board using the same vendor
//! settings as the Gerbers.

use crate::backend::CadBackend;
use crate::board::{Board, Point};
use crate::error::{Result, ResultExt};
use crate::settings::{ExportSettings, ZerosFormat};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the drill statistics report written next to the drill files
pub const DRILL_REPORT_NAME: &str = "drill_report.rpt";

/// Everything the backend needs to write one drill file set
#[derive(Debug, Clone, PartialEq)]
pub struct DrillRequest {
    pub output_dir: PathBuf,
    pub origin: Point,
    pub mirror: bool,
    pub minimal_header: bool,
    /// One file for plated and non-plated holes instead of two
    pub merge_npth: bool,
    pub route_oval_holes: bool,
    pub metric: bool,
    pub zeros_format: ZerosFormat,
    pub generate_map_pdf: bool,
    pub report_path: Option<PathBuf>,
}

impl DrillRequest {
    pub fn from_settings(board: &Board, output_dir: &Path, settings: &ExportSettings) -> Self {
        let origin = if settings.use_aux_origin {
            board.aux_origin()
        } else {
            Point::default()
        };

        Self {
            output_dir: output_dir.to_path_buf(),
            origin,
            mirror: false,
            minimal_header: settings.minimal_header,
            merge_npth: settings.merge_npth,
            route_oval_holes: false,
            metric: true,
            zeros_format: settings.zeros_format,
            generate_map_pdf: settings.gen_drill_map_pdf,
            report_path: settings
                .gen_drill_report
                .then(|| output_dir.join(DRILL_REPORT_NAME)),
        }
    }
}

/// Writes drill files for a loaded board
pub struct DrillExporter<'a> {
    backend: &'a dyn CadBackend,
}

impl<'a> DrillExporter<'a> {
    pub fn new(backend: &'a dyn CadBackend) -> Self {
        Self { backend }
    }

    pub fn export(
        &self,
        board: &Board,
        output_dir: &Path,
        settings: &ExportSettings,
    ) -> Result<Vec<PathBuf>> {
        let request = DrillRequest::from_settings(board, output_dir, settings);
        info!(
            "Writing drill files to {} (merge NPTH: {}, zeros: {})",
            output_dir.display(),
            request.merge_npth,
            request.zeros_format.as_str()
        );

        let files = self
            .backend
            .write_drill_files(board, &request)
            .with_path_context("write drill files into", output_dir)?;

        info!("Wrote {} drill file(s)", files.len());
        Ok(files)
    }
}
