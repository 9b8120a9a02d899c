//! DXF, assembly drawing and review set exports
//!
//! Each export opens its own plot session on the shared board with a fixed
//! plan and its own options, plots it and closes the session.

use crate::backend::CadBackend;
use crate::board::Board;
use crate::error::{Result, ResultExt};
use crate::gerber::absolute;
use crate::layers::{inner_copper_indices, Layer};
use crate::plan::{assembly_plan, has_copper, paste_dxf_plan, rezonit_plan, PlotPlanEntry};
use crate::plot::{plot_job, DxfUnits, ExportReport, PlotFormat, PlotJob, PlotOptions};
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Options of the paste stencil DXF export
pub fn dxf_options(output_dir: &Path) -> PlotOptions {
    PlotOptions {
        auto_scale: false,
        scale: 1.0,
        mirror: false,
        exclude_edge_layer: true,
        dxf_units: DxfUnits::Millimeters,
        dxf_polygon_mode: false,
        ..PlotOptions::new(output_dir)
    }
}

/// Options of the assembly drawing: A4, auto-scaled, with a frame
pub fn assembly_options(output_dir: &Path) -> PlotOptions {
    PlotOptions {
        auto_scale: true,
        a4_output: true,
        plot_frame_ref: true,
        mirror: false,
        exclude_edge_layer: false,
        ..PlotOptions::new(output_dir)
    }
}

/// Options of the review set: 1:1 without a frame
pub fn review_options(output_dir: &Path) -> PlotOptions {
    PlotOptions {
        plot_frame_ref: false,
        scale: 1.0,
        mirror: false,
        exclude_edge_layer: false,
        ..PlotOptions::new(output_dir)
    }
}

fn plan_jobs(plan: &[PlotPlanEntry], format: PlotFormat) -> Vec<PlotJob> {
    plan.iter()
        .map(|entry| PlotJob {
            layer: entry.layer,
            suffix: entry.name.clone(),
            format,
            comment: entry.comment.clone(),
            skip_npth_pads: false,
        })
        .collect()
}

/// Plots fixed plans as DXF or PDF
pub struct AncillaryExporter<'a> {
    backend: &'a dyn CadBackend,
}

impl<'a> AncillaryExporter<'a> {
    pub fn new(backend: &'a dyn CadBackend) -> Self {
        Self { backend }
    }

    fn run(
        &self,
        board: &Board,
        options: &PlotOptions,
        jobs: &[PlotJob],
    ) -> Result<(Vec<PathBuf>, ExportReport)> {
        fs::create_dir_all(&options.output_dir)
            .with_path_context("create output directory", &options.output_dir)?;

        let mut report = ExportReport::new();
        let mut opened = Vec::with_capacity(jobs.len());

        let mut session = self.backend.open_plot_session(board, options)?;
        for job in jobs {
            if let Some(path) = plot_job(session.as_mut(), job, &mut report) {
                opened.push(path);
            }
        }
        session.close().context("Failed to close plot session")?;

        Ok((opened, report))
    }

    /// Load `board_path` and export its paste DXFs. Without an output
    /// directory they go next to the board file.
    pub fn dxf_file(
        &self,
        board_path: &Path,
        output_dir: Option<&Path>,
    ) -> Result<(Vec<PathBuf>, ExportReport)> {
        let plot_dir = match output_dir {
            Some(dir) => absolute(dir)?,
            None => absolute(board_path.parent().unwrap_or_else(|| Path::new(".")))?,
        };
        let board = self
            .backend
            .load_board(board_path)
            .with_path_context("load board", board_path)?;

        self.paste_dxf(&board, &plot_dir)
    }

    /// Paste bottom, paste top and board outline as millimeter DXFs.
    /// Returns the three output paths in that order.
    pub fn paste_dxf(
        &self,
        board: &Board,
        plot_dir: &Path,
    ) -> Result<(Vec<PathBuf>, ExportReport)> {
        info!("Exporting paste DXFs into {}", plot_dir.display());
        let jobs = plan_jobs(&paste_dxf_plan(), PlotFormat::Dxf);
        self.run(board, &dxf_options(plot_dir), &jobs)
    }

    /// Front and back fabrication layers as PDF
    pub fn assembly_drawing(&self, board: &Board, plot_dir: &Path) -> Result<ExportReport> {
        info!("Exporting assembly drawing into {}", plot_dir.display());
        let jobs = plan_jobs(&assembly_plan(), PlotFormat::Pdf);
        let (_, report) = self.run(board, &assembly_options(plot_dir), &jobs)?;
        Ok(report)
    }

    /// Every layer of the vendor plan plus inner copper as PDF
    pub fn review_set(&self, board: &Board, plot_dir: &Path) -> Result<ExportReport> {
        info!("Exporting review set into {}", plot_dir.display());
        let plan = rezonit_plan();
        let mut jobs = plan_jobs(&plan, PlotFormat::Pdf);

        if has_copper(&plan) {
            jobs.extend(
                inner_copper_indices(board.copper_layer_count()).map(|index| PlotJob {
                    layer: Layer::InnerCopper(index),
                    suffix: format!("inner{}", index),
                    format: PlotFormat::Pdf,
                    comment: "inner".to_string(),
                    skip_npth_pads: true,
                }),
            );
        }

        let (_, report) = self.run(board, &review_options(plot_dir), &jobs)?;
        Ok(report)
    }
}
