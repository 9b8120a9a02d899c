//! Gerber export
//!
//! Plots every layer of a plot plan (plus the inner copper layers when the
//! plan has copper) into one Gerber file per layer, then optionally writes
//! the drill files and the Gerber job file.

use crate::backend::CadBackend;
use crate::board::Board;
use crate::drill::DrillExporter;
use crate::error::{Result, ResultExt};
use crate::jobfile::GerberJobFileWriter;
use crate::layers::{inner_copper_indices, Layer};
use crate::plan::{has_copper, PlotPlanEntry};
use crate::plot::{plot_job, DrillMarks, ExportReport, PlotFormat, PlotJob, PlotOptions};
use crate::settings::ExportSettings;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// `<board file name>-gerber`, made absolute against the working directory
pub fn default_output_dir(board_path: &Path) -> Result<PathBuf> {
    let basename = board_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .context("Board path has no file name")?;
    absolute(Path::new(&format!("{}-gerber", basename)))
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("Failed to read the working directory")?
            .join(path))
    }
}

/// Session options for Gerber plotting under `settings`
pub fn session_options(output_dir: &Path, settings: &ExportSettings) -> PlotOptions {
    PlotOptions {
        plot_frame_ref: false,
        auto_scale: false,
        scale: 1.0,
        mirror: false,
        sketch_pad_line_width: 0.35,
        drill_marks: DrillMarks::None,
        include_netlist_info: true,
        use_protel_extensions: settings.use_protel_extensions,
        exclude_edge_layer: settings.exclude_edge_layer,
        use_aux_origin: settings.use_aux_origin,
        use_x2_format: settings.use_x2_format,
        subtract_mask_from_silk: settings.subtract_mask_from_silk,
        ..PlotOptions::new(output_dir)
    }
}

/// Jobs for a plan: one per entry, then one per inner copper layer if the
/// plan plots copper. Copper layers skip NPTH pads.
pub fn gerber_jobs(
    plan: &[PlotPlanEntry],
    copper_layer_count: u8,
    settings: &ExportSettings,
) -> Vec<PlotJob> {
    let suffix = |name: &str| {
        if settings.no_suffix {
            String::new()
        } else {
            name.to_string()
        }
    };

    let mut jobs: Vec<PlotJob> = plan
        .iter()
        .map(|entry| PlotJob {
            layer: entry.layer,
            suffix: suffix(&entry.name),
            format: PlotFormat::Gerber,
            comment: entry.comment.clone(),
            skip_npth_pads: entry.layer.is_copper(),
        })
        .collect();

    if has_copper(plan) {
        jobs.extend(inner_copper_indices(copper_layer_count).map(|index| PlotJob {
            layer: Layer::InnerCopper(index),
            suffix: suffix(&format!("inner{}", index)),
            format: PlotFormat::Gerber,
            comment: "inner".to_string(),
            skip_npth_pads: true,
        }));
    }

    jobs
}

/// Exports Gerbers (and optionally drill and job files) for a board
pub struct GerberExporter<'a> {
    backend: &'a dyn CadBackend,
}

impl<'a> GerberExporter<'a> {
    pub fn new(backend: &'a dyn CadBackend) -> Self {
        Self { backend }
    }

    /// Load `board_path` and export it. Without an output directory the
    /// files go to `<board file name>-gerber`.
    pub fn export_file(
        &self,
        board_path: &Path,
        output_dir: Option<&Path>,
        plan: &[PlotPlanEntry],
        drilling: bool,
        settings: &ExportSettings,
    ) -> Result<ExportReport> {
        let output_dir = match output_dir {
            Some(dir) => absolute(dir)?,
            None => default_output_dir(board_path)?,
        };
        let board = self
            .backend
            .load_board(board_path)
            .with_path_context("load board", board_path)?;

        self.export(&board, &output_dir, plan, drilling, settings)
    }

    pub fn export(
        &self,
        board: &Board,
        output_dir: &Path,
        plan: &[PlotPlanEntry],
        drilling: bool,
        settings: &ExportSettings,
    ) -> Result<ExportReport> {
        info!(
            "Exporting Gerbers of {} into {}",
            board.name(),
            output_dir.display()
        );
        fs::create_dir_all(output_dir).with_path_context("create output directory", output_dir)?;

        let options = session_options(output_dir, settings);
        let jobs = gerber_jobs(plan, board.copper_layer_count(), settings);
        debug!("Gerber plan has {} layer(s)", jobs.len());

        let mut report = ExportReport::new();
        let mut job_file = GerberJobFileWriter::new(&board.name(), board.copper_layer_count());

        let mut session = self.backend.open_plot_session(board, &options)?;
        for job in &jobs {
            if let Some(path) = plot_job(session.as_mut(), job, &mut report) {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default();
                job_file.add_gerber_file(job.layer, &file_name);
            }
        }
        session.close().context("Failed to close Gerber plot session")?;

        if drilling {
            let drill_files = DrillExporter::new(self.backend).export(board, output_dir, settings)?;
            report.files.extend(drill_files);
        }

        if settings.create_job_file {
            let job_path = output_dir.join(format!("{}.gbrjob", board.name()));
            job_file.write(&job_path)?;
            report.files.push(job_path);
        }

        info!(
            "Gerber export finished: {} file(s), {} warning(s)",
            report.files.len(),
            report.warnings.len()
        );
        Ok(report)
    }
}
