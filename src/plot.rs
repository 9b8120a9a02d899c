//! Plot sessions
//!
//! Every plotting export opens one session on the loaded board, plots its
//! layers one after another and closes the session exactly once. A layer
//! that fails to plot is recorded as a warning and the batch continues.

use crate::error::Result;
use crate::layers::Layer;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Output format of a plotted layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotFormat {
    Gerber,
    Dxf,
    Pdf,
}

/// DXF coordinate units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DxfUnits {
    Millimeters,
    Inches,
}

/// Drill hole marks drawn on plotted pads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrillMarks {
    None,
    Small,
    Full,
}

/// Options fixed for the lifetime of one plot session
#[derive(Debug, Clone, PartialEq)]
pub struct PlotOptions {
    pub output_dir: PathBuf,
    pub plot_frame_ref: bool,
    pub auto_scale: bool,
    pub scale: f64,
    pub a4_output: bool,
    pub mirror: bool,
    /// Line width in mm for pads drawn in sketch mode
    pub sketch_pad_line_width: f64,
    pub drill_marks: DrillMarks,
    pub exclude_edge_layer: bool,
    pub use_aux_origin: bool,
    pub use_protel_extensions: bool,
    pub use_x2_format: bool,
    pub include_netlist_info: bool,
    pub subtract_mask_from_silk: bool,
    pub dxf_units: DxfUnits,
    pub dxf_polygon_mode: bool,
}

impl PlotOptions {
    /// Plain 1:1 plot into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            plot_frame_ref: false,
            auto_scale: false,
            scale: 1.0,
            a4_output: false,
            mirror: false,
            sketch_pad_line_width: 0.1,
            drill_marks: DrillMarks::None,
            exclude_edge_layer: true,
            use_aux_origin: false,
            use_protel_extensions: false,
            use_x2_format: true,
            include_netlist_info: false,
            subtract_mask_from_silk: false,
            dxf_units: DxfUnits::Millimeters,
            dxf_polygon_mode: false,
        }
    }
}

/// One layer to plot within a session
#[derive(Debug, Clone, PartialEq)]
pub struct PlotJob {
    pub layer: Layer,
    pub suffix: String,
    pub format: PlotFormat,
    pub comment: String,
    pub skip_npth_pads: bool,
}

/// An open plotting context on a board
pub trait PlotSession {
    /// Select the job's layer and open its output file. Returns the file path.
    fn open_plot_file(&mut self, job: &PlotJob) -> Result<PathBuf>;

    /// Plot the layer opened last
    fn plot_layer(&mut self) -> Result<()>;

    /// Release the session; it cannot be used afterwards
    fn close(self: Box<Self>) -> Result<()>;
}

/// Files produced by an export and the layers that failed along the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl ExportReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Open and plot a single job. Failures are recorded in `report`.
/// Returns the opened file path, also when plotting it failed.
pub fn plot_job(
    session: &mut dyn PlotSession,
    job: &PlotJob,
    report: &mut ExportReport,
) -> Option<PathBuf> {
    let path = match session.open_plot_file(job) {
        Ok(path) => path,
        Err(e) => {
            report.warn(format!("plot error: cannot open {} file: {:#}", job.layer, e));
            return None;
        }
    };

    match session.plot_layer() {
        Ok(()) => {
            debug!("Plotted {} to {}", job.layer, path.display());
            report.files.push(path.clone());
        }
        Err(e) => report.warn(format!("plot error: layer {} failed: {:#}", job.layer, e)),
    }
    Some(path)
}

/// File a session writes for `suffix` on `layer`, following KiCad naming:
/// `<board>-<suffix>.<ext>`, or `<board>.<ext>` for an empty suffix
pub fn plot_file_path(
    output_dir: &Path,
    board_name: &str,
    suffix: &str,
    layer: Layer,
    format: PlotFormat,
    use_protel_extensions: bool,
) -> PathBuf {
    let extension = match format {
        PlotFormat::Gerber if use_protel_extensions => layer.protel_extension(),
        PlotFormat::Gerber => "gbr".to_string(),
        PlotFormat::Dxf => "dxf".to_string(),
        PlotFormat::Pdf => "pdf".to_string(),
    };

    let stem = if suffix.is_empty() {
        board_name.to_string()
    } else {
        format!("{}-{}", board_name, suffix)
    };

    output_dir.join(format!("{}.{}", stem, extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FlakySession {
        fail_layer: Layer,
        current: Option<Layer>,
    }

    impl PlotSession for FlakySession {
        fn open_plot_file(&mut self, job: &PlotJob) -> Result<PathBuf> {
            self.current = Some(job.layer);
            Ok(PathBuf::from(format!("/out/{}.gbr", job.suffix)))
        }

        fn plot_layer(&mut self) -> Result<()> {
            if self.current == Some(self.fail_layer) {
                Err(anyhow!("boom"))
            } else {
                Ok(())
            }
        }

        fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn job(layer: Layer, suffix: &str) -> PlotJob {
        PlotJob {
            layer,
            suffix: suffix.to_string(),
            format: PlotFormat::Gerber,
            comment: String::new(),
            skip_npth_pads: false,
        }
    }

    #[test]
    fn test_failed_layer_does_not_stop_batch() {
        let mut session = FlakySession {
            fail_layer: Layer::FrontMask,
            current: None,
        };
        let mut report = ExportReport::new();

        plot_job(&mut session, &job(Layer::FrontCopper, "CuTop"), &mut report);
        let failed = plot_job(&mut session, &job(Layer::FrontMask, "MaskTop"), &mut report);
        plot_job(&mut session, &job(Layer::EdgeCuts, "EdgeCuts"), &mut report);

        assert_eq!(failed, Some(PathBuf::from("/out/MaskTop.gbr")));
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("F.Mask"));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_plot_file_path_naming() {
        let dir = Path::new("/out");
        assert_eq!(
            plot_file_path(dir, "demo", "CuTop", Layer::FrontCopper, PlotFormat::Gerber, false),
            PathBuf::from("/out/demo-CuTop.gbr")
        );
        assert_eq!(
            plot_file_path(dir, "demo", "", Layer::FrontCopper, PlotFormat::Gerber, true),
            PathBuf::from("/out/demo.gtl")
        );
        assert_eq!(
            plot_file_path(dir, "demo", "FabTop", Layer::FrontFab, PlotFormat::Pdf, true),
            PathBuf::from("/out/demo-FabTop.pdf")
        );
    }
}
