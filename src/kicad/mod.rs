//! KiCad backend
//!
//! Board and schematic metadata are read straight from the S-expression
//! files. Plotting, drilling and DRC run through `kicad-cli`, one invocation
//! per plotted layer.

pub mod board;
pub mod cli;
pub mod drc;
pub mod schematic;

use crate::backend::CadBackend;
use crate::board::{Board, Point};
use crate::drill::DrillRequest;
use crate::error::{FabError, Result, ResultExt};
use crate::layers::Layer;
use crate::plot::{
    plot_file_path, DrillMarks, DxfUnits, PlotFormat, PlotJob, PlotOptions, PlotSession,
};
use crate::schematic::SchematicComponent;
use anyhow::{anyhow, Context};
use cli::{locate_kicad_cli, KiCadCliBuilder};
use drc::DrcReport;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// A board file `kicad-cli` can read. Boards with removed footprints are
/// written to a temporary directory under their original file name, so
/// derived output names stay the same.
struct BoardFile {
    path: PathBuf,
    _dir: Option<TempDir>,
}

impl BoardFile {
    fn for_board(board: &Board) -> Result<Self> {
        let tree = match board.tree() {
            Some(tree) if board.is_modified() => tree,
            _ => {
                return Ok(Self {
                    path: board.path().to_path_buf(),
                    _dir: None,
                })
            }
        };

        let dir = TempDir::new().context("Failed to create temporary board directory")?;
        let file_name = board
            .path()
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| format!("{}.kicad_pcb", board.name()).into());
        let path = dir.path().join(file_name);
        std::fs::write(&path, tree.to_string()).with_path_context("write board copy", &path)?;
        debug!("Materialized modified board at {}", path.display());

        Ok(Self {
            path,
            _dir: Some(dir),
        })
    }
}

/// [`CadBackend`] on top of KiCad files and `kicad-cli`
#[derive(Debug, Clone, Default)]
pub struct KicadBackend {
    cli: Option<PathBuf>,
}

impl KicadBackend {
    /// Backend locating `kicad-cli` on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend using a specific `kicad-cli` binary
    pub fn with_cli(path: impl Into<PathBuf>) -> Self {
        Self {
            cli: Some(path.into()),
        }
    }

    fn cli(&self) -> Result<KiCadCliBuilder> {
        let program = match &self.cli {
            Some(path) => path.clone(),
            None => locate_kicad_cli()?,
        };
        Ok(KiCadCliBuilder::new(program))
    }
}

impl CadBackend for KicadBackend {
    fn load_board(&self, path: &Path) -> Result<Board> {
        let board = board::read_board(path)?;
        info!(
            "Loaded board {} ({} copper layers, {} footprints)",
            path.display(),
            board.copper_layer_count(),
            board.footprints().len()
        );
        Ok(board)
    }

    fn check_drc(&self, board: &Board) -> Result<()> {
        let file = BoardFile::for_board(board)?;
        let report_file = tempfile::NamedTempFile::new()
            .context("Failed to create temporary file for DRC output")?;

        self.cli()?
            .command("pcb")
            .subcommand("drc")
            .args(["--format", "json", "--severity-all"])
            .output(report_file.path())
            .arg(&file.path)
            .run()
            .context("Failed to run KiCad DRC")?;

        let report = DrcReport::from_file(report_file.path())?;
        let errors: Vec<_> = report.errors().collect();
        for violation in &errors {
            info!(
                "DRC {}: {}",
                violation.violation_type, violation.description
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FabError::DrcFailed {
                violations: errors.len(),
            }
            .into())
        }
    }

    fn open_plot_session<'a>(
        &'a self,
        board: &'a Board,
        options: &PlotOptions,
    ) -> Result<Box<dyn PlotSession + 'a>> {
        let file = BoardFile::for_board(board)?;
        if options.auto_scale || options.scale != 1.0 || options.a4_output {
            debug!("kicad-cli plots at 1:1 on the board page; scale options ignored");
        }
        debug!(
            "kicad-cli has no sketch pad width option, requested {} mm",
            options.sketch_pad_line_width
        );

        Ok(Box::new(KicadPlotSession {
            backend: self,
            board_name: board.name(),
            file,
            options: options.clone(),
            pending: None,
            npth_warned: false,
        }))
    }

    fn write_drill_files(&self, board: &Board, request: &DrillRequest) -> Result<Vec<PathBuf>> {
        let file = BoardFile::for_board(board)?;

        // kicad-cli only knows the absolute origin and the drill/place origin
        let origin = if request.origin == Point::default() {
            "absolute"
        } else {
            "plot"
        };

        // Trailing separator tells kicad-cli the output is a directory
        let mut output_dir = request.output_dir.clone().into_os_string();
        output_dir.push(std::path::MAIN_SEPARATOR_STR);

        let mut cli = self
            .cli()?
            .command("pcb")
            .subcommand("export")
            .arg("drill")
            .arg("--output")
            .arg(output_dir)
            .args(["--format", "excellon", "--drill-origin", origin])
            .args(["--excellon-zeros-format", request.zeros_format.as_str()])
            .args(["--excellon-units", if request.metric { "mm" } else { "in" }])
            .args([
                "--excellon-oval-format",
                if request.route_oval_holes { "route" } else { "alternate" },
            ])
            .flag_if(request.mirror, "--excellon-mirror-y")
            .flag_if(request.minimal_header, "--excellon-min-header")
            .flag_if(!request.merge_npth, "--excellon-separate-th");

        if request.generate_map_pdf {
            cli = cli.args(["--generate-map", "--map-format", "pdf"]);
        }
        if let Some(report) = &request.report_path {
            cli = cli.arg("--generate-report").arg("--report-path").arg(report);
        }

        cli.arg(&file.path).run()?;

        let stem = board.name();
        let mut candidates: Vec<PathBuf> = Vec::new();
        let sets: Vec<String> = if request.merge_npth {
            vec![stem]
        } else {
            vec![format!("{}-PTH", stem), format!("{}-NPTH", stem)]
        };
        for set in &sets {
            candidates.push(request.output_dir.join(format!("{}.drl", set)));
            if request.generate_map_pdf {
                candidates.push(request.output_dir.join(format!("{}-drl_map.pdf", set)));
            }
        }
        if let Some(report) = &request.report_path {
            candidates.push(report.clone());
        }

        Ok(candidates.into_iter().filter(|path| path.exists()).collect())
    }

    fn load_schematic(&self, path: &Path) -> Result<Vec<SchematicComponent>> {
        let components = schematic::read_schematic(path)?;
        info!(
            "Loaded schematic {} ({} symbols)",
            path.display(),
            components.len()
        );
        Ok(components)
    }
}

/// Plots one layer per `kicad-cli pcb export` call
struct KicadPlotSession<'a> {
    backend: &'a KicadBackend,
    board_name: String,
    file: BoardFile,
    options: PlotOptions,
    pending: Option<(PlotJob, PathBuf)>,
    npth_warned: bool,
}

impl KicadPlotSession<'_> {
    /// Warn once per session that NPTH pads end up on copper plots.
    /// Returns whether this call warned.
    fn warn_npth_pads(&mut self, job: &PlotJob) -> bool {
        if !job.skip_npth_pads || self.npth_warned {
            return false;
        }
        warn!(
            "kicad-cli cannot leave NPTH pads out of copper plots; {} and later copper layers include them",
            job.layer
        );
        self.npth_warned = true;
        true
    }

    fn layer_list(&self, layer: Layer) -> String {
        if !self.options.exclude_edge_layer && layer != Layer::EdgeCuts {
            format!("{},{}", layer.kicad_name(), Layer::EdgeCuts.kicad_name())
        } else {
            layer.kicad_name()
        }
    }
}

impl PlotSession for KicadPlotSession<'_> {
    fn open_plot_file(&mut self, job: &PlotJob) -> Result<PathBuf> {
        let path = plot_file_path(
            &self.options.output_dir,
            &self.board_name,
            &job.suffix,
            job.layer,
            job.format,
            self.options.use_protel_extensions,
        );
        self.warn_npth_pads(job);
        self.pending = Some((job.clone(), path.clone()));
        Ok(path)
    }

    fn plot_layer(&mut self) -> Result<()> {
        let (job, path) = self
            .pending
            .take()
            .ok_or_else(|| anyhow!("No plot file is open"))?;
        let options = &self.options;

        let format = match job.format {
            PlotFormat::Gerber => "gerber",
            PlotFormat::Dxf => "dxf",
            PlotFormat::Pdf => "pdf",
        };
        let cli = self
            .backend
            .cli()?
            .command("pcb")
            .subcommand("export")
            .arg(format)
            .output(&path)
            .arg("--layers")
            .arg(self.layer_list(job.layer))
            .flag_if(options.plot_frame_ref, "--include-border-title");

        let cli = match job.format {
            PlotFormat::Gerber => cli
                .flag_if(!options.use_x2_format, "--no-x2")
                .flag_if(!options.include_netlist_info, "--no-netlist")
                .flag_if(options.subtract_mask_from_silk, "--subtract-soldermask")
                .flag_if(options.use_aux_origin, "--use-drill-file-origin"),
            PlotFormat::Dxf => cli
                .args([
                    "--output-units",
                    match options.dxf_units {
                        DxfUnits::Millimeters => "mm",
                        DxfUnits::Inches => "in",
                    },
                ])
                .flag_if(options.dxf_polygon_mode, "--use-contours")
                .flag_if(options.use_aux_origin, "--use-drill-origin"),
            PlotFormat::Pdf => cli.flag_if(options.mirror, "--mirror").args([
                "--drill-shape-opt",
                match options.drill_marks {
                    DrillMarks::None => "0",
                    DrillMarks::Small => "1",
                    DrillMarks::Full => "2",
                },
            ]),
        };

        cli.arg(&self.file.path)
            .run()
            .with_path_context("plot layer into", &path)
    }

    fn close(self: Box<Self>) -> Result<()> {
        debug!("Closed plot session for {}", self.board_name);
        Ok(())
    }
}
